use crate::application_port::*;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Approves every request as anonymous.
pub struct NoneGuard;

#[async_trait::async_trait]
impl AuthenticationGuard for NoneGuard {
    async fn authenticate(
        &self,
        _authorization: Option<&str>,
    ) -> Result<Option<Authentication>, AuthError> {
        Ok(Some(Authentication::Anonymous))
    }
}

/// Verifies `Authorization: Bearer <access token>`.
pub struct AccessTokenGuard {
    auth_service: Arc<dyn AuthService>,
}

impl AccessTokenGuard {
    pub fn new(auth_service: Arc<dyn AuthService>) -> Self {
        AccessTokenGuard { auth_service }
    }

    fn extract_token(authorization: Option<&str>) -> Option<&str> {
        let (scheme, token) = authorization?.trim().split_once(' ')?;
        let token = token.trim();
        (scheme == "Bearer" && !token.is_empty()).then_some(token)
    }
}

#[async_trait::async_trait]
impl AuthenticationGuard for AccessTokenGuard {
    async fn authenticate(
        &self,
        authorization: Option<&str>,
    ) -> Result<Option<Authentication>, AuthError> {
        let Some(token) = Self::extract_token(authorization) else {
            return Err(AuthError::unauthorized());
        };
        let user = self.auth_service.authenticate(token).await?;
        Ok(Some(Authentication::User(user)))
    }
}

/// Maps each declared `AuthType` to its guards and runs them in order.
pub struct AuthenticationDispatcher {
    guards: HashMap<AuthType, Vec<Arc<dyn AuthenticationGuard>>>,
}

impl AuthenticationDispatcher {
    pub fn new() -> Self {
        AuthenticationDispatcher {
            guards: HashMap::new(),
        }
    }

    /// The default wiring: `None` is anonymous, `Bearer` checks the access
    /// token through `auth_service`.
    pub fn standard(auth_service: Arc<dyn AuthService>) -> Self {
        Self::new()
            .with_guard(AuthType::None, Arc::new(NoneGuard))
            .with_guard(AuthType::Bearer, Arc::new(AccessTokenGuard::new(auth_service)))
    }

    pub fn with_guard(mut self, auth_type: AuthType, guard: Arc<dyn AuthenticationGuard>) -> Self {
        self.guards.entry(auth_type).or_default().push(guard);
        self
    }

    /// First approval wins. Otherwise the last rejection is surfaced, or a
    /// plain `Unauthorized` when every guard abstained.
    pub async fn authenticate(
        &self,
        auth_types: &[AuthType],
        authorization: Option<&str>,
    ) -> Result<Authentication, AuthError> {
        let mut last_error = AuthError::unauthorized();

        let guards: Vec<&Arc<dyn AuthenticationGuard>> = auth_types
            .iter()
            .filter_map(|auth_type| self.guards.get(auth_type))
            .flatten()
            .collect();
        for guard in guards {
            match guard.authenticate(authorization).await {
                Ok(Some(authentication)) => return Ok(authentication),
                Ok(None) => {}
                Err(e) => {
                    debug!(error = %e, "authentication guard rejected");
                    last_error = match e {
                        AuthError::Unauthorized(_) => e,
                        _ => AuthError::unauthorized(),
                    };
                }
            }
        }

        Err(last_error)
    }
}

impl Default for AuthenticationDispatcher {
    fn default() -> Self {
        Self::new()
    }
}
