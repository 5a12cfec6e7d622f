use crate::application_port::AuthError;
use crate::domain_model::*;
use std::collections::BTreeSet;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd)]
pub enum AuthType {
    /// No credential required; the caller stays anonymous.
    None,
    /// `Authorization: Bearer <access token>`.
    Bearer,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Authentication {
    Anonymous,
    User(ActiveUser),
}

impl Authentication {
    pub fn user(&self) -> Option<&ActiveUser> {
        match self {
            Authentication::Anonymous => None,
            Authentication::User(user) => Some(user),
        }
    }
}

/// Authorization requirements of one endpoint, built once when the route is
/// assembled.
///
/// `roles` and `permissions` distinguish "not declared" (`None`, always
/// passes) from "declared" (`Some`, even when empty).
#[derive(Debug, Clone)]
pub struct EndpointRequirements {
    auth_types: Vec<AuthType>,
    roles: Option<BTreeSet<Role>>,
    permissions: Option<PermissionSet>,
    policies: Vec<Arc<dyn Policy>>,
}

impl Default for EndpointRequirements {
    fn default() -> Self {
        EndpointRequirements {
            auth_types: vec![AuthType::Bearer],
            roles: None,
            permissions: None,
            policies: Vec::new(),
        }
    }
}

impl EndpointRequirements {
    pub fn bearer() -> Self {
        Self::default()
    }

    pub fn public() -> Self {
        Self::default().auth_types([AuthType::None])
    }

    pub fn auth_types(mut self, types: impl IntoIterator<Item = AuthType>) -> Self {
        self.auth_types = types.into_iter().collect();
        self
    }

    pub fn roles(mut self, roles: impl IntoIterator<Item = Role>) -> Self {
        self.roles = Some(roles.into_iter().collect());
        self
    }

    pub fn permissions(mut self, permissions: impl IntoIterator<Item = Permission>) -> Self {
        self.permissions = Some(permissions.into_iter().collect());
        self
    }

    pub fn policy(mut self, policy: impl Policy) -> Self {
        self.policies.push(Arc::new(policy));
        self
    }

    pub fn declared_auth_types(&self) -> &[AuthType] {
        &self.auth_types
    }

    pub fn declared_roles(&self) -> Option<&BTreeSet<Role>> {
        self.roles.as_ref()
    }

    pub fn declared_permissions(&self) -> Option<&PermissionSet> {
        self.permissions.as_ref()
    }

    pub fn declared_policies(&self) -> &[Arc<dyn Policy>] {
        &self.policies
    }
}

/// One authentication mechanism. `Ok(Some(_))` approves, `Ok(None)` abstains,
/// `Err(_)` rejects.
#[async_trait::async_trait]
pub trait AuthenticationGuard: Send + Sync {
    async fn authenticate(
        &self,
        authorization: Option<&str>,
    ) -> Result<Option<Authentication>, AuthError>;
}

/// Post-authentication decision. Runs with whatever identity the
/// authentication step produced, which may be none.
#[async_trait::async_trait]
pub trait AuthorizationCheck: Send + Sync {
    fn name(&self) -> &'static str;

    async fn check(
        &self,
        requirements: &EndpointRequirements,
        user: Option<&ActiveUser>,
    ) -> Result<(), AuthError>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PolicyError {
    #[error("Policy handler for {0} not found")]
    HandlerNotFound(&'static str),
    #[error("{0}")]
    Rejected(String),
    #[error("handler for {handler} received a {policy} policy")]
    KindMismatch {
        handler: &'static str,
        policy: &'static str,
    },
}

#[async_trait::async_trait]
pub trait PolicyHandler: Send + Sync {
    fn kind(&self) -> PolicyKind;

    async fn handle(&self, policy: &dyn Policy, user: &ActiveUser) -> Result<(), PolicyError>;
}
