use crate::application_impl::*;
use crate::application_port::*;
use std::sync::Arc;
use tracing::debug;

/// Authentication followed by the authorization checks, in order. The first
/// failing check decides the response.
pub struct AuthorizationChain {
    dispatcher: AuthenticationDispatcher,
    checks: Vec<Arc<dyn AuthorizationCheck>>,
}

impl AuthorizationChain {
    pub fn new(dispatcher: AuthenticationDispatcher, checks: Vec<Arc<dyn AuthorizationCheck>>) -> Self {
        AuthorizationChain { dispatcher, checks }
    }

    /// Roles, then permissions, then policies.
    pub fn standard(auth_service: Arc<dyn AuthService>, registry: Arc<PolicyHandlerRegistry>) -> Self {
        Self::new(
            AuthenticationDispatcher::standard(auth_service),
            vec![
                Arc::new(RoleCheck),
                Arc::new(PermissionCheck),
                Arc::new(PolicyCheck::new(registry)),
            ],
        )
    }

    pub async fn authorize(
        &self,
        requirements: &EndpointRequirements,
        authorization: Option<&str>,
    ) -> Result<Authentication, AuthError> {
        let authentication = self
            .dispatcher
            .authenticate(requirements.declared_auth_types(), authorization)
            .await?;

        for check in &self.checks {
            if let Err(e) = check.check(requirements, authentication.user()).await {
                debug!(check = check.name(), error = %e, "authorization denied");
                return Err(e);
            }
        }
        Ok(authentication)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain_model::*;
    use crate::domain_port::{KeyValueStore, UserRepo};
    use crate::infra_memory::{MemoryKeyValueStore, MemoryUserRepo};

    struct Fixture {
        chain: AuthorizationChain,
        auth_service: Arc<dyn AuthService>,
    }

    impl Fixture {
        fn new() -> Self {
            let user_repo: Arc<dyn UserRepo> = Arc::new(MemoryUserRepo::new());
            let store: Arc<dyn KeyValueStore> = Arc::new(MemoryKeyValueStore::new());
            let auth_service: Arc<dyn AuthService> = Arc::new(RealAuthService::new(
                user_repo,
                Arc::new(Argon2PasswordHasher::with_cost(1024, 1, 1).unwrap()),
                Arc::new(JwtCodec::new(JwtConfig {
                    issuer: "localhost".into(),
                    audience: "localhost".into(),
                    access_secret: "access-secret".into(),
                    refresh_secret: "refresh-secret".into(),
                })),
                Arc::new(RefreshTokenIdsStore::new(store)),
                SessionConfig {
                    allow_self_assigned_roles: true,
                    ..SessionConfig::default()
                },
            ));
            let registry = Arc::new(PolicyHandlerRegistry::new([
                Arc::new(EmailDomainPolicyHandler) as Arc<dyn PolicyHandler>,
            ]));
            Fixture {
                chain: AuthorizationChain::standard(auth_service.clone(), registry),
                auth_service,
            }
        }

        async fn bearer(&self, email: &str, role: Role, permissions: &[Permission]) -> String {
            let mut input = SignUpInput::new(email, "password");
            input.role = Some(role);
            input.permissions = Some(permissions.iter().copied().collect());
            self.auth_service.sign_up(input).await.unwrap();

            let tokens = self
                .auth_service
                .sign_in(SignInInput {
                    email: email.into(),
                    password: "password".into(),
                })
                .await
                .unwrap();
            format!("Bearer {}", tokens.access_token.0)
        }
    }

    #[tokio::test]
    async fn admin_only_endpoint() {
        let fx = Fixture::new();
        let admin = fx.bearer("admin@test.com", Role::Admin, &[]).await;
        let regular = fx.bearer("user@test.com", Role::Regular, &[]).await;
        let requirements = EndpointRequirements::bearer().roles([Role::Admin]);

        let auth = fx.chain.authorize(&requirements, Some(&admin)).await.unwrap();
        assert_eq!(auth.user().map(|u| u.role), Some(Role::Admin));

        assert_eq!(
            fx.chain.authorize(&requirements, Some(&regular)).await,
            Err(AuthError::forbidden())
        );
    }

    #[tokio::test]
    async fn missing_or_bad_credentials_are_unauthorized() {
        let fx = Fixture::new();
        let requirements = EndpointRequirements::bearer();

        for header in [None, Some("Bearer nope"), Some("Basic abc")] {
            assert!(matches!(
                fx.chain.authorize(&requirements, header).await,
                Err(AuthError::Unauthorized(_))
            ));
        }
    }

    #[tokio::test]
    async fn public_endpoint_is_anonymous() {
        let fx = Fixture::new();
        let auth = fx
            .chain
            .authorize(&EndpointRequirements::public(), None)
            .await
            .unwrap();
        assert_eq!(auth, Authentication::Anonymous);
    }

    #[tokio::test]
    async fn public_endpoint_with_roles_fails_closed() {
        let fx = Fixture::new();
        let requirements = EndpointRequirements::public().roles([Role::Regular]);
        assert_eq!(
            fx.chain.authorize(&requirements, None).await,
            Err(AuthError::forbidden())
        );
    }

    #[tokio::test]
    async fn permission_gated_endpoint() {
        let fx = Fixture::new();
        let writer = fx
            .bearer("writer@test.com", Role::Regular, &[Permission::Create])
            .await;
        let reader = fx
            .bearer("reader@test.com", Role::Regular, &[Permission::Read])
            .await;
        let requirements = EndpointRequirements::bearer().permissions([Permission::Create]);

        assert!(fx.chain.authorize(&requirements, Some(&writer)).await.is_ok());
        assert_eq!(
            fx.chain.authorize(&requirements, Some(&reader)).await,
            Err(AuthError::forbidden())
        );
    }

    #[tokio::test]
    async fn role_denial_precedes_policy_evaluation() {
        let fx = Fixture::new();
        let regular = fx.bearer("user@test.com", Role::Regular, &[]).await;
        let requirements = EndpointRequirements::bearer()
            .roles([Role::Admin])
            .policy(EmailDomainPolicy::new("@gmail.com"));

        assert_eq!(
            fx.chain.authorize(&requirements, Some(&regular)).await,
            Err(AuthError::forbidden())
        );
    }

    #[tokio::test]
    async fn policy_gated_endpoint() {
        let fx = Fixture::new();
        let gmail = fx.bearer("someone@gmail.com", Role::Regular, &[]).await;
        let other = fx.bearer("someone@test.com", Role::Regular, &[]).await;
        let requirements =
            EndpointRequirements::bearer().policy(EmailDomainPolicy::new("@gmail.com"));

        assert!(fx.chain.authorize(&requirements, Some(&gmail)).await.is_ok());
        assert_eq!(
            fx.chain.authorize(&requirements, Some(&other)).await,
            Err(AuthError::Forbidden("email must end with @gmail.com".into()))
        );
    }
}
