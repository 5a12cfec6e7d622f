use crate::application_impl::{RefreshTokenIdsStore, RevocationError};
use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::{NewUser, RepoError, UserRepo};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// How a presented refresh-token id is retired during rotation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RotationMode {
    /// Separate validate and invalidate calls. Two concurrent refreshes of the
    /// same token can both pass validation.
    #[default]
    Sequential,
    /// One compare-and-delete against the backing store.
    Atomic,
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub access_token_ttl: Duration,
    pub refresh_token_ttl: Duration,
    pub rotation: RotationMode,
    pub invalidate_on_reuse: bool,
    pub allow_self_assigned_roles: bool,
    pub min_password_len: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            access_token_ttl: Duration::from_secs(60 * 60),
            refresh_token_ttl: Duration::from_secs(24 * 60 * 60),
            rotation: RotationMode::Sequential,
            invalidate_on_reuse: false,
            allow_self_assigned_roles: false,
            min_password_len: 8,
        }
    }
}

pub struct RealAuthService {
    user_repo: Arc<dyn UserRepo>,
    credential_hasher: Arc<dyn CredentialHasher>,
    token_codec: Arc<dyn TokenCodec>,
    refresh_token_ids: Arc<RefreshTokenIdsStore>,
    id_token_verifier: Option<Arc<dyn IdTokenVerifier>>,
    config: SessionConfig,
}

impl RealAuthService {
    pub fn new(
        user_repo: Arc<dyn UserRepo>,
        credential_hasher: Arc<dyn CredentialHasher>,
        token_codec: Arc<dyn TokenCodec>,
        refresh_token_ids: Arc<RefreshTokenIdsStore>,
        config: SessionConfig,
    ) -> Self {
        Self {
            user_repo,
            credential_hasher,
            token_codec,
            refresh_token_ids,
            id_token_verifier: None,
            config,
        }
    }

    /// Enables `authenticate_external`.
    pub fn with_id_token_verifier(mut self, verifier: Arc<dyn IdTokenVerifier>) -> Self {
        self.id_token_verifier = Some(verifier);
        self
    }

    fn validate_sign_up(&self, request: &SignUpInput) -> Result<(), AuthError> {
        if !is_plausible_email(&request.email) {
            return Err(AuthError::BadInput("email must be an email".to_string()));
        }
        if request.password.chars().count() < self.config.min_password_len {
            return Err(AuthError::BadInput(format!(
                "password must be longer than or equal to {} characters",
                self.config.min_password_len
            )));
        }
        let wants_grants = request.role.is_some_and(|r| r != Role::Regular)
            || request.permissions.as_ref().is_some_and(|p| !p.is_empty());
        if wants_grants && !self.config.allow_self_assigned_roles {
            return Err(AuthError::BadInput(
                "role and permissions cannot be chosen at sign-up".to_string(),
            ));
        }
        Ok(())
    }

    /// Every issuance and rotation goes through here so the stored id and the
    /// returned refresh token always agree.
    async fn generate_tokens(&self, user: &UserRecord) -> Result<AuthTokens, AuthError> {
        let refresh_token_id = Uuid::new_v4().to_string();
        let payload = AccessPayload::from(user);

        let (access_token, refresh_token) = tokio::try_join!(
            self.token_codec
                .sign_access(user.id, &payload, self.config.access_token_ttl),
            self.token_codec.sign_refresh(
                user.id,
                &refresh_token_id,
                self.config.refresh_token_ttl
            ),
        )
        .map_err(|e| AuthError::InternalError(e.to_string()))?;

        self.refresh_token_ids
            .insert(user.id, &refresh_token_id)
            .await?;

        Ok(AuthTokens {
            access_token,
            refresh_token,
        })
    }

    async fn retire_refresh_token_id(
        &self,
        user_id: UserId,
        token_id: &str,
    ) -> Result<(), RevocationError> {
        match self.config.rotation {
            RotationMode::Sequential => {
                self.refresh_token_ids.validate(user_id, token_id).await?;
                self.refresh_token_ids.invalidate(user_id).await
            }
            RotationMode::Atomic => self.refresh_token_ids.consume(user_id, token_id).await,
        }
    }

    async fn find_or_create_external(
        &self,
        identity: ExternalIdentity,
    ) -> Result<UserRecord, RepoError> {
        if let Some(user) = self.user_repo.find_by_google_id(&identity.subject).await? {
            return Ok(user);
        }
        let user = self
            .user_repo
            .create(NewUser {
                email: identity.email,
                password_hash: None,
                google_id: Some(identity.subject),
                role: Role::Regular,
                permissions: PermissionSet::new(),
            })
            .await?;
        info!(user_id = %user.id, "user signed up with google");
        Ok(user)
    }

    async fn verify_refresh(&self, refresh_token: &str) -> Result<RefreshTokenClaims, AuthError> {
        self.token_codec
            .verify_refresh(refresh_token)
            .await
            .map_err(|cause| {
                debug!(%cause, "refresh token rejected");
                AuthError::unauthorized()
            })
    }
}

fn is_plausible_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && !email.chars().any(char::is_whitespace)
        && domain
            .split_once('.')
            .is_some_and(|(host, tld)| !host.is_empty() && !tld.is_empty() && !tld.ends_with('.'))
}

#[async_trait::async_trait]
impl AuthService for RealAuthService {
    async fn sign_up(&self, request: SignUpInput) -> Result<UserId, AuthError> {
        self.validate_sign_up(&request)?;
        let SignUpInput {
            email,
            password,
            role,
            permissions,
        } = request;

        if self.user_repo.find_by_email(&email).await?.is_some() {
            return Err(AuthError::Conflict);
        }

        let password_hash = self.credential_hasher.hash_password(&password).await?;
        let user = self
            .user_repo
            .create(NewUser {
                email,
                password_hash: Some(password_hash),
                google_id: None,
                role: role.unwrap_or_default(),
                permissions: permissions.unwrap_or_default(),
            })
            .await?;

        info!(user_id = %user.id, role = %user.role, "user signed up");
        Ok(user.id)
    }

    async fn sign_in(&self, request: SignInInput) -> Result<AuthTokens, AuthError> {
        let SignInInput { email, password } = request;

        let user = self
            .user_repo
            .find_by_email(&email)
            .await?
            .ok_or_else(|| AuthError::Unauthorized(USER_NOT_FOUND.to_string()))?;

        // Accounts created through Google have no password to match.
        let Some(password_hash) = user.password_hash.as_deref() else {
            return Err(AuthError::Unauthorized(INVALID_PASSWORD.to_string()));
        };
        let ok = self
            .credential_hasher
            .verify_password(&password, password_hash)
            .await?;
        if !ok {
            return Err(AuthError::Unauthorized(INVALID_PASSWORD.to_string()));
        }

        let tokens = self.generate_tokens(&user).await?;
        info!(user_id = %user.id, "user signed in");
        Ok(tokens)
    }

    async fn refresh_tokens(&self, refresh_token: &str) -> Result<AuthTokens, AuthError> {
        let claims = self.verify_refresh(refresh_token).await?;

        let user = self
            .user_repo
            .find_by_id(claims.sub)
            .await
            .map_err(|e| match e {
                RepoError::NotFound => {
                    debug!(user_id = %claims.sub, "refresh token for unknown user");
                    AuthError::unauthorized()
                }
                other => other.into(),
            })?;

        match self
            .retire_refresh_token_id(user.id, &claims.refresh_token_id)
            .await
        {
            Ok(()) => {}
            Err(RevocationError::InvalidatedToken) => {
                warn!(user_id = %user.id, "refresh token reuse detected");
                if self.config.invalidate_on_reuse {
                    self.refresh_token_ids.invalidate(user.id).await?;
                }
                return Err(AuthError::Unauthorized(ACCESS_DENIED.to_string()));
            }
            Err(e) => return Err(e.into()),
        }

        self.generate_tokens(&user).await
    }

    async fn authenticate_external(&self, id_token: &str) -> Result<AuthTokens, AuthError> {
        let Some(verifier) = &self.id_token_verifier else {
            debug!("external sign-in is not configured");
            return Err(AuthError::unauthorized());
        };
        let identity = verifier.verify(id_token).await.map_err(|cause| {
            debug!(%cause, "id token rejected");
            AuthError::unauthorized()
        })?;

        let user = match self.find_or_create_external(identity).await {
            Ok(user) => user,
            Err(RepoError::Conflict) => return Err(AuthError::Conflict),
            Err(e) => {
                warn!(error = %e, "external sign-in failed");
                return Err(AuthError::unauthorized());
            }
        };

        self.generate_tokens(&user).await
    }

    async fn sign_out(&self, refresh_token: &str) -> Result<(), AuthError> {
        let claims = self.verify_refresh(refresh_token).await?;

        // Only the currently trusted id may end the session; a stale token is
        // a no-op so it cannot be used to log out the rotated session.
        match self
            .refresh_token_ids
            .consume(claims.sub, &claims.refresh_token_id)
            .await
        {
            Ok(()) => {
                info!(user_id = %claims.sub, "user signed out");
                Ok(())
            }
            Err(RevocationError::InvalidatedToken) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn authenticate(&self, access_token: &str) -> Result<ActiveUser, AuthError> {
        let claims = self
            .token_codec
            .verify_access(access_token)
            .await
            .map_err(|cause| {
                debug!(%cause, "access token rejected");
                AuthError::unauthorized()
            })?;
        Ok(claims.active_user())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application_impl::{Argon2PasswordHasher, JwtCodec, JwtConfig};
    use crate::domain_port::{KeyValueStore, StoreError};
    use crate::infra_memory::{MemoryKeyValueStore, MemoryUserRepo};
    use tokio::sync::Barrier;

    struct Harness {
        service: RealAuthService,
        codec: Arc<JwtCodec>,
        ids: Arc<RefreshTokenIdsStore>,
    }

    fn harness_with(config: SessionConfig, store: Arc<dyn KeyValueStore>) -> Harness {
        let codec = Arc::new(JwtCodec::new(JwtConfig {
            issuer: "test-issuer".into(),
            audience: "test-audience".into(),
            access_secret: b"test-secret".to_vec(),
            refresh_secret: b"test-refresh-secret".to_vec(),
        }));
        let ids = Arc::new(RefreshTokenIdsStore::new(store));
        let service = RealAuthService::new(
            Arc::new(MemoryUserRepo::new()),
            Arc::new(Argon2PasswordHasher::with_cost(1024, 1, 1).unwrap()),
            codec.clone(),
            ids.clone(),
            config,
        );
        Harness {
            service,
            codec,
            ids,
        }
    }

    fn harness() -> Harness {
        harness_with(SessionConfig::default(), Arc::new(MemoryKeyValueStore::new()))
    }

    fn sign_in_input(email: &str, password: &str) -> SignInInput {
        SignInInput {
            email: email.to_string(),
            password: password.to_string(),
        }
    }

    async fn signed_in(h: &Harness) -> AuthTokens {
        h.service
            .sign_up(SignUpInput::new("user@test.com", "password"))
            .await
            .unwrap();
        h.service
            .sign_in(sign_in_input("user@test.com", "password"))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn sign_up_then_sign_in_issues_a_pair() {
        let h = harness();
        let tokens = signed_in(&h).await;

        assert!(!tokens.access_token.0.is_empty());
        assert!(!tokens.refresh_token.0.is_empty());

        let user = h.service.authenticate(&tokens.access_token.0).await.unwrap();
        assert_eq!(user.email, "user@test.com");
        assert_eq!(user.role, Role::Regular);
        assert!(user.permissions.is_empty());
    }

    #[tokio::test]
    async fn issued_refresh_token_matches_stored_id() {
        let h = harness();
        let tokens = signed_in(&h).await;

        let claims = h.codec.verify_refresh(&tokens.refresh_token.0).await.unwrap();
        h.ids
            .validate(claims.sub, &claims.refresh_token_id)
            .await
            .unwrap();
        assert_eq!(Uuid::parse_str(&claims.refresh_token_id).unwrap().get_version_num(), 4);
    }

    #[tokio::test]
    async fn duplicate_email_conflicts_regardless_of_password() {
        let h = harness();
        h.service
            .sign_up(SignUpInput::new("dup@test.com", "password"))
            .await
            .unwrap();

        let err = h
            .service
            .sign_up(SignUpInput::new("dup@test.com", "another-password"))
            .await
            .unwrap_err();
        assert_eq!(err, AuthError::Conflict);
    }

    #[tokio::test]
    async fn sign_in_failures_carry_specific_messages() {
        let h = harness();
        h.service
            .sign_up(SignUpInput::new("user@test.com", "password"))
            .await
            .unwrap();

        let err = h
            .service
            .sign_in(sign_in_input("user@test.com", "wrong-password"))
            .await
            .unwrap_err();
        assert_eq!(err, AuthError::Unauthorized("Invalid password".into()));

        let err = h
            .service
            .sign_in(sign_in_input("nobody@test.com", "password"))
            .await
            .unwrap_err();
        assert_eq!(err, AuthError::Unauthorized("User not found".into()));
    }

    #[tokio::test]
    async fn malformed_sign_up_is_bad_input() {
        let h = harness();
        for (email, password) in [
            ("not-an-email", "password"),
            ("a@b", "password"),
            ("@test.com", "password"),
            ("user@test.com", "short"),
        ] {
            let err = h
                .service
                .sign_up(SignUpInput::new(email, password))
                .await
                .unwrap_err();
            assert!(matches!(err, AuthError::BadInput(_)), "{email}/{password}");
        }
    }

    #[tokio::test]
    async fn self_assigned_role_needs_opt_in() {
        let mut request = SignUpInput::new("admin@test.com", "password");
        request.role = Some(Role::Admin);

        let h = harness();
        let err = h.service.sign_up(request.clone()).await.unwrap_err();
        assert!(matches!(err, AuthError::BadInput(_)));

        let h = harness_with(
            SessionConfig {
                allow_self_assigned_roles: true,
                ..Default::default()
            },
            Arc::new(MemoryKeyValueStore::new()),
        );
        h.service.sign_up(request).await.unwrap();
        let tokens = h
            .service
            .sign_in(sign_in_input("admin@test.com", "password"))
            .await
            .unwrap();
        let user = h.service.authenticate(&tokens.access_token.0).await.unwrap();
        assert_eq!(user.role, Role::Admin);
    }

    #[tokio::test]
    async fn refresh_rotates_and_rejects_the_consumed_token() {
        let h = harness();
        let original = signed_in(&h).await;

        let rotated = h
            .service
            .refresh_tokens(&original.refresh_token.0)
            .await
            .unwrap();
        assert_ne!(rotated.refresh_token, original.refresh_token);

        let err = h
            .service
            .refresh_tokens(&original.refresh_token.0)
            .await
            .unwrap_err();
        assert_eq!(err, AuthError::Unauthorized("Access denied".into()));

        h.service
            .refresh_tokens(&rotated.refresh_token.0)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn reuse_can_revoke_the_whole_session() {
        let h = harness_with(
            SessionConfig {
                invalidate_on_reuse: true,
                ..Default::default()
            },
            Arc::new(MemoryKeyValueStore::new()),
        );
        let original = signed_in(&h).await;
        let rotated = h
            .service
            .refresh_tokens(&original.refresh_token.0)
            .await
            .unwrap();

        assert!(h.service.refresh_tokens(&original.refresh_token.0).await.is_err());
        let err = h
            .service
            .refresh_tokens(&rotated.refresh_token.0)
            .await
            .unwrap_err();
        assert_eq!(err, AuthError::Unauthorized("Access denied".into()));
    }

    #[tokio::test]
    async fn refresh_rejects_access_tokens_and_garbage_uniformly() {
        let h = harness();
        let tokens = signed_in(&h).await;

        for bad in [tokens.access_token.0.as_str(), "garbage"] {
            let err = h.service.refresh_tokens(bad).await.unwrap_err();
            assert_eq!(err, AuthError::unauthorized());
        }
    }

    #[tokio::test]
    async fn refresh_for_vanished_user_is_unauthorized() {
        let h = harness();
        let token = h
            .codec
            .sign_refresh(UserId(404), "rt", Duration::from_secs(60))
            .await
            .unwrap();
        h.ids.insert(UserId(404), "rt").await.unwrap();

        let err = h.service.refresh_tokens(&token.0).await.unwrap_err();
        assert_eq!(err, AuthError::unauthorized());
    }

    #[tokio::test]
    async fn sign_out_ends_the_session_and_is_idempotent() {
        let h = harness();
        let tokens = signed_in(&h).await;

        h.service.sign_out(&tokens.refresh_token.0).await.unwrap();
        h.service.sign_out(&tokens.refresh_token.0).await.unwrap();

        let err = h
            .service
            .refresh_tokens(&tokens.refresh_token.0)
            .await
            .unwrap_err();
        assert_eq!(err, AuthError::Unauthorized("Access denied".into()));
    }

    #[tokio::test]
    async fn stale_token_cannot_sign_out_the_rotated_session() {
        let h = harness();
        let original = signed_in(&h).await;
        let rotated = h
            .service
            .refresh_tokens(&original.refresh_token.0)
            .await
            .unwrap();

        h.service.sign_out(&original.refresh_token.0).await.unwrap();
        h.service
            .refresh_tokens(&rotated.refresh_token.0)
            .await
            .unwrap();
    }

    /// Reads, then holds every `get` until two callers have read, so both
    /// concurrent refreshes observe the stored id before either deletes it.
    struct LockstepStore {
        inner: MemoryKeyValueStore,
        barrier: Barrier,
    }

    #[async_trait::async_trait]
    impl KeyValueStore for LockstepStore {
        async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
            let value = self.inner.get(key).await;
            self.barrier.wait().await;
            value
        }
        async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
            self.inner.set(key, value).await
        }
        async fn del(&self, key: &str) -> Result<(), StoreError> {
            self.inner.del(key).await
        }
        async fn compare_and_delete(&self, key: &str, expected: &str) -> Result<bool, StoreError> {
            self.inner.compare_and_delete(key, expected).await
        }
    }

    #[tokio::test]
    async fn sequential_rotation_lets_concurrent_refreshes_both_win() {
        let store = Arc::new(LockstepStore {
            inner: MemoryKeyValueStore::new(),
            barrier: Barrier::new(2),
        });
        let h = harness_with(SessionConfig::default(), store);
        let tokens = signed_in(&h).await;

        let (a, b) = tokio::join!(
            h.service.refresh_tokens(&tokens.refresh_token.0),
            h.service.refresh_tokens(&tokens.refresh_token.0),
        );
        // Known race: one stored id produced two live pairs.
        assert!(a.is_ok());
        assert!(b.is_ok());
    }

    #[tokio::test]
    async fn atomic_rotation_lets_exactly_one_concurrent_refresh_win() {
        let store = Arc::new(LockstepStore {
            inner: MemoryKeyValueStore::new(),
            barrier: Barrier::new(2),
        });
        let h = harness_with(
            SessionConfig {
                rotation: RotationMode::Atomic,
                ..Default::default()
            },
            store,
        );
        let tokens = signed_in(&h).await;

        let (a, b) = tokio::join!(
            h.service.refresh_tokens(&tokens.refresh_token.0),
            h.service.refresh_tokens(&tokens.refresh_token.0),
        );
        assert_eq!(a.is_ok() as u8 + b.is_ok() as u8, 1);
        let loser = a.err().or(b.err()).unwrap();
        assert_eq!(loser, AuthError::Unauthorized("Access denied".into()));
    }

    /// Accepts `id:<subject>:<email>` and rejects anything else.
    struct StaticIdTokens;

    #[async_trait::async_trait]
    impl IdTokenVerifier for StaticIdTokens {
        async fn verify(&self, id_token: &str) -> Result<ExternalIdentity, TokenError> {
            let mut parts = id_token.splitn(3, ':');
            match (parts.next(), parts.next(), parts.next()) {
                (Some("id"), Some(subject), Some(email)) => Ok(ExternalIdentity {
                    subject: subject.to_string(),
                    email: email.to_string(),
                }),
                _ => Err(TokenError::InvalidSignature),
            }
        }
    }

    fn external_harness() -> Harness {
        let mut h = harness();
        h.service = h.service.with_id_token_verifier(Arc::new(StaticIdTokens));
        h
    }

    #[tokio::test]
    async fn external_sign_in_creates_the_account_on_first_use() {
        let h = external_harness();
        let tokens = h
            .service
            .authenticate_external("id:g-42:someone@gmail.com")
            .await
            .unwrap();

        let user = h.service.authenticate(&tokens.access_token.0).await.unwrap();
        assert_eq!(user.email, "someone@gmail.com");
        assert_eq!(user.role, Role::Regular);
        assert!(user.permissions.is_empty());

        let claims = h.codec.verify_refresh(&tokens.refresh_token.0).await.unwrap();
        h.ids
            .validate(claims.sub, &claims.refresh_token_id)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn external_sign_in_reuses_the_linked_account() {
        let h = external_harness();
        let first = h
            .service
            .authenticate_external("id:g-42:someone@gmail.com")
            .await
            .unwrap();
        let second = h
            .service
            .authenticate_external("id:g-42:someone@gmail.com")
            .await
            .unwrap();

        let first_user = h.service.authenticate(&first.access_token.0).await.unwrap();
        let second_user = h.service.authenticate(&second.access_token.0).await.unwrap();
        assert_eq!(first_user.sub, second_user.sub);

        // Same issuance path: the newer pair supersedes the older one.
        let err = h
            .service
            .refresh_tokens(&first.refresh_token.0)
            .await
            .unwrap_err();
        assert_eq!(err, AuthError::Unauthorized("Access denied".into()));
        h.service.refresh_tokens(&second.refresh_token.0).await.unwrap();
    }

    #[tokio::test]
    async fn external_sign_in_with_a_taken_email_conflicts() {
        let h = external_harness();
        h.service
            .sign_up(SignUpInput::new("user@test.com", "password"))
            .await
            .unwrap();

        let err = h
            .service
            .authenticate_external("id:g-7:user@test.com")
            .await
            .unwrap_err();
        assert_eq!(err, AuthError::Conflict);
    }

    #[tokio::test]
    async fn external_sign_in_rejects_bad_tokens_and_missing_verifier() {
        let h = external_harness();
        assert_eq!(
            h.service.authenticate_external("garbage").await.unwrap_err(),
            AuthError::unauthorized()
        );

        let plain = harness();
        assert_eq!(
            plain
                .service
                .authenticate_external("id:g-1:a@gmail.com")
                .await
                .unwrap_err(),
            AuthError::unauthorized()
        );
    }

    #[tokio::test]
    async fn external_account_cannot_sign_in_with_a_password() {
        let h = external_harness();
        h.service
            .authenticate_external("id:g-42:someone@gmail.com")
            .await
            .unwrap();

        let err = h
            .service
            .sign_in(sign_in_input("someone@gmail.com", "password"))
            .await
            .unwrap_err();
        assert_eq!(err, AuthError::Unauthorized("Invalid password".into()));
    }
}
