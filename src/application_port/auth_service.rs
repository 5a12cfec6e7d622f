use crate::domain_model::*;
use crate::domain_port::{RepoError, StoreError};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const UNAUTHORIZED: &str = "Unauthorized";
pub const FORBIDDEN: &str = "Forbidden resource";
pub const USER_NOT_FOUND: &str = "User not found";
pub const INVALID_PASSWORD: &str = "Invalid password";
pub const ACCESS_DENIED: &str = "Access denied";

/// Outcome taxonomy surfaced at the boundary. Exactly one of these reaches
/// the caller per request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("email already registered")]
    Conflict,
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("bad input: {0}")]
    BadInput(String),
    #[error("store error: {0}")]
    Store(String),
    #[error("internal error: {0}")]
    InternalError(String),
}

impl AuthError {
    pub fn unauthorized() -> Self {
        AuthError::Unauthorized(UNAUTHORIZED.to_string())
    }

    pub fn forbidden() -> Self {
        AuthError::Forbidden(FORBIDDEN.to_string())
    }
}

impl From<RepoError> for AuthError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::Conflict => AuthError::Conflict,
            RepoError::NotFound => AuthError::unauthorized(),
            RepoError::Store(e) => AuthError::Store(e),
        }
    }
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Store(e) => AuthError::Store(e),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SignUpInput {
    pub email: String,
    pub password: String,
    pub role: Option<Role>,
    pub permissions: Option<PermissionSet>,
}

impl SignUpInput {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        SignUpInput {
            email: email.into(),
            password: password.into(),
            role: None,
            permissions: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SignInInput {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccessToken(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RefreshToken(pub String);

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthTokens {
    pub access_token: AccessToken,
    pub refresh_token: RefreshToken,
}

// region token codec

/// Verification failure causes. These stay inside the crate: callers collapse
/// them into a single `AuthError::Unauthorized`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("invalid signature")]
    InvalidSignature,
    #[error("token expired")]
    Expired,
    #[error("claim mismatch")]
    ClaimMismatch,
    #[error("signing failed: {0}")]
    Signing(String),
}

/// Caller-supplied part of an access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessPayload {
    pub email: String,
    pub role: Role,
    pub permissions: PermissionSet,
}

impl From<&UserRecord> for AccessPayload {
    fn from(user: &UserRecord) -> Self {
        AccessPayload {
            email: user.email.clone(),
            role: user.role,
            permissions: user.permissions.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessTokenClaims {
    pub sub: UserId,
    #[serde(flatten)]
    pub payload: AccessPayload,
    pub iss: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
}

impl AccessTokenClaims {
    pub fn active_user(&self) -> ActiveUser {
        ActiveUser {
            sub: self.sub,
            email: self.payload.email.clone(),
            role: self.payload.role,
            permissions: self.payload.permissions.clone(),
        }
    }
}

pub const REFRESH_TOKEN_TYPE: &str = "refresh";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshTokenClaims {
    pub sub: UserId,
    pub refresh_token_id: String,
    #[serde(rename = "type")]
    pub token_type: String,
    pub iss: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
}

#[async_trait::async_trait]
pub trait TokenCodec: Send + Sync {
    async fn sign_access(
        &self,
        user_id: UserId,
        payload: &AccessPayload,
        ttl: Duration,
    ) -> Result<AccessToken, TokenError>;
    async fn sign_refresh(
        &self,
        user_id: UserId,
        refresh_token_id: &str,
        ttl: Duration,
    ) -> Result<RefreshToken, TokenError>;
    async fn verify_access(&self, token: &str) -> Result<AccessTokenClaims, TokenError>;
    async fn verify_refresh(&self, token: &str) -> Result<RefreshTokenClaims, TokenError>;
}

/// Identity asserted by an external provider's ID token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalIdentity {
    /// The provider's stable subject id.
    pub subject: String,
    pub email: String,
}

/// Verifies ID tokens minted by an external identity provider.
#[async_trait::async_trait]
pub trait IdTokenVerifier: Send + Sync {
    async fn verify(&self, id_token: &str) -> Result<ExternalIdentity, TokenError>;
}

// endregion

#[async_trait::async_trait]
pub trait CredentialHasher: Send + Sync {
    async fn hash_password(&self, password: &str) -> Result<String, AuthError>;
    async fn verify_password(&self, password: &str, password_hash: &str)
    -> Result<bool, AuthError>;
}

#[async_trait::async_trait]
pub trait AuthService: Send + Sync {
    async fn sign_up(&self, request: SignUpInput) -> Result<UserId, AuthError>;
    async fn sign_in(&self, request: SignInInput) -> Result<AuthTokens, AuthError>;
    async fn refresh_tokens(&self, refresh_token: &str) -> Result<AuthTokens, AuthError>;
    /// Sign in (creating the account on first use) with a provider ID token.
    async fn authenticate_external(&self, id_token: &str) -> Result<AuthTokens, AuthError>;
    async fn sign_out(&self, refresh_token: &str) -> Result<(), AuthError>;
    async fn authenticate(&self, access_token: &str) -> Result<ActiveUser, AuthError>;
}
