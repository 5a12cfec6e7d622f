use crate::application_port::*;
use crate::domain_model::UserId;
use chrono::Utc;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt;
use std::time::Duration;

/// Signing material for both token classes. The two secrets are independent
/// key slots: neither can be used to forge the other class of token.
#[derive(Clone)]
pub struct JwtConfig {
    pub issuer: String,
    pub audience: String,
    pub access_secret: Vec<u8>,
    pub refresh_secret: Vec<u8>,
}

impl fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtConfig")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("access_secret", &"<redacted>")
            .field("refresh_secret", &"<redacted>")
            .finish()
    }
}

struct KeySlot {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl KeySlot {
    fn new(secret: &[u8]) -> Self {
        KeySlot {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
        }
    }
}

pub struct JwtCodec {
    issuer: String,
    audience: String,
    access: KeySlot,
    refresh: KeySlot,
    validation: Validation,
}

impl JwtCodec {
    pub fn new(cfg: JwtConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_exp = true;
        validation.set_audience(&[cfg.audience.clone()]);
        validation.set_issuer(&[cfg.issuer.clone()]);
        validation.set_required_spec_claims(&["exp", "iss", "aud"]);

        JwtCodec {
            access: KeySlot::new(&cfg.access_secret),
            refresh: KeySlot::new(&cfg.refresh_secret),
            issuer: cfg.issuer,
            audience: cfg.audience,
            validation,
        }
    }

    fn timestamps(ttl: Duration) -> (i64, i64) {
        let iat = Utc::now().timestamp();
        let ttl = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX);
        (iat, iat.saturating_add(ttl))
    }

    fn sign<C: Serialize>(claims: &C, slot: &KeySlot) -> Result<String, TokenError> {
        encode(&Header::new(Algorithm::HS256), claims, &slot.encoding)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }

    fn verify<C: DeserializeOwned>(&self, token: &str, slot: &KeySlot) -> Result<C, TokenError> {
        decode::<C>(token, &slot.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| token_error_of(&e))
    }
}

/// Collapses jsonwebtoken's failure kinds into the three verification causes.
pub(crate) fn token_error_of(error: &jsonwebtoken::errors::Error) -> TokenError {
    match error.kind() {
        ErrorKind::ExpiredSignature => TokenError::Expired,
        ErrorKind::InvalidIssuer
        | ErrorKind::InvalidAudience
        | ErrorKind::InvalidSubject
        | ErrorKind::MissingRequiredClaim(_)
        | ErrorKind::ImmatureSignature => TokenError::ClaimMismatch,
        _ => TokenError::InvalidSignature,
    }
}

#[async_trait::async_trait]
impl TokenCodec for JwtCodec {
    async fn sign_access(
        &self,
        user_id: UserId,
        payload: &AccessPayload,
        ttl: Duration,
    ) -> Result<AccessToken, TokenError> {
        let (iat, exp) = Self::timestamps(ttl);
        let claims = AccessTokenClaims {
            sub: user_id,
            payload: payload.clone(),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            iat,
            exp,
        };
        Self::sign(&claims, &self.access).map(AccessToken)
    }

    async fn sign_refresh(
        &self,
        user_id: UserId,
        refresh_token_id: &str,
        ttl: Duration,
    ) -> Result<RefreshToken, TokenError> {
        let (iat, exp) = Self::timestamps(ttl);
        let claims = RefreshTokenClaims {
            sub: user_id,
            refresh_token_id: refresh_token_id.to_string(),
            token_type: REFRESH_TOKEN_TYPE.to_string(),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            iat,
            exp,
        };
        Self::sign(&claims, &self.refresh).map(RefreshToken)
    }

    async fn verify_access(&self, token: &str) -> Result<AccessTokenClaims, TokenError> {
        self.verify(token, &self.access)
    }

    async fn verify_refresh(&self, token: &str) -> Result<RefreshTokenClaims, TokenError> {
        let claims: RefreshTokenClaims = self.verify(token, &self.refresh)?;
        if claims.token_type != REFRESH_TOKEN_TYPE {
            return Err(TokenError::ClaimMismatch);
        }
        Ok(claims)
    }
}
