use super::jwt_codec::token_error_of;
use crate::application_port::*;
use jsonwebtoken::jwk::JwkSet;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode, decode_header};
use serde::Deserialize;

pub const GOOGLE_ISSUERS: [&str; 2] = ["https://accounts.google.com", "accounts.google.com"];

#[derive(Debug, Clone)]
pub struct IdTokenConfig {
    /// Expected `aud`: the OAuth client id issued by the provider.
    pub client_id: String,
    pub issuers: Vec<String>,
    pub algorithms: Vec<Algorithm>,
}

impl IdTokenConfig {
    pub fn google(client_id: impl Into<String>) -> Self {
        IdTokenConfig {
            client_id: client_id.into(),
            issuers: GOOGLE_ISSUERS.iter().map(|s| s.to_string()).collect(),
            algorithms: vec![Algorithm::RS256],
        }
    }
}

#[derive(Debug, Deserialize)]
struct IdTokenClaims {
    sub: String,
    email: Option<String>,
    email_verified: Option<bool>,
}

/// Checks provider ID tokens against a fixed JSON Web Key Set, selecting
/// the key by the token header's `kid`.
pub struct JwksIdTokenVerifier {
    keys: JwkSet,
    validation: Validation,
}

impl JwksIdTokenVerifier {
    pub fn new(cfg: IdTokenConfig, keys: JwkSet) -> Self {
        let mut validation = Validation::new(Algorithm::RS256);
        validation.algorithms = cfg.algorithms;
        validation.set_audience(&[cfg.client_id]);
        validation.set_issuer(&cfg.issuers);
        validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);

        JwksIdTokenVerifier { keys, validation }
    }

    pub fn from_jwks_json(cfg: IdTokenConfig, jwks: &str) -> Result<Self, serde_json::Error> {
        let keys: JwkSet = serde_json::from_str(jwks)?;
        Ok(Self::new(cfg, keys))
    }

    fn decoding_key(&self, id_token: &str) -> Result<DecodingKey, TokenError> {
        let header = decode_header(id_token).map_err(|_| TokenError::InvalidSignature)?;
        let kid = header.kid.ok_or(TokenError::InvalidSignature)?;
        let jwk = self.keys.find(&kid).ok_or(TokenError::InvalidSignature)?;
        DecodingKey::from_jwk(jwk).map_err(|_| TokenError::InvalidSignature)
    }
}

#[async_trait::async_trait]
impl IdTokenVerifier for JwksIdTokenVerifier {
    async fn verify(&self, id_token: &str) -> Result<ExternalIdentity, TokenError> {
        let key = self.decoding_key(id_token)?;
        let claims = decode::<IdTokenClaims>(id_token, &key, &self.validation)
            .map_err(|e| token_error_of(&e))?
            .claims;

        if claims.email_verified == Some(false) {
            return Err(TokenError::ClaimMismatch);
        }
        let email = claims.email.ok_or(TokenError::ClaimMismatch)?;
        Ok(ExternalIdentity {
            subject: claims.sub,
            email,
        })
    }
}
