use crate::application_port::AuthError;
use crate::domain_model::UserId;
use crate::domain_port::{KeyValueStore, StoreError};
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum RevocationError {
    /// The presented id is not the one currently trusted for the subject,
    /// either because it was rotated away or because nothing is stored.
    #[error("refresh token has been invalidated")]
    InvalidatedToken,
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<RevocationError> for AuthError {
    fn from(err: RevocationError) -> Self {
        match err {
            RevocationError::InvalidatedToken => AuthError::unauthorized(),
            RevocationError::Store(e) => e.into(),
        }
    }
}

/// Keeps the single currently-valid refresh-token id per subject.
pub struct RefreshTokenIdsStore {
    store: Arc<dyn KeyValueStore>,
}

impl RefreshTokenIdsStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        RefreshTokenIdsStore { store }
    }

    pub fn key_of(user_id: UserId) -> String {
        format!("user-{}", user_id)
    }

    pub async fn insert(&self, user_id: UserId, token_id: &str) -> Result<(), RevocationError> {
        self.store.set(&Self::key_of(user_id), token_id).await?;
        Ok(())
    }

    pub async fn validate(&self, user_id: UserId, token_id: &str) -> Result<(), RevocationError> {
        let stored = self.store.get(&Self::key_of(user_id)).await?;
        match stored {
            Some(stored) if stored == token_id => Ok(()),
            _ => Err(RevocationError::InvalidatedToken),
        }
    }

    pub async fn invalidate(&self, user_id: UserId) -> Result<(), RevocationError> {
        self.store.del(&Self::key_of(user_id)).await?;
        Ok(())
    }

    /// `validate` and `invalidate` as one compare-and-delete. Only as atomic
    /// as the backing store's `compare_and_delete`.
    pub async fn consume(&self, user_id: UserId, token_id: &str) -> Result<(), RevocationError> {
        if self
            .store
            .compare_and_delete(&Self::key_of(user_id), token_id)
            .await?
        {
            Ok(())
        } else {
            Err(RevocationError::InvalidatedToken)
        }
    }
}
