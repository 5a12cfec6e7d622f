#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("infra error: {0}")]
    Store(String),
}

/// Minimal string key/value contract. No transactional guarantees.
#[async_trait::async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    async fn del(&self, key: &str) -> Result<(), StoreError>;

    /// Delete `key` only if it currently holds `expected`. Returns whether it
    /// was deleted. The default is a plain get-then-del and is NOT atomic;
    /// backends that can do better override it.
    async fn compare_and_delete(&self, key: &str, expected: &str) -> Result<bool, StoreError> {
        match self.get(key).await? {
            Some(current) if current == expected => {
                self.del(key).await?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
