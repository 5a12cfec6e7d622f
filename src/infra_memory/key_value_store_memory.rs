use crate::domain_port::*;
use dashmap::DashMap;

#[derive(Default)]
pub struct MemoryKeyValueStore {
    entries: DashMap<String, String>,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl KeyValueStore for MemoryKeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.get(key).map(|v| v.clone()))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<(), StoreError> {
        self.entries.remove(key);
        Ok(())
    }

    async fn compare_and_delete(&self, key: &str, expected: &str) -> Result<bool, StoreError> {
        Ok(self.entries.remove_if(key, |_, v| v == expected).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn compare_and_delete_only_removes_matching_value() {
        let store = MemoryKeyValueStore::new();
        store.set("k", "v1").await.unwrap();

        assert!(!store.compare_and_delete("k", "v2").await.unwrap());
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v1"));

        assert!(store.compare_and_delete("k", "v1").await.unwrap());
        assert_eq!(store.get("k").await.unwrap(), None);
        assert!(!store.compare_and_delete("k", "v1").await.unwrap());
    }
}
