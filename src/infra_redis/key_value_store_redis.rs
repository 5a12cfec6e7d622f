use crate::domain_port::*;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Script};

const COMPARE_AND_DELETE: &str = include_str!("compare_and_delete.lua");

pub struct RedisKeyValueStore {
    conn: ConnectionManager,
    prefix: String,
    compare_and_delete: Script,
}

impl RedisKeyValueStore {
    pub fn new(conn: ConnectionManager, prefix: impl Into<String>) -> Self {
        RedisKeyValueStore {
            conn,
            prefix: prefix.into(),
            compare_and_delete: Script::new(COMPARE_AND_DELETE),
        }
    }

    fn key(&self, key: &str) -> String {
        if self.prefix.is_empty() {
            key.to_string()
        } else {
            format!("{}:{}", self.prefix, key)
        }
    }
}

#[async_trait::async_trait]
impl KeyValueStore for RedisKeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let key = self.key(key);
        let mut conn = self.conn.clone();
        let value: Option<String> = conn
            .get(&key)
            .await
            .map_err(|e| StoreError::Store(e.to_string()))?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let key = self.key(key);
        let mut conn = self.conn.clone();
        let _: () = conn
            .set(&key, value)
            .await
            .map_err(|e| StoreError::Store(e.to_string()))?;
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<(), StoreError> {
        let key = self.key(key);
        let mut conn = self.conn.clone();
        let _: () = conn
            .del(&key)
            .await
            .map_err(|e| StoreError::Store(e.to_string()))?;
        Ok(())
    }

    async fn compare_and_delete(&self, key: &str, expected: &str) -> Result<bool, StoreError> {
        let key = self.key(key);
        let mut conn = self.conn.clone();
        let deleted: i64 = self
            .compare_and_delete
            .key(&key)
            .arg(expected)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| StoreError::Store(e.to_string()))?;
        Ok(deleted == 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Needs a reachable Redis, e.g.
    /// `GATEKEEPER_TEST_REDIS=redis://127.0.0.1:6379 cargo test -- --ignored`
    async fn store() -> Option<RedisKeyValueStore> {
        let dsn = std::env::var("GATEKEEPER_TEST_REDIS").ok()?;
        let client = redis::Client::open(dsn).unwrap();
        let conn = client.get_connection_manager().await.unwrap();
        Some(RedisKeyValueStore::new(
            conn,
            format!("gatekeeper-test:{}", uuid::Uuid::new_v4()),
        ))
    }

    #[tokio::test]
    #[ignore]
    async fn compare_and_delete_removes_only_matching_value_once() {
        let Some(store) = store().await else {
            return;
        };
        store.set("user-1", "rt-1").await.unwrap();

        assert!(!store.compare_and_delete("user-1", "rt-0").await.unwrap());
        assert_eq!(store.get("user-1").await.unwrap().as_deref(), Some("rt-1"));

        assert!(store.compare_and_delete("user-1", "rt-1").await.unwrap());
        assert_eq!(store.get("user-1").await.unwrap(), None);
        assert!(!store.compare_and_delete("user-1", "rt-1").await.unwrap());
        assert!(!store.compare_and_delete("user-2", "rt-1").await.unwrap());
    }

    #[tokio::test]
    #[ignore]
    async fn concurrent_compare_and_delete_has_one_winner() {
        let Some(store) = store().await else {
            return;
        };
        let store = std::sync::Arc::new(store);
        store.set("user-7", "rt-7").await.unwrap();

        let attempts = (0..8).map(|_| {
            let store = store.clone();
            tokio::spawn(async move { store.compare_and_delete("user-7", "rt-7").await.unwrap() })
        });
        let wins = futures_util::future::join_all(attempts)
            .await
            .into_iter()
            .filter(|won| *won.as_ref().unwrap())
            .count();
        assert_eq!(wins, 1);
    }

    #[tokio::test]
    #[ignore]
    async fn set_overwrites_and_del_clears() {
        let Some(store) = store().await else {
            return;
        };
        store.set("user-3", "a").await.unwrap();
        store.set("user-3", "b").await.unwrap();
        assert_eq!(store.get("user-3").await.unwrap().as_deref(), Some("b"));

        store.del("user-3").await.unwrap();
        assert_eq!(store.get("user-3").await.unwrap(), None);
    }
}
