use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use sysadm_core::{CursorCache, DispatchResult};
use tokio::sync::RwLock;

/// Process-local cursor cache; cursors are lost on restart
#[derive(Debug, Clone, Default)]
pub struct MemoryCursorCache {
    entries: Arc<RwLock<HashMap<String, String>>>,
}

impl MemoryCursorCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl CursorCache for MemoryCursorCache {
    async fn exists(&self, key: &str) -> DispatchResult<bool> {
        Ok(self.entries.read().await.contains_key(key))
    }

    async fn get(&self, key: &str) -> DispatchResult<Option<String>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> DispatchResult<()> {
        self.entries
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_then_get() {
        let cache = MemoryCursorCache::new();
        assert!(!cache.exists("/logs/1").await.unwrap());
        assert!(cache.is_empty().await);

        cache.set("/logs/1", "20240601000003").await.unwrap();
        assert!(cache.exists("/logs/1").await.unwrap());
        assert_eq!(
            cache.get("/logs/1").await.unwrap().as_deref(),
            Some("20240601000003")
        );
        assert_eq!(cache.len().await, 1);
    }
}
