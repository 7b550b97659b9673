use async_trait::async_trait;

use crate::errors::DispatchResult;

/// 日志游标使用的键值缓存
#[async_trait]
pub trait CursorCache: Send + Sync {
    async fn exists(&self, key: &str) -> DispatchResult<bool>;

    async fn get(&self, key: &str) -> DispatchResult<Option<String>>;

    async fn set(&self, key: &str, value: &str) -> DispatchResult<()>;
}
