use serde::{Deserialize, Serialize};

/// 日志游标缓存配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// 关闭时使用进程内缓存，重启后游标丢失
    pub enabled: bool,
    pub redis_url: String,
    pub connection_timeout_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            redis_url: "redis://127.0.0.1:6379".to_string(),
            connection_timeout_seconds: 5,
        }
    }
}

impl CacheConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.enabled && !self.redis_url.starts_with("redis") {
            return Err(anyhow::anyhow!("Redis URL格式错误: {}", self.redis_url));
        }
        if self.connection_timeout_seconds == 0 {
            return Err(anyhow::anyhow!("Redis连接超时时间必须大于0"));
        }
        Ok(())
    }
}
