use thiserror::Error;

/// 命令下发引擎错误类型定义
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),

    #[error("命令未找到: {id}")]
    CommandNotFound { id: i64 },

    #[error("主机未找到: {id}")]
    HostNotFound { id: i64 },

    #[error("无效的序列号: {0}")]
    InvalidSequence(String),

    #[error("数据校验失败: {0}")]
    Validation(String),

    #[error("序列化错误: {0}")]
    Serialization(String),

    #[error("网络错误: {0}")]
    Network(String),

    #[error("客户端响应错误: {0}")]
    AgentResponse(String),

    #[error("缓存错误: {0}")]
    CacheError(String),

    #[error("配置错误: {0}")]
    Configuration(String),

    #[error("内部错误: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for DispatchError {
    fn from(err: serde_json::Error) -> Self {
        DispatchError::Serialization(err.to_string())
    }
}

impl DispatchError {
    /// 是否为命令或主机不存在类错误
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            DispatchError::CommandNotFound { .. } | DispatchError::HostNotFound { .. }
        )
    }
}

/// 统一的Result类型
pub type DispatchResult<T> = std::result::Result<T, DispatchError>;
