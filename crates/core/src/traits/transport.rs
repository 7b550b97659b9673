use async_trait::async_trait;

use crate::errors::DispatchResult;
use crate::models::{AgentEndpoint, DispatchTarget};

/// 访问客户端的传输层
///
/// 实现负责按目标的TLS设置构建客户端、拼接服务地址并以POST方式发送JSON请求体，
/// 返回客户端的原始响应体。连接、握手、超时等失败映射为 `DispatchError::Network`，
/// 非2xx响应映射为 `DispatchError::AgentResponse`。
#[async_trait]
pub trait AgentTransport: Send + Sync {
    async fn send_request(
        &self,
        target: &DispatchTarget,
        endpoint: AgentEndpoint,
        body: Vec<u8>,
    ) -> DispatchResult<Vec<u8>>;
}
