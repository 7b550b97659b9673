use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Certificate, Client, Identity};
use sysadm_core::config::TransportConfig;
use sysadm_core::{AgentEndpoint, AgentTransport, DispatchError, DispatchResult, DispatchTarget};
use tokio::sync::RwLock;
use tracing::{debug, instrument, warn};

/// 决定客户端复用的连接参数
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ClientKey {
    host_id: i64,
    is_tls: bool,
    ca: String,
    cert: String,
    key: String,
    insecure_skip_verify: bool,
}

impl From<&DispatchTarget> for ClientKey {
    fn from(target: &DispatchTarget) -> Self {
        Self {
            host_id: target.host_id,
            is_tls: target.is_tls,
            ca: target.ca.clone(),
            cert: target.cert.clone(),
            key: target.key.clone(),
            insecure_skip_verify: target.insecure_skip_verify,
        }
    }
}

/// 基于reqwest的客户端访问实现
///
/// 每台主机按其TLS配置复用一个连接池，TLS配置变化后重新构建。
pub struct HttpAgentTransport {
    config: TransportConfig,
    clients: Arc<RwLock<HashMap<ClientKey, Client>>>,
}

impl HttpAgentTransport {
    pub fn new(config: TransportConfig) -> Self {
        Self {
            config,
            clients: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    async fn client_for(&self, target: &DispatchTarget) -> DispatchResult<Client> {
        let key = ClientKey::from(target);
        if let Some(client) = self.clients.read().await.get(&key) {
            return Ok(client.clone());
        }

        let client = self.build_client(target).await?;
        let mut clients = self.clients.write().await;
        clients.retain(|existing, _| existing.host_id != key.host_id);
        clients.insert(key, client.clone());
        Ok(client)
    }

    async fn build_client(&self, target: &DispatchTarget) -> DispatchResult<Client> {
        let mut builder = Client::builder()
            .use_rustls_tls()
            .connect_timeout(self.config.connect_timeout())
            .tcp_keepalive(self.config.keep_alive())
            .pool_idle_timeout(self.config.idle_timeout())
            .timeout(self.config.request_timeout());

        if target.is_tls {
            if !target.ca.trim().is_empty() {
                let ca = load_pem(&target.ca).await?;
                let certificate = Certificate::from_pem(&ca)
                    .map_err(|e| DispatchError::Configuration(format!("CA证书无效: {e}")))?;
                builder = builder.add_root_certificate(certificate);
            }

            match (target.cert.trim().is_empty(), target.key.trim().is_empty()) {
                (false, false) => {
                    let mut pem = load_pem(&target.cert).await?;
                    pem.push(b'\n');
                    pem.extend(load_pem(&target.key).await?);
                    let identity = Identity::from_pem(&pem)
                        .map_err(|e| DispatchError::Configuration(format!("客户端证书无效: {e}")))?;
                    builder = builder.identity(identity);
                }
                (true, true) => {}
                _ => warn!("主机 {} 的证书和私钥不完整，不使用客户端证书", target.host_id),
            }

            if target.insecure_skip_verify {
                builder = builder.danger_accept_invalid_certs(true);
            }
        }

        builder
            .build()
            .map_err(|e| DispatchError::Network(format!("创建HTTP客户端失败: {e}")))
    }
}

/// 证书字段既可以是PEM内容，也可以是PEM文件路径
async fn load_pem(value: &str) -> DispatchResult<Vec<u8>> {
    let value = value.trim();
    if value.starts_with("-----BEGIN") {
        return Ok(value.as_bytes().to_vec());
    }
    tokio::fs::read(value)
        .await
        .map_err(|e| DispatchError::Configuration(format!("读取证书文件 {value} 失败: {e}")))
}

#[async_trait]
impl AgentTransport for HttpAgentTransport {
    #[instrument(skip(self, target, body), fields(host_id = target.host_id, endpoint = ?endpoint))]
    async fn send_request(
        &self,
        target: &DispatchTarget,
        endpoint: AgentEndpoint,
        body: Vec<u8>,
    ) -> DispatchResult<Vec<u8>> {
        let client = self.client_for(target).await?;
        let url = target.url_for(endpoint);
        debug!("发送请求到 {}", url);

        let response = client
            .post(&url)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| {
                DispatchError::Network(format!("can not connect to agent {}: {e}", target.agent_addr()))
            })?;

        let status = response.status();
        let bytes = response.bytes().await.map_err(|e| {
            DispatchError::Network(format!("读取客户端 {} 响应失败: {e}", target.agent_addr()))
        })?;

        if !status.is_success() {
            return Err(DispatchError::AgentResponse(format!(
                "客户端 {} 返回 HTTP {}: {}",
                target.agent_addr(),
                status,
                String::from_utf8_lossy(&bytes)
            )));
        }

        Ok(bytes.to_vec())
    }
}
