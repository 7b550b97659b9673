use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::models::NodeIdentifierSpec;

/// 客户端服务路径的默认值，主机表中未设置时使用
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub command_uri: String,
    pub command_status_uri: String,
    pub command_logs_uri: String,
    /// 请求中携带的节点标识串，为空时由客户端自行决定
    pub node_identifier: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            command_uri: "/receiveCommand".to_string(),
            command_status_uri: "/getCommandStatus".to_string(),
            command_logs_uri: "/getLogs".to_string(),
            node_identifier: String::new(),
        }
    }
}

impl AgentConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if !self.node_identifier.trim().is_empty() {
            NodeIdentifierSpec::parse(&self.node_identifier)
                .map_err(|e| anyhow::anyhow!("节点标识串配置错误: {e}"))?;
        }
        Ok(())
    }
}

/// 访问客户端的HTTP连接参数
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    pub dial_timeout_seconds: u64,
    pub keep_alive_seconds: u64,
    pub tls_handshake_timeout_seconds: u64,
    pub idle_conn_timeout_seconds: u64,
    /// 单次请求的总超时
    pub request_timeout_seconds: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            dial_timeout_seconds: 180,
            keep_alive_seconds: 15,
            tls_handshake_timeout_seconds: 5,
            idle_conn_timeout_seconds: 60,
            request_timeout_seconds: 180,
        }
    }
}

impl TransportConfig {
    /// 建立连接的超时，包含TLS握手
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.dial_timeout_seconds + self.tls_handshake_timeout_seconds)
    }

    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_seconds)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_conn_timeout_seconds)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.dial_timeout_seconds == 0 || self.request_timeout_seconds == 0 {
            return Err(anyhow::anyhow!("连接超时和请求超时必须大于0"));
        }
        Ok(())
    }
}
