use serde::{Deserialize, Serialize};

use crate::config::AgentConfig;

/// 客户端提供的服务类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AgentEndpoint {
    /// 命令下发
    Command,
    /// 命令状态查询
    CommandStatus,
    /// 命令日志查询
    CommandLogs,
}

/// 待登记的主机
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewHost {
    pub agent_address: String,
    pub agent_port: u16,
    pub agent_is_tls: bool,
    pub agent_ca: String,
    pub agent_cert: String,
    pub agent_key: String,
    pub insecure_skip_verify: bool,
    pub command_uri: String,
    pub command_status_uri: String,
    pub command_logs_uri: String,
}

impl NewHost {
    pub fn new(agent_address: impl Into<String>, agent_port: u16) -> Self {
        Self {
            agent_address: agent_address.into(),
            agent_port,
            ..Default::default()
        }
    }
}

/// 由命令所属主机解析出的连接信息
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DispatchTarget {
    pub host_id: i64,
    pub address: String,
    /// 0 表示使用协议默认端口
    pub port: u16,
    pub is_tls: bool,
    pub ca: String,
    pub cert: String,
    pub key: String,
    pub insecure_skip_verify: bool,
    pub command_uri: String,
    pub command_status_uri: String,
    pub command_logs_uri: String,
}

impl DispatchTarget {
    /// 为未设置的服务路径填充默认值
    pub fn with_defaults(mut self, defaults: &AgentConfig) -> Self {
        if self.command_uri.trim().is_empty() {
            self.command_uri = defaults.command_uri.clone();
        }
        if self.command_status_uri.trim().is_empty() {
            self.command_status_uri = defaults.command_status_uri.clone();
        }
        if self.command_logs_uri.trim().is_empty() {
            self.command_logs_uri = defaults.command_logs_uri.clone();
        }
        self
    }

    pub fn path(&self, endpoint: AgentEndpoint) -> &str {
        match endpoint {
            AgentEndpoint::Command => &self.command_uri,
            AgentEndpoint::CommandStatus => &self.command_status_uri,
            AgentEndpoint::CommandLogs => &self.command_logs_uri,
        }
    }

    fn scheme(&self) -> &'static str {
        if self.is_tls {
            "https"
        } else {
            "http"
        }
    }

    fn effective_port(&self) -> u16 {
        match (self.port, self.is_tls) {
            (0, true) => 443,
            (0, false) => 80,
            (port, _) => port,
        }
    }

    /// 用于日志和状态信息的客户端地址
    pub fn agent_addr(&self) -> String {
        format!("{}:{}", self.address, self.effective_port())
    }

    /// 构造访问指定服务的URL，默认端口不出现在URL中
    pub fn url_for(&self, endpoint: AgentEndpoint) -> String {
        let path = self.path(endpoint).trim();
        let path = if path.is_empty() {
            "/".to_string()
        } else if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{path}")
        };

        let port = self.effective_port();
        let default_port = if self.is_tls { 443 } else { 80 };
        if port == default_port {
            format!("{}://{}{}", self.scheme(), self.address, path)
        } else {
            format!("{}://{}:{}{}", self.scheme(), self.address, port, path)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(is_tls: bool, port: u16) -> DispatchTarget {
        DispatchTarget {
            host_id: 1,
            address: "10.0.0.8".to_string(),
            port,
            is_tls,
            ca: String::new(),
            cert: String::new(),
            key: String::new(),
            insecure_skip_verify: false,
            command_uri: String::new(),
            command_status_uri: "getCommandStatus".to_string(),
            command_logs_uri: String::new(),
        }
    }

    #[test]
    fn default_ports_are_omitted() {
        let plain = target(false, 0).with_defaults(&AgentConfig::default());
        assert_eq!(
            plain.url_for(AgentEndpoint::Command),
            "http://10.0.0.8/receiveCommand"
        );
        assert_eq!(plain.agent_addr(), "10.0.0.8:80");

        let tls = target(true, 443).with_defaults(&AgentConfig::default());
        assert_eq!(tls.url_for(AgentEndpoint::CommandLogs), "https://10.0.0.8/getLogs");
    }

    #[test]
    fn custom_port_and_missing_slash() {
        let t = target(true, 8443);
        assert_eq!(
            t.url_for(AgentEndpoint::CommandStatus),
            "https://10.0.0.8:8443/getCommandStatus"
        );
        assert_eq!(t.url_for(AgentEndpoint::Command), "https://10.0.0.8:8443/");
    }

    #[test]
    fn host_specific_paths_win_over_defaults() {
        let mut t = target(false, 8080);
        t.command_uri = "/custom".to_string();
        let t = t.with_defaults(&AgentConfig::default());
        assert_eq!(t.command_uri, "/custom");
        assert_eq!(t.command_status_uri, "getCommandStatus");
        assert_eq!(t.command_logs_uri, "/getLogs");
    }
}
