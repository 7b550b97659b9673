use anyhow::{Context, Result};
use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::{
    agent::{AgentConfig, TransportConfig},
    cache::CacheConfig,
    database::DatabaseConfig,
    dispatcher::DispatcherConfig,
    observability::ObservabilityConfig,
};

/// 服务配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub cache: CacheConfig,
    pub dispatcher: DispatcherConfig,
    pub agent: AgentConfig,
    pub transport: TransportConfig,
    pub observability: ObservabilityConfig,
}

impl AppConfig {
    /// 加载配置
    ///
    /// 加载顺序:
    /// 1. 默认配置
    /// 2. 配置文件（TOML格式），指定路径时文件必须存在
    /// 3. 环境变量覆盖（前缀 SYSADM_，层级分隔符 __，例如 SYSADM_DISPATCHER__MAX_TRY_TIMES）
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut builder = ConfigBuilder::builder();

        if let Some(path) = config_path {
            if !Path::new(path).exists() {
                return Err(anyhow::anyhow!("配置文件不存在: {}", path));
            }
            builder = builder.add_source(File::new(path, FileFormat::Toml));
        } else {
            let default_paths = ["config/apiserver.toml", "apiserver.toml", "/etc/sysadm/apiserver.toml"];
            if let Some(path) = default_paths.iter().find(|p| Path::new(p).exists()) {
                builder = builder.add_source(File::new(path, FileFormat::Toml));
            }
        }

        builder = builder.add_source(
            Environment::with_prefix("SYSADM")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: AppConfig = builder
            .build()
            .context("构建配置失败")?
            .try_deserialize()
            .context("解析配置失败")?;

        config.validate()?;
        Ok(config)
    }

    /// 从TOML字符串加载配置
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(content).context("解析TOML配置失败")?;
        config.validate()?;
        Ok(config)
    }

    /// 导出为TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("序列化配置失败")
    }

    pub fn validate(&self) -> Result<()> {
        self.database.validate().context("数据库配置无效")?;
        self.cache.validate().context("缓存配置无效")?;
        self.dispatcher.validate().context("下发配置无效")?;
        self.agent.validate().context("客户端配置无效")?;
        self.transport.validate().context("传输配置无效")?;
        self.observability.validate().context("日志配置无效")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.dispatcher.max_try_times, 3);
        assert_eq!(config.dispatcher.max_execute_time_seconds, 3600);
        assert_eq!(config.dispatcher.concurrency_get_command_log, 10);
        assert_eq!(config.agent.command_logs_uri, "/getLogs");
        assert_eq!(config.transport.keep_alive_seconds, 15);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[dispatcher]\nmax_try_times = 5\nconcurrency_send_command = 4\n\n[cache]\nenabled = false"
        )
        .unwrap();

        let config = AppConfig::load(file.path().to_str()).unwrap();
        assert_eq!(config.dispatcher.max_try_times, 5);
        assert_eq!(config.dispatcher.concurrency_send_command, 4);
        assert_eq!(config.dispatcher.check_command_interval_seconds, 5);
        assert!(!config.cache.enabled);
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(AppConfig::load(Some("/nonexistent/apiserver.toml")).is_err());
    }

    #[test]
    fn rejects_invalid_values() {
        let mut config = AppConfig::default();
        config.dispatcher.concurrency_get_command_status = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.dispatcher.max_get_log_num_per_time = 111_111;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.agent.node_identifier = "IP,rack-1".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn toml_round_trip() {
        let text = AppConfig::default().to_toml().unwrap();
        let parsed = AppConfig::from_toml(&text).unwrap();
        assert_eq!(parsed.dispatcher.log_cursor_root, "/sysadm/apiserver/logs");
        assert_eq!(
            parsed.dispatcher.log_cursor_key("2024060100000000007"),
            "/sysadm/apiserver/logs/2024060100000000007"
        );
    }
}
