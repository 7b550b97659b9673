use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::sequence::LOG_END_INDEX;

/// 主动模式下三个轮询循环的配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    pub enabled: bool,
    /// 命令最大尝试次数，达到后命令被归档
    pub max_try_times: i64,
    /// 命令下发后允许执行的最长时间
    pub max_execute_time_seconds: i64,
    pub check_command_interval_seconds: u64,
    pub get_status_interval_seconds: u64,
    pub get_log_interval_seconds: u64,
    pub concurrency_send_command: usize,
    pub concurrency_get_command_status: usize,
    pub concurrency_get_command_log: usize,
    /// 单次拉取的最大日志条数
    pub max_get_log_num_per_time: i64,
    /// 日志游标在缓存中的根路径
    pub log_cursor_root: String,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_try_times: 3,
            max_execute_time_seconds: 3600,
            check_command_interval_seconds: 5,
            get_status_interval_seconds: 5,
            get_log_interval_seconds: 5,
            concurrency_send_command: 10,
            concurrency_get_command_status: 10,
            concurrency_get_command_log: 10,
            max_get_log_num_per_time: 10,
            log_cursor_root: "/sysadm/apiserver/logs".to_string(),
        }
    }
}

impl DispatcherConfig {
    pub fn check_command_interval(&self) -> Duration {
        Duration::from_secs(self.check_command_interval_seconds)
    }

    pub fn get_status_interval(&self) -> Duration {
        Duration::from_secs(self.get_status_interval_seconds)
    }

    pub fn get_log_interval(&self) -> Duration {
        Duration::from_secs(self.get_log_interval_seconds)
    }

    /// 日志游标在缓存中的键
    pub fn log_cursor_key(&self, command_seq: &str) -> String {
        format!("{}/{}", self.log_cursor_root.trim_end_matches('/'), command_seq)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.max_try_times <= 0 {
            return Err(anyhow::anyhow!("命令最大尝试次数必须大于0"));
        }

        if self.max_execute_time_seconds <= 0 {
            return Err(anyhow::anyhow!("命令最长执行时间必须大于0"));
        }

        if self.check_command_interval_seconds == 0
            || self.get_status_interval_seconds == 0
            || self.get_log_interval_seconds == 0
        {
            return Err(anyhow::anyhow!("轮询间隔必须大于0"));
        }

        if self.concurrency_send_command == 0
            || self.concurrency_get_command_status == 0
            || self.concurrency_get_command_log == 0
        {
            return Err(anyhow::anyhow!("并发数必须大于0"));
        }

        if self.max_get_log_num_per_time <= 0
            || self.max_get_log_num_per_time >= i64::from(LOG_END_INDEX)
        {
            return Err(anyhow::anyhow!(
                "单次获取日志条数必须在1到{}之间",
                LOG_END_INDEX - 1
            ));
        }

        if self.log_cursor_root.trim().is_empty() {
            return Err(anyhow::anyhow!("日志游标根路径不能为空"));
        }

        Ok(())
    }
}
