use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::status::CommandStatusCode;
use crate::errors::{DispatchError, DispatchResult};

/// 参数名的最大长度
pub const MAX_PARAMETER_NAME_LEN: usize = 64;

/// 主动拉取的日志在日志表中的来源标记
pub const LOG_ORIGIN_POLL: i64 = 3;

/// 命令表中的一条活动命令
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandRecord {
    pub id: i64,
    pub command: String,
    pub host_id: i64,
    pub synchronized: bool,
    pub create_time: DateTime<Utc>,
    pub send_time: Option<DateTime<Utc>>,
    pub complete_time: Option<DateTime<Utc>>,
    pub try_times: i64,
    pub status: CommandStatusCode,
    pub status_msg: String,
}

impl CommandRecord {
    /// 执行截止时间，未下发的命令没有截止时间
    pub fn deadline(&self, max_execute_seconds: i64) -> Option<DateTime<Utc>> {
        self.send_time
            .map(|sent| sent + chrono::Duration::seconds(max_execute_seconds))
    }
}

/// 待入队的新命令
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewCommand {
    pub command: String,
    pub host_id: i64,
    pub synchronized: bool,
    pub parameters: BTreeMap<String, String>,
}

impl NewCommand {
    pub fn new(command: impl Into<String>, host_id: i64) -> Self {
        Self {
            command: command.into(),
            host_id,
            ..Default::default()
        }
    }

    pub fn with_parameter(mut self, name: &str, value: impl Into<String>) -> Self {
        self.parameters.insert(name.to_string(), value.into());
        self
    }

    pub fn synchronized(mut self, synchronized: bool) -> Self {
        self.synchronized = synchronized;
        self
    }

    /// 校验命令并规范化参数名（参数名不区分大小写）
    pub fn normalized(self) -> DispatchResult<Self> {
        if self.command.trim().is_empty() {
            return Err(DispatchError::Validation("命令名称不能为空".to_string()));
        }
        if self.host_id <= 0 {
            return Err(DispatchError::Validation(format!(
                "无效的主机ID: {}",
                self.host_id
            )));
        }

        let mut parameters = BTreeMap::new();
        for (name, value) in self.parameters {
            let name = name.trim().to_lowercase();
            if name.is_empty() || name.chars().count() > MAX_PARAMETER_NAME_LEN {
                return Err(DispatchError::Validation(format!(
                    "参数名长度必须在1到{MAX_PARAMETER_NAME_LEN}之间: {name}"
                )));
            }
            parameters.insert(name, value);
        }

        Ok(Self {
            parameters,
            ..self
        })
    }
}

/// 命令历史表中的一条记录，写入后不再修改
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandHistoryRecord {
    pub command_id: i64,
    pub command: String,
    pub host_id: i64,
    pub synchronized: bool,
    pub create_time: DateTime<Utc>,
    pub send_time: Option<DateTime<Utc>>,
    pub complete_time: Option<DateTime<Utc>>,
    pub try_times: i64,
    pub status: CommandStatusCode,
    pub status_msg: String,
}

/// 状态变更审计记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusHistoryEntry {
    pub command_id: i64,
    pub host_id: i64,
    pub command: String,
    pub status: CommandStatusCode,
    pub status_msg: String,
    pub received_time: DateTime<Utc>,
}

/// 日志表中的一行
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandLogRecord {
    pub log_seq: String,
    pub command_id: i64,
    pub create_time: DateTime<Utc>,
    pub level: u32,
    pub origin: i64,
    pub message: String,
}
