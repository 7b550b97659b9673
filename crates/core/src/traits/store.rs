//! 命令存储接口定义
//!
//! 命令生命周期的唯一数据来源，所有状态变更都在事务内完成：
//! - `CommandStore` 负责开启事务以及不需要事务的只读查询
//! - `CommandTransaction` 负责事务内的读写，`commit`/`rollback` 会消费事务
//!
//! ## 表结构
//!
//! - `host` - 客户端连接信息
//! - `command` / `command_parameters` - 活动命令及其参数
//! - `command_history` - 已归档的命令，只追加
//! - `command_status_history` - 状态变更审计记录，只追加
//! - `command_logs` - 从客户端拉取的命令日志
//!
//! ## 使用示例
//!
//! ```rust,ignore
//! async fn mark_running(store: &dyn CommandStore, id: i64) -> DispatchResult<()> {
//!     let mut tx = store.begin().await?;
//!     let update = CommandStatusUpdate::new(CommandStatusCode::Running, 0, "running");
//!     if tx.update_status(id, &update).await? == 0 {
//!         tx.rollback().await?;
//!         return Err(DispatchError::CommandNotFound { id });
//!     }
//!     tx.commit().await
//! }
//! ```

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::config::AgentConfig;
use crate::errors::DispatchResult;
use crate::models::{
    CommandHistoryRecord, CommandLogRecord, CommandRecord, CommandStatusCode, DispatchTarget,
    NewCommand, NewHost, StatusHistoryEntry,
};

/// 命令状态的原地更新
#[derive(Debug, Clone, PartialEq)]
pub struct CommandStatusUpdate {
    pub status: CommandStatusCode,
    pub try_times: i64,
    pub status_msg: String,
    /// 仅在为Some时写入
    pub send_time: Option<DateTime<Utc>>,
    /// 仅在为Some时写入
    pub complete_time: Option<DateTime<Utc>>,
}

impl CommandStatusUpdate {
    pub fn new(status: CommandStatusCode, try_times: i64, status_msg: impl Into<String>) -> Self {
        Self {
            status,
            try_times,
            status_msg: status_msg.into(),
            send_time: None,
            complete_time: None,
        }
    }
}

#[async_trait]
pub trait CommandStore: Send + Sync {
    /// 开启一个新事务
    async fn begin(&self) -> DispatchResult<Box<dyn CommandTransaction>>;

    /// 按状态查询候选命令，`max_try_times` 为Some时只返回尝试次数小于该值的命令
    async fn list_candidates(
        &self,
        statuses: &[CommandStatusCode],
        max_try_times: Option<i64>,
    ) -> DispatchResult<Vec<CommandRecord>>;

    /// 解析主机的连接信息，未设置的服务路径使用默认值
    async fn resolve_target(
        &self,
        host_id: i64,
        defaults: &AgentConfig,
    ) -> DispatchResult<DispatchTarget>;

    async fn command_parameters(&self, command_id: i64) -> DispatchResult<BTreeMap<String, String>>;

    async fn find_command(&self, id: i64) -> DispatchResult<Option<CommandRecord>>;

    async fn history_of(&self, command_id: i64) -> DispatchResult<Vec<CommandHistoryRecord>>;

    async fn status_history_of(&self, command_id: i64) -> DispatchResult<Vec<StatusHistoryEntry>>;

    async fn logs_of(&self, command_id: i64) -> DispatchResult<Vec<CommandLogRecord>>;

    async fn create_host(&self, host: &NewHost) -> DispatchResult<i64>;

    /// 命令入队，状态为 Created
    async fn create_command(&self, command: NewCommand) -> DispatchResult<i64>;
}

#[async_trait]
pub trait CommandTransaction: Send {
    async fn get_command(&mut self, id: i64) -> DispatchResult<Option<CommandRecord>>;

    /// 返回受影响的行数
    async fn update_status(&mut self, id: i64, update: &CommandStatusUpdate) -> DispatchResult<u64>;

    /// 将命令写入历史表，并删除活动命令及其参数
    async fn archive_command(
        &mut self,
        record: &CommandRecord,
        status: CommandStatusCode,
        status_msg: &str,
    ) -> DispatchResult<()>;

    /// 下发时间早于 `sent_before` 且状态为 Sent 或 Running 的命令
    async fn overtime_commands(
        &mut self,
        sent_before: DateTime<Utc>,
    ) -> DispatchResult<Vec<CommandRecord>>;

    async fn append_status_history(&mut self, entry: &StatusHistoryEntry) -> DispatchResult<()>;

    async fn append_log(&mut self, entry: &CommandLogRecord) -> DispatchResult<()>;

    async fn commit(self: Box<Self>) -> DispatchResult<()>;

    async fn rollback(self: Box<Self>) -> DispatchResult<()>;
}
