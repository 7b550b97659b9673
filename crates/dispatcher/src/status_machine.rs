use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use sysadm_core::{
    CommandRecord, CommandStatusCode, CommandStatusUpdate, CommandStore, CommandTransaction,
    DispatchError, DispatchResult, StatusHistoryEntry,
};
use tracing::{debug, info, instrument, warn};

/// 重试次数耗尽时写入历史表的状态信息
pub const MAX_TRY_TIMES_MESSAGE: &str = "command reached the maximum number of retries";

/// 执行超时时写入历史表的状态信息
pub const TIMEOUT_MESSAGE: &str = "execution timed out";

/// 一次状态变化的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusTransition {
    /// 子任务进度，只写审计记录
    Recorded,
    /// 命令记录已原地更新
    Updated { try_times: i64 },
    /// 重试次数耗尽，命令已移入历史表
    Archived { try_times: i64 },
}

/// 命令状态机
///
/// 命令的状态、重试次数和归档都只通过这里修改。每次调用都在一个事务中完成，
/// 并且无论记录是否变化都会追加一条状态审计记录。
pub struct StatusMachine {
    store: Arc<dyn CommandStore>,
    max_try_times: i64,
    max_execute_seconds: i64,
}

impl StatusMachine {
    pub fn new(store: Arc<dyn CommandStore>, max_try_times: i64, max_execute_seconds: i64) -> Self {
        Self {
            store,
            max_try_times,
            max_execute_seconds,
        }
    }

    pub fn max_try_times(&self) -> i64 {
        self.max_try_times
    }

    /// 在新事务中应用状态，成功提交，失败回滚
    #[instrument(skip(self, command, status, message), fields(status = %status))]
    pub async fn apply_status(
        &self,
        command_id: i64,
        host_id: i64,
        command: &str,
        status: CommandStatusCode,
        message: &str,
    ) -> DispatchResult<StatusTransition> {
        let mut tx = self.store.begin().await?;
        match self
            .apply_status_in(tx.as_mut(), command_id, host_id, command, status, message)
            .await
        {
            Ok(transition) => {
                tx.commit().await?;
                Ok(transition)
            }
            Err(e) => {
                if let Err(rollback) = tx.rollback().await {
                    warn!("回滚命令 {} 的状态事务失败: {}", command_id, rollback);
                }
                Err(e)
            }
        }
    }

    /// 在调用方的事务中应用状态，不提交也不回滚
    ///
    /// 子任务进度不读取命令记录，命令已归档时同样写入审计记录。
    pub async fn apply_status_in(
        &self,
        tx: &mut dyn CommandTransaction,
        command_id: i64,
        host_id: i64,
        command: &str,
        status: CommandStatusCode,
        message: &str,
    ) -> DispatchResult<StatusTransition> {
        let transition = if status.is_task_progress() {
            StatusTransition::Recorded
        } else {
            self.transition_record(tx, command_id, status, message)
                .await?
        };

        tx.append_status_history(&StatusHistoryEntry {
            command_id,
            host_id,
            command: command.to_string(),
            status,
            status_msg: message.to_string(),
            received_time: Utc::now(),
        })
        .await?;

        debug!("命令 {} 状态变化: {:?}", command_id, transition);
        Ok(transition)
    }

    async fn transition_record(
        &self,
        tx: &mut dyn CommandTransaction,
        command_id: i64,
        status: CommandStatusCode,
        message: &str,
    ) -> DispatchResult<StatusTransition> {
        let record = tx
            .get_command(command_id)
            .await?
            .ok_or(DispatchError::CommandNotFound { id: command_id })?;

        let transition = if status.is_failure() {
            let try_times = record.try_times + 1;
            if try_times >= self.max_try_times {
                tx.archive_command(&record, status, MAX_TRY_TIMES_MESSAGE)
                    .await?;
                info!(
                    "命令 {} 已重试 {} 次，移入历史表",
                    command_id, try_times
                );
                StatusTransition::Archived { try_times }
            } else {
                let update = CommandStatusUpdate::new(status, try_times, message);
                self.update_in_place(tx, command_id, &update).await?;
                StatusTransition::Updated { try_times }
            }
        } else {
            let mut update = CommandStatusUpdate::new(status, record.try_times, message);
            let now = Utc::now();
            if status.marks_delivery() && record.send_time.is_none() {
                update.send_time = Some(now);
            }
            if status == CommandStatusCode::Ok {
                update.complete_time = Some(now);
            }
            self.update_in_place(tx, command_id, &update).await?;
            StatusTransition::Updated {
                try_times: record.try_times,
            }
        };
        Ok(transition)
    }

    async fn update_in_place(
        &self,
        tx: &mut dyn CommandTransaction,
        command_id: i64,
        update: &CommandStatusUpdate,
    ) -> DispatchResult<()> {
        if tx.update_status(command_id, update).await? == 0 {
            return Err(DispatchError::CommandNotFound { id: command_id });
        }
        Ok(())
    }

    /// 超时判定的截止时间：发送时间早于该时刻的在途命令视为超时
    pub fn overtime_deadline(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - Duration::seconds(self.max_execute_seconds)
    }

    /// 在新事务中清理超时命令，返回被归档的命令ID
    #[instrument(skip(self))]
    pub async fn sweep_overtime(&self) -> DispatchResult<Vec<i64>> {
        let mut tx = self.store.begin().await?;
        match self.sweep_overtime_in(tx.as_mut()).await {
            Ok(archived) => {
                tx.commit().await?;
                Ok(archived)
            }
            Err(e) => {
                if let Err(rollback) = tx.rollback().await {
                    warn!("回滚超时清理事务失败: {}", rollback);
                }
                Err(e)
            }
        }
    }

    /// 在调用方的事务中清理超时命令
    pub async fn sweep_overtime_in(
        &self,
        tx: &mut dyn CommandTransaction,
    ) -> DispatchResult<Vec<i64>> {
        let now = Utc::now();
        let overtime: Vec<CommandRecord> =
            tx.overtime_commands(self.overtime_deadline(now)).await?;

        let mut archived = Vec::with_capacity(overtime.len());
        for record in overtime {
            tx.archive_command(&record, CommandStatusCode::Timeout, TIMEOUT_MESSAGE)
                .await?;
            tx.append_status_history(&StatusHistoryEntry {
                command_id: record.id,
                host_id: record.host_id,
                command: record.command.clone(),
                status: CommandStatusCode::Timeout,
                status_msg: TIMEOUT_MESSAGE.to_string(),
                received_time: now,
            })
            .await?;
            archived.push(record.id);
        }

        if !archived.is_empty() {
            info!("{} 条命令执行超时，已移入历史表", archived.len());
        }
        Ok(archived)
    }
}
