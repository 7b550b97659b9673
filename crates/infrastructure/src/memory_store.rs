use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sysadm_core::config::AgentConfig;
use sysadm_core::{
    CommandHistoryRecord, CommandLogRecord, CommandRecord, CommandStatusCode,
    CommandStatusUpdate, CommandStore, CommandTransaction, DispatchError, DispatchResult,
    DispatchTarget, NewCommand, NewHost, StatusHistoryEntry,
};
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Debug, Clone, Default)]
struct Tables {
    next_host_id: i64,
    next_command_id: i64,
    hosts: BTreeMap<i64, DispatchTarget>,
    commands: BTreeMap<i64, CommandRecord>,
    parameters: BTreeMap<i64, BTreeMap<String, String>>,
    history: BTreeMap<i64, CommandHistoryRecord>,
    status_history: Vec<StatusHistoryEntry>,
    logs: Vec<CommandLogRecord>,
}

/// 内存命令存储
///
/// 适用于嵌入式运行和测试。事务在提交或回滚之前独占整个存储，
/// 因此持有事务的任务不能再调用存储级别的查询。
#[derive(Debug, Clone, Default)]
pub struct MemoryCommandStore {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryCommandStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 当前活动命令数量
    pub async fn active_count(&self) -> usize {
        self.tables.lock().await.commands.len()
    }
}

#[async_trait]
impl CommandStore for MemoryCommandStore {
    async fn begin(&self) -> DispatchResult<Box<dyn CommandTransaction>> {
        let guard = Arc::clone(&self.tables).lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(MemoryCommandTransaction { guard, working }))
    }

    async fn list_candidates(
        &self,
        statuses: &[CommandStatusCode],
        max_try_times: Option<i64>,
    ) -> DispatchResult<Vec<CommandRecord>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .commands
            .values()
            .filter(|record| statuses.contains(&record.status))
            .filter(|record| max_try_times.map_or(true, |max| record.try_times < max))
            .cloned()
            .collect())
    }

    async fn resolve_target(
        &self,
        host_id: i64,
        defaults: &AgentConfig,
    ) -> DispatchResult<DispatchTarget> {
        let tables = self.tables.lock().await;
        tables
            .hosts
            .get(&host_id)
            .cloned()
            .map(|target| target.with_defaults(defaults))
            .ok_or(DispatchError::HostNotFound { id: host_id })
    }

    async fn command_parameters(&self, command_id: i64) -> DispatchResult<BTreeMap<String, String>> {
        let tables = self.tables.lock().await;
        Ok(tables.parameters.get(&command_id).cloned().unwrap_or_default())
    }

    async fn find_command(&self, id: i64) -> DispatchResult<Option<CommandRecord>> {
        Ok(self.tables.lock().await.commands.get(&id).cloned())
    }

    async fn history_of(&self, command_id: i64) -> DispatchResult<Vec<CommandHistoryRecord>> {
        let tables = self.tables.lock().await;
        Ok(tables.history.get(&command_id).cloned().into_iter().collect())
    }

    async fn status_history_of(&self, command_id: i64) -> DispatchResult<Vec<StatusHistoryEntry>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .status_history
            .iter()
            .filter(|entry| entry.command_id == command_id)
            .cloned()
            .collect())
    }

    async fn logs_of(&self, command_id: i64) -> DispatchResult<Vec<CommandLogRecord>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .logs
            .iter()
            .filter(|entry| entry.command_id == command_id)
            .cloned()
            .collect())
    }

    async fn create_host(&self, host: &NewHost) -> DispatchResult<i64> {
        let mut tables = self.tables.lock().await;
        tables.next_host_id += 1;
        let host_id = tables.next_host_id;
        tables.hosts.insert(
            host_id,
            DispatchTarget {
                host_id,
                address: host.agent_address.clone(),
                port: host.agent_port,
                is_tls: host.agent_is_tls,
                ca: host.agent_ca.clone(),
                cert: host.agent_cert.clone(),
                key: host.agent_key.clone(),
                insecure_skip_verify: host.insecure_skip_verify,
                command_uri: host.command_uri.clone(),
                command_status_uri: host.command_status_uri.clone(),
                command_logs_uri: host.command_logs_uri.clone(),
            },
        );
        Ok(host_id)
    }

    async fn create_command(&self, command: NewCommand) -> DispatchResult<i64> {
        let command = command.normalized()?;
        let mut tables = self.tables.lock().await;
        tables.next_command_id += 1;
        let id = tables.next_command_id;
        tables.commands.insert(
            id,
            CommandRecord {
                id,
                command: command.command,
                host_id: command.host_id,
                synchronized: command.synchronized,
                create_time: Utc::now(),
                send_time: None,
                complete_time: None,
                try_times: 0,
                status: CommandStatusCode::Created,
                status_msg: String::new(),
            },
        );
        tables.parameters.insert(id, command.parameters);
        Ok(id)
    }
}

/// 在工作副本上执行，提交时整体替换存储内容
pub struct MemoryCommandTransaction {
    guard: OwnedMutexGuard<Tables>,
    working: Tables,
}

#[async_trait]
impl CommandTransaction for MemoryCommandTransaction {
    async fn get_command(&mut self, id: i64) -> DispatchResult<Option<CommandRecord>> {
        Ok(self.working.commands.get(&id).cloned())
    }

    async fn update_status(&mut self, id: i64, update: &CommandStatusUpdate) -> DispatchResult<u64> {
        let Some(record) = self.working.commands.get_mut(&id) else {
            return Ok(0);
        };
        record.status = update.status;
        record.try_times = update.try_times;
        record.status_msg = update.status_msg.clone();
        if let Some(send_time) = update.send_time {
            record.send_time = Some(send_time);
        }
        if let Some(complete_time) = update.complete_time {
            record.complete_time = Some(complete_time);
        }
        Ok(1)
    }

    async fn archive_command(
        &mut self,
        record: &CommandRecord,
        status: CommandStatusCode,
        status_msg: &str,
    ) -> DispatchResult<()> {
        if self.working.history.contains_key(&record.id) {
            return Err(DispatchError::Internal(format!(
                "命令 {} 已存在于历史表中",
                record.id
            )));
        }
        self.working.history.insert(
            record.id,
            CommandHistoryRecord {
                command_id: record.id,
                command: record.command.clone(),
                host_id: record.host_id,
                synchronized: record.synchronized,
                create_time: record.create_time,
                send_time: record.send_time,
                complete_time: record.complete_time,
                try_times: record.try_times,
                status,
                status_msg: status_msg.to_string(),
            },
        );
        self.working.parameters.remove(&record.id);
        self.working
            .commands
            .remove(&record.id)
            .map(|_| ())
            .ok_or(DispatchError::CommandNotFound { id: record.id })
    }

    async fn overtime_commands(
        &mut self,
        sent_before: DateTime<Utc>,
    ) -> DispatchResult<Vec<CommandRecord>> {
        Ok(self
            .working
            .commands
            .values()
            .filter(|record| {
                matches!(
                    record.status,
                    CommandStatusCode::Sent | CommandStatusCode::Running
                )
            })
            .filter(|record| record.send_time.is_some_and(|sent| sent <= sent_before))
            .cloned()
            .collect())
    }

    async fn append_status_history(&mut self, entry: &StatusHistoryEntry) -> DispatchResult<()> {
        self.working.status_history.push(entry.clone());
        Ok(())
    }

    async fn append_log(&mut self, entry: &CommandLogRecord) -> DispatchResult<()> {
        self.working.logs.push(entry.clone());
        Ok(())
    }

    async fn commit(self: Box<Self>) -> DispatchResult<()> {
        let MemoryCommandTransaction { mut guard, working } = *self;
        *guard = working;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> DispatchResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rollback_discards_changes() {
        let store = MemoryCommandStore::new();
        let host_id = store.create_host(&NewHost::new("10.0.0.1", 0)).await.unwrap();
        let id = store.create_command(NewCommand::new("addyum", host_id)).await.unwrap();

        let mut tx = store.begin().await.unwrap();
        let update = CommandStatusUpdate::new(CommandStatusCode::Sent, 0, "sent");
        assert_eq!(tx.update_status(id, &update).await.unwrap(), 1);
        tx.rollback().await.unwrap();

        let record = store.find_command(id).await.unwrap().unwrap();
        assert_eq!(record.status, CommandStatusCode::Created);
    }

    #[tokio::test]
    async fn commit_publishes_archive() {
        let store = MemoryCommandStore::new();
        let host_id = store.create_host(&NewHost::new("10.0.0.1", 0)).await.unwrap();
        let id = store
            .create_command(NewCommand::new("addyum", host_id).with_parameter("Repo", "base"))
            .await
            .unwrap();
        assert_eq!(
            store.command_parameters(id).await.unwrap().get("repo").map(String::as_str),
            Some("base")
        );

        let record = store.find_command(id).await.unwrap().unwrap();
        let mut tx = store.begin().await.unwrap();
        tx.archive_command(&record, CommandStatusCode::Timeout, "execution timed out")
            .await
            .unwrap();
        tx.commit().await.unwrap();

        assert_eq!(store.active_count().await, 0);
        assert!(store.command_parameters(id).await.unwrap().is_empty());
        assert_eq!(store.history_of(id).await.unwrap().len(), 1);
    }
}
