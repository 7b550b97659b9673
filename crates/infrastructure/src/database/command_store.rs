use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Any, AnyPool, Row, Transaction};
use sysadm_core::config::AgentConfig;
use sysadm_core::{
    CommandHistoryRecord, CommandLogRecord, CommandRecord, CommandStatusCode,
    CommandStatusUpdate, CommandStore, CommandTransaction, DispatchError, DispatchResult,
    DispatchTarget, NewCommand, NewHost, StatusHistoryEntry,
};
use tracing::{debug, instrument};

use super::mapping::MappingHelpers;

const COMMAND_COLUMNS: &str = "command_id, command, host_id, synchronized, create_time, \
     send_time, complete_time, try_times, status, status_msg";

const HOST_COLUMNS: &str = "host_id, agent_address, agent_port, agent_is_tls, agent_ca, \
     agent_cert, agent_key, insecure_skip_verify, command_uri, command_status_uri, command_logs_uri";

fn placeholders(start: usize, count: usize) -> String {
    (start..start + count)
        .map(|i| format!("${i}"))
        .collect::<Vec<_>>()
        .join(", ")
}

fn status_value(status: CommandStatusCode) -> i64 {
    i64::from(status.code())
}

fn flag_value(flag: bool) -> i64 {
    i64::from(flag)
}

/// 基于sqlx的命令存储，同时支持SQLite和PostgreSQL
#[derive(Clone)]
pub struct SqlCommandStore {
    pool: AnyPool,
}

impl SqlCommandStore {
    pub fn new(pool: AnyPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CommandStore for SqlCommandStore {
    async fn begin(&self) -> DispatchResult<Box<dyn CommandTransaction>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(SqlCommandTransaction { tx }))
    }

    #[instrument(skip(self))]
    async fn list_candidates(
        &self,
        statuses: &[CommandStatusCode],
        max_try_times: Option<i64>,
    ) -> DispatchResult<Vec<CommandRecord>> {
        if statuses.is_empty() {
            return Ok(Vec::new());
        }

        let mut sql = format!(
            "SELECT {COMMAND_COLUMNS} FROM command WHERE status IN ({})",
            placeholders(1, statuses.len())
        );
        if max_try_times.is_some() {
            sql.push_str(&format!(" AND try_times < ${}", statuses.len() + 1));
        }
        sql.push_str(" ORDER BY command_id");

        let mut query = sqlx::query(&sql);
        for status in statuses {
            query = query.bind(status_value(*status));
        }
        if let Some(max_try_times) = max_try_times {
            query = query.bind(max_try_times);
        }

        let rows = query.fetch_all(&self.pool).await?;
        let records = rows
            .iter()
            .map(MappingHelpers::row_to_command)
            .collect::<DispatchResult<Vec<_>>>()?;

        debug!("查询到 {} 条候选命令", records.len());
        Ok(records)
    }

    async fn resolve_target(
        &self,
        host_id: i64,
        defaults: &AgentConfig,
    ) -> DispatchResult<DispatchTarget> {
        let sql = format!("SELECT {HOST_COLUMNS} FROM host WHERE host_id = $1");
        let row = sqlx::query(&sql)
            .bind(host_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(DispatchError::HostNotFound { id: host_id })?;

        Ok(MappingHelpers::row_to_target(&row)?.with_defaults(defaults))
    }

    async fn command_parameters(&self, command_id: i64) -> DispatchResult<BTreeMap<String, String>> {
        let rows = sqlx::query("SELECT name, value FROM command_parameters WHERE command_id = $1")
            .bind(command_id)
            .fetch_all(&self.pool)
            .await?;

        let mut parameters = BTreeMap::new();
        for row in rows {
            parameters.insert(row.try_get("name")?, row.try_get("value")?);
        }
        Ok(parameters)
    }

    async fn find_command(&self, id: i64) -> DispatchResult<Option<CommandRecord>> {
        let sql = format!("SELECT {COMMAND_COLUMNS} FROM command WHERE command_id = $1");
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(MappingHelpers::row_to_command).transpose()
    }

    async fn history_of(&self, command_id: i64) -> DispatchResult<Vec<CommandHistoryRecord>> {
        let sql = format!("SELECT {COMMAND_COLUMNS} FROM command_history WHERE command_id = $1");
        let rows = sqlx::query(&sql)
            .bind(command_id)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(MappingHelpers::row_to_history).collect()
    }

    async fn status_history_of(&self, command_id: i64) -> DispatchResult<Vec<StatusHistoryEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT command_id, host_id, command, status, status_msg, received_time
            FROM command_status_history WHERE command_id = $1 ORDER BY id
            "#,
        )
        .bind(command_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(MappingHelpers::row_to_status_history).collect()
    }

    async fn logs_of(&self, command_id: i64) -> DispatchResult<Vec<CommandLogRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT log_seq, command_id, create_time, level, operation, log_message
            FROM command_logs WHERE command_id = $1 ORDER BY id
            "#,
        )
        .bind(command_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(MappingHelpers::row_to_log).collect()
    }

    #[instrument(skip(self, host), fields(address = %host.agent_address))]
    async fn create_host(&self, host: &NewHost) -> DispatchResult<i64> {
        let row = sqlx::query(
            r#"
            INSERT INTO host (agent_address, agent_port, agent_is_tls, agent_ca, agent_cert,
                              agent_key, insecure_skip_verify, command_uri, command_status_uri,
                              command_logs_uri)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING host_id
            "#,
        )
        .bind(&host.agent_address)
        .bind(i64::from(host.agent_port))
        .bind(flag_value(host.agent_is_tls))
        .bind(&host.agent_ca)
        .bind(&host.agent_cert)
        .bind(&host.agent_key)
        .bind(flag_value(host.insecure_skip_verify))
        .bind(&host.command_uri)
        .bind(&host.command_status_uri)
        .bind(&host.command_logs_uri)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.try_get("host_id")?)
    }

    #[instrument(skip(self, command), fields(command = %command.command, host_id = command.host_id))]
    async fn create_command(&self, command: NewCommand) -> DispatchResult<i64> {
        let command = command.normalized()?;
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(
            r#"
            INSERT INTO command (command, host_id, synchronized, create_time, try_times, status, status_msg)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING command_id
            "#,
        )
        .bind(&command.command)
        .bind(command.host_id)
        .bind(flag_value(command.synchronized))
        .bind(MappingHelpers::to_epoch(Utc::now()))
        .bind(0_i64)
        .bind(status_value(CommandStatusCode::Created))
        .bind("")
        .fetch_one(&mut *tx)
        .await?;
        let command_id: i64 = row.try_get("command_id")?;

        for (name, value) in &command.parameters {
            sqlx::query("INSERT INTO command_parameters (command_id, name, value) VALUES ($1, $2, $3)")
                .bind(command_id)
                .bind(name)
                .bind(value)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        debug!("命令 {} 已入队", command_id);
        Ok(command_id)
    }
}

/// 命令存储上的一个数据库事务，未提交即被丢弃时自动回滚
pub struct SqlCommandTransaction {
    tx: Transaction<'static, Any>,
}

#[async_trait]
impl CommandTransaction for SqlCommandTransaction {
    async fn get_command(&mut self, id: i64) -> DispatchResult<Option<CommandRecord>> {
        let sql = format!("SELECT {COMMAND_COLUMNS} FROM command WHERE command_id = $1");
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;

        row.as_ref().map(MappingHelpers::row_to_command).transpose()
    }

    #[instrument(skip(self, update), fields(status = %update.status, try_times = update.try_times))]
    async fn update_status(&mut self, id: i64, update: &CommandStatusUpdate) -> DispatchResult<u64> {
        let mut sql = String::from("UPDATE command SET status = $1, try_times = $2, status_msg = $3");
        let mut next = 4;
        if update.send_time.is_some() {
            sql.push_str(&format!(", send_time = ${next}"));
            next += 1;
        }
        if update.complete_time.is_some() {
            sql.push_str(&format!(", complete_time = ${next}"));
            next += 1;
        }
        sql.push_str(&format!(" WHERE command_id = ${next}"));

        let mut query = sqlx::query(&sql)
            .bind(status_value(update.status))
            .bind(update.try_times)
            .bind(&update.status_msg);
        if let Some(send_time) = update.send_time {
            query = query.bind(MappingHelpers::to_epoch(send_time));
        }
        if let Some(complete_time) = update.complete_time {
            query = query.bind(MappingHelpers::to_epoch(complete_time));
        }

        let result = query.bind(id).execute(&mut *self.tx).await?;
        Ok(result.rows_affected())
    }

    #[instrument(skip(self, record, status_msg), fields(command_id = record.id, status = %status))]
    async fn archive_command(
        &mut self,
        record: &CommandRecord,
        status: CommandStatusCode,
        status_msg: &str,
    ) -> DispatchResult<()> {
        sqlx::query(
            r#"
            INSERT INTO command_history (command_id, command, host_id, synchronized, create_time,
                                         send_time, complete_time, try_times, status, status_msg)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(record.id)
        .bind(&record.command)
        .bind(record.host_id)
        .bind(flag_value(record.synchronized))
        .bind(MappingHelpers::to_epoch(record.create_time))
        .bind(record.send_time.map(MappingHelpers::to_epoch))
        .bind(record.complete_time.map(MappingHelpers::to_epoch))
        .bind(record.try_times)
        .bind(status_value(status))
        .bind(status_msg)
        .execute(&mut *self.tx)
        .await?;

        sqlx::query("DELETE FROM command_parameters WHERE command_id = $1")
            .bind(record.id)
            .execute(&mut *self.tx)
            .await?;

        let deleted = sqlx::query("DELETE FROM command WHERE command_id = $1")
            .bind(record.id)
            .execute(&mut *self.tx)
            .await?;
        if deleted.rows_affected() == 0 {
            return Err(DispatchError::CommandNotFound { id: record.id });
        }

        Ok(())
    }

    async fn overtime_commands(
        &mut self,
        sent_before: DateTime<Utc>,
    ) -> DispatchResult<Vec<CommandRecord>> {
        let sql = format!(
            "SELECT {COMMAND_COLUMNS} FROM command \
             WHERE send_time IS NOT NULL AND send_time <= $1 AND status IN ($2, $3) \
             ORDER BY command_id"
        );
        let rows = sqlx::query(&sql)
            .bind(MappingHelpers::to_epoch(sent_before))
            .bind(status_value(CommandStatusCode::Sent))
            .bind(status_value(CommandStatusCode::Running))
            .fetch_all(&mut *self.tx)
            .await?;

        rows.iter().map(MappingHelpers::row_to_command).collect()
    }

    async fn append_status_history(&mut self, entry: &StatusHistoryEntry) -> DispatchResult<()> {
        sqlx::query(
            r#"
            INSERT INTO command_status_history (command_id, host_id, command, status, status_msg, received_time)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(entry.command_id)
        .bind(entry.host_id)
        .bind(&entry.command)
        .bind(status_value(entry.status))
        .bind(&entry.status_msg)
        .bind(MappingHelpers::to_epoch(entry.received_time))
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn append_log(&mut self, entry: &CommandLogRecord) -> DispatchResult<()> {
        sqlx::query(
            r#"
            INSERT INTO command_logs (log_seq, command_id, create_time, level, operation, log_message)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(&entry.log_seq)
        .bind(entry.command_id)
        .bind(MappingHelpers::to_epoch(entry.create_time))
        .bind(i64::from(entry.level))
        .bind(entry.origin)
        .bind(&entry.message)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> DispatchResult<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> DispatchResult<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}
