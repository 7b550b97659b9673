//! 数据库行与领域模型之间的转换工具
//!
//! 时间统一以Unix秒存储为BIGINT，布尔值存储为0/1，
//! 以便同一套SQL同时适用于SQLite和PostgreSQL。

use chrono::{DateTime, TimeZone, Utc};
use sqlx::any::AnyRow;
use sqlx::Row;
use sysadm_core::{
    CommandHistoryRecord, CommandLogRecord, CommandRecord, CommandStatusCode, DispatchError,
    DispatchResult, DispatchTarget, StatusHistoryEntry,
};

pub struct MappingHelpers;

impl MappingHelpers {
    pub fn to_epoch(time: DateTime<Utc>) -> i64 {
        time.timestamp()
    }

    pub fn from_epoch(seconds: i64) -> DispatchResult<DateTime<Utc>> {
        Utc.timestamp_opt(seconds, 0)
            .single()
            .ok_or_else(|| DispatchError::Internal(format!("无效的时间戳: {seconds}")))
    }

    pub fn timestamp(row: &AnyRow, field: &str) -> DispatchResult<DateTime<Utc>> {
        Self::from_epoch(row.try_get::<i64, _>(field)?)
    }

    pub fn optional_timestamp(row: &AnyRow, field: &str) -> DispatchResult<Option<DateTime<Utc>>> {
        match row.try_get::<Option<i64>, _>(field)? {
            Some(seconds) if seconds > 0 => Ok(Some(Self::from_epoch(seconds)?)),
            _ => Ok(None),
        }
    }

    pub fn flag(row: &AnyRow, field: &str) -> DispatchResult<bool> {
        Ok(row.try_get::<i64, _>(field)? != 0)
    }

    pub fn status(row: &AnyRow, field: &str) -> DispatchResult<CommandStatusCode> {
        let code = row.try_get::<i64, _>(field)?;
        Ok(u32::try_from(code)
            .map(CommandStatusCode::from)
            .unwrap_or(CommandStatusCode::Unknown))
    }

    pub fn row_to_command(row: &AnyRow) -> DispatchResult<CommandRecord> {
        Ok(CommandRecord {
            id: row.try_get("command_id")?,
            command: row.try_get("command")?,
            host_id: row.try_get("host_id")?,
            synchronized: Self::flag(row, "synchronized")?,
            create_time: Self::timestamp(row, "create_time")?,
            send_time: Self::optional_timestamp(row, "send_time")?,
            complete_time: Self::optional_timestamp(row, "complete_time")?,
            try_times: row.try_get("try_times")?,
            status: Self::status(row, "status")?,
            status_msg: row.try_get("status_msg")?,
        })
    }

    pub fn row_to_history(row: &AnyRow) -> DispatchResult<CommandHistoryRecord> {
        Ok(CommandHistoryRecord {
            command_id: row.try_get("command_id")?,
            command: row.try_get("command")?,
            host_id: row.try_get("host_id")?,
            synchronized: Self::flag(row, "synchronized")?,
            create_time: Self::timestamp(row, "create_time")?,
            send_time: Self::optional_timestamp(row, "send_time")?,
            complete_time: Self::optional_timestamp(row, "complete_time")?,
            try_times: row.try_get("try_times")?,
            status: Self::status(row, "status")?,
            status_msg: row.try_get("status_msg")?,
        })
    }

    pub fn row_to_status_history(row: &AnyRow) -> DispatchResult<StatusHistoryEntry> {
        Ok(StatusHistoryEntry {
            command_id: row.try_get("command_id")?,
            host_id: row.try_get("host_id")?,
            command: row.try_get("command")?,
            status: Self::status(row, "status")?,
            status_msg: row.try_get("status_msg")?,
            received_time: Self::timestamp(row, "received_time")?,
        })
    }

    pub fn row_to_log(row: &AnyRow) -> DispatchResult<CommandLogRecord> {
        let level = row.try_get::<i64, _>("level")?;
        Ok(CommandLogRecord {
            log_seq: row.try_get("log_seq")?,
            command_id: row.try_get("command_id")?,
            create_time: Self::timestamp(row, "create_time")?,
            level: u32::try_from(level).unwrap_or_default(),
            origin: row.try_get("operation")?,
            message: row.try_get("log_message")?,
        })
    }

    pub fn row_to_target(row: &AnyRow) -> DispatchResult<DispatchTarget> {
        let port = row.try_get::<i64, _>("agent_port")?;
        Ok(DispatchTarget {
            host_id: row.try_get("host_id")?,
            address: row.try_get("agent_address")?,
            port: u16::try_from(port)
                .map_err(|_| DispatchError::Internal(format!("无效的客户端端口: {port}")))?,
            is_tls: Self::flag(row, "agent_is_tls")?,
            ca: row.try_get("agent_ca")?,
            cert: row.try_get("agent_cert")?,
            key: row.try_get("agent_key")?,
            insecure_skip_verify: Self::flag(row, "insecure_skip_verify")?,
            command_uri: row.try_get("command_uri")?,
            command_status_uri: row.try_get("command_status_uri")?,
            command_logs_uri: row.try_get("command_logs_uri")?,
        })
    }
}
