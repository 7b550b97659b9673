use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use sysadm_core::sequence::{encode_command_seq, LogCursor, LOG_END_INDEX};
use sysadm_core::{
    AgentEndpoint, CommandLogRecord, CommandRecord, CommandStatusCode, DispatchResult, LogData,
    LogReq, WireMessage, LOG_ORIGIN_POLL,
};
use tracing::{debug, instrument, warn};

use crate::context::DispatchContext;
use crate::polling::PollingLoop;
use crate::task_pool::TaskPool;

/// 命令日志拉取循环
///
/// 游标保存在缓存中，键为 `<log_cursor_root>/<commandSeq>`，值为已入库的最后一条日志序列号。
/// 每批日志在一个事务中入库，提交成功后游标前移到本批最大的序列号，游标不会后退。
/// 收到结束标记后游标停在结束位置，之后不再拉取该命令的日志。
pub struct LogPuller {
    ctx: Arc<DispatchContext>,
    pool: TaskPool,
}

impl LogPuller {
    pub fn new(ctx: Arc<DispatchContext>) -> Self {
        let pool = TaskPool::new("logs", ctx.dispatcher.concurrency_get_command_log);
        Self { ctx, pool }
    }

    pub fn pool(&self) -> &TaskPool {
        &self.pool
    }
}

#[async_trait]
impl PollingLoop for LogPuller {
    fn name(&self) -> &'static str {
        "命令日志拉取"
    }

    fn interval(&self) -> Duration {
        self.ctx.dispatcher.get_log_interval()
    }

    async fn run_once(&self) -> DispatchResult<usize> {
        let candidates = self
            .ctx
            .store
            .list_candidates(&CommandStatusCode::IN_FLIGHT, None)
            .await?;

        let mut launched = 0;
        for record in candidates {
            let ctx = Arc::clone(&self.ctx);
            let id = record.id;
            if self
                .pool
                .launch(id, async move {
                    if let Err(e) = pull_logs(&ctx, &record).await {
                        warn!("拉取命令 {} 的日志失败: {}", record.id, e);
                    }
                })
                .await
            {
                launched += 1;
                tokio::time::sleep(self.pool.launch_delay()).await;
            }
        }
        Ok(launched)
    }

    async fn wait_idle(&self) {
        self.pool.wait_idle().await;
    }
}

/// 读取游标，缺失或无法解析时从当天的第一条开始
async fn load_cursor(ctx: &DispatchContext, key: &str) -> DispatchResult<LogCursor> {
    if !ctx.cache.exists(key).await? {
        return Ok(LogCursor::beginning());
    }
    match ctx.cache.get(key).await? {
        Some(value) => match LogCursor::parse(&value) {
            Ok(cursor) => Ok(cursor),
            Err(e) => {
                warn!("游标 {} 的值 {} 无效，从头拉取: {}", key, value, e);
                Ok(LogCursor::beginning())
            }
        },
        None => Ok(LogCursor::beginning()),
    }
}

#[instrument(skip(ctx, record), fields(command_id = record.id, host_id = record.host_id))]
async fn pull_logs(ctx: &DispatchContext, record: &CommandRecord) -> DispatchResult<()> {
    let command_seq = encode_command_seq(record.id);
    let key = ctx.dispatcher.log_cursor_key(&command_seq);

    let cursor = load_cursor(ctx, &key).await?;
    if cursor.is_end() {
        debug!("命令 {} 的日志已经全部拉取", record.id);
        return Ok(());
    }

    let target = ctx.store.resolve_target(record.host_id, &ctx.agent).await?;
    let body = LogReq {
        command_seq,
        node_identifier_str: ctx.node_identifier_str().to_string(),
        start_seq: cursor.next_start(),
        num: ctx.dispatcher.max_get_log_num_per_time,
    }
    .marshal()?;

    let reply = ctx
        .transport
        .send_request(&target, AgentEndpoint::CommandLogs, body)
        .await?;
    let data = LogData::unmarshal(&reply)?;

    if data.not_command {
        warn!(
            "客户端 {} 上不存在命令 {}，本轮不再拉取日志",
            target.agent_addr(),
            record.id
        );
        return Ok(());
    }

    if let Some(next) = persist_batch(ctx, record.id, &cursor, &data).await? {
        ctx.cache.set(&key, &next.to_seq()).await?;
        debug!("命令 {} 的日志游标前移到 {}", record.id, next.to_seq());
    }
    Ok(())
}

/// 在一个事务中写入一批日志，返回提交后游标应前移到的位置
///
/// 序列号无效的日志使整批作废。已被游标确认的日志和结束标记不入库，
/// 游标只会向前移动。任何一条写入失败，整批回滚。
async fn persist_batch(
    ctx: &DispatchContext,
    command_id: i64,
    cursor: &LogCursor,
    data: &LogData,
) -> DispatchResult<Option<LogCursor>> {
    let mut highest: Option<LogCursor> = None;
    let mut end_marker: Option<LogCursor> = None;
    let mut entries = Vec::with_capacity(data.logs.len());
    let now = Utc::now();

    for line in &data.logs {
        let seen = LogCursor::parse(&line.log_seq)?;
        if seen.is_end() {
            end_marker = Some(seen);
            continue;
        }
        if cursor.covers(&seen) {
            debug!("命令 {} 的日志 {} 已经入库，跳过", command_id, line.log_seq);
            continue;
        }
        if highest.as_ref().map_or(true, |current| seen > *current) {
            highest = Some(seen);
        }
        entries.push(CommandLogRecord {
            log_seq: line.log_seq.trim().to_string(),
            command_id,
            create_time: now,
            level: line.level,
            origin: LOG_ORIGIN_POLL,
            message: line.message.clone(),
        });
    }

    if !entries.is_empty() {
        let mut tx = ctx.store.begin().await?;
        for entry in &entries {
            if let Err(e) = tx.append_log(entry).await {
                if let Err(rollback) = tx.rollback().await {
                    warn!("回滚命令 {} 的日志事务失败: {}", command_id, rollback);
                }
                return Err(e);
            }
        }
        tx.commit().await?;
        debug!("命令 {} 写入 {} 条日志", command_id, entries.len());
    }

    let next = if end_marker.is_some() || data.end_flag {
        let marker = end_marker.unwrap_or_else(|| LogCursor {
            date: highest
                .as_ref()
                .map_or_else(|| cursor.date.clone(), |seen| seen.date.clone()),
            index: LOG_END_INDEX,
        });
        Some(marker)
    } else {
        highest
    };

    Ok(next.filter(|next| !cursor.covers(next)))
}
