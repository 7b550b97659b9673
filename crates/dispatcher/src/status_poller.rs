use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sysadm_core::sequence::encode_command_seq;
use sysadm_core::{
    AgentEndpoint, CommandRecord, CommandStatus, CommandStatusCode, CommandStatusReq,
    DispatchResult, WireMessage,
};
use tracing::{debug, error, instrument, warn};

use crate::context::DispatchContext;
use crate::polling::PollingLoop;
use crate::task_pool::TaskPool;

/// 命令状态查询循环
///
/// 向客户端查询在途命令的执行状态。网络失败只记录日志，等待下一轮重新查询；
/// 客户端不认识该命令时按执行失败处理。
pub struct StatusPoller {
    ctx: Arc<DispatchContext>,
    pool: TaskPool,
}

impl StatusPoller {
    pub fn new(ctx: Arc<DispatchContext>) -> Self {
        let pool = TaskPool::new("status", ctx.dispatcher.concurrency_get_command_status);
        Self { ctx, pool }
    }

    pub fn pool(&self) -> &TaskPool {
        &self.pool
    }
}

#[async_trait]
impl PollingLoop for StatusPoller {
    fn name(&self) -> &'static str {
        "命令状态查询"
    }

    fn interval(&self) -> Duration {
        self.ctx.dispatcher.get_status_interval()
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
                .launch(id, async move { poll_status(&ctx, &record).await })
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

#[instrument(skip(ctx, record), fields(command_id = record.id, host_id = record.host_id))]
async fn poll_status(ctx: &DispatchContext, record: &CommandRecord) {
    let (status, message) = match query(ctx, record).await {
        Ok(outcome) => outcome,
        Err(e) => {
            warn!("查询命令 {} 的状态失败: {}", record.id, e);
            return;
        }
    };

    if let Err(e) = ctx
        .status_machine
        .apply_status(record.id, record.host_id, &record.command, status, &message)
        .await
    {
        error!("更新命令 {} 的状态失败: {}", record.id, e);
    }
}

async fn query(
    ctx: &DispatchContext,
    record: &CommandRecord,
) -> DispatchResult<(CommandStatusCode, String)> {
    let target = ctx.store.resolve_target(record.host_id, &ctx.agent).await?;
    let body = CommandStatusReq {
        command_seq: encode_command_seq(record.id),
        node_identifier_str: ctx.node_identifier_str().to_string(),
    }
    .marshal()?;

    let reply = ctx
        .transport
        .send_request(&target, AgentEndpoint::CommandStatus, body)
        .await?;
    let answer = CommandStatus::unmarshal(&reply)?;

    if answer.not_command {
        warn!(
            "客户端 {} 上不存在命令 {}",
            target.agent_addr(),
            record.id
        );
        return Ok((
            CommandStatusCode::Error,
            format!("客户端{}上不存在该命令", target.agent_addr()),
        ));
    }

    debug!("命令 {} 的状态: {}", record.id, answer.status());
    Ok((answer.status(), answer.status_message))
}
