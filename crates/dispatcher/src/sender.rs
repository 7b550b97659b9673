use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sysadm_core::sequence::encode_command_seq;
use sysadm_core::{
    AgentEndpoint, Command, CommandData, CommandRecord, CommandStatusCode, DispatchResult,
    RepStatus, WireMessage,
};
use tracing::{debug, error, info, instrument, warn};

use crate::context::DispatchContext;
use crate::polling::PollingLoop;
use crate::task_pool::TaskPool;

/// 命令下发循环
///
/// 每次迭代先清理超时命令，再为待下发的命令逐个启动下发任务。
pub struct SendLoop {
    ctx: Arc<DispatchContext>,
    pool: TaskPool,
}

impl SendLoop {
    pub fn new(ctx: Arc<DispatchContext>) -> Self {
        let pool = TaskPool::new("send", ctx.dispatcher.concurrency_send_command);
        Self { ctx, pool }
    }

    pub fn pool(&self) -> &TaskPool {
        &self.pool
    }
}

#[async_trait]
impl PollingLoop for SendLoop {
    fn name(&self) -> &'static str {
        "命令下发"
    }

    fn interval(&self) -> Duration {
        self.ctx.dispatcher.check_command_interval()
    }

    async fn run_once(&self) -> DispatchResult<usize> {
        if let Err(e) = self.ctx.status_machine.sweep_overtime().await {
            warn!("清理超时命令失败: {}", e);
        }

        let candidates = self
            .ctx
            .store
            .list_candidates(
                &CommandStatusCode::PENDING_DELIVERY,
                Some(self.ctx.dispatcher.max_try_times),
            )
            .await?;
        if candidates.is_empty() {
            return Ok(0);
        }
        debug!("待下发命令 {} 条", candidates.len());

        let mut launched = 0;
        for record in candidates {
            let ctx = Arc::clone(&self.ctx);
            let id = record.id;
            if self
                .pool
                .launch(id, async move { send_command(&ctx, &record).await })
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

/// 下发一条命令并把结果交给状态机
#[instrument(skip(ctx, record), fields(command_id = record.id, host_id = record.host_id))]
async fn send_command(ctx: &DispatchContext, record: &CommandRecord) {
    let (status, message) = match deliver(ctx, record).await {
        Ok(outcome) => outcome,
        Err(e) => {
            warn!("命令 {} 下发失败: {}", record.id, e);
            (CommandStatusCode::SendError, e.to_string())
        }
    };

    match ctx
        .status_machine
        .apply_status(record.id, record.host_id, &record.command, status, &message)
        .await
    {
        Ok(transition) => debug!("命令 {} 下发结果 {}: {:?}", record.id, status, transition),
        Err(e) => error!("更新命令 {} 的下发状态失败: {}", record.id, e),
    }
}

async fn deliver(
    ctx: &DispatchContext,
    record: &CommandRecord,
) -> DispatchResult<(CommandStatusCode, String)> {
    let target = ctx.store.resolve_target(record.host_id, &ctx.agent).await?;
    let parameters = ctx.store.command_parameters(record.id).await?;

    let body = CommandData {
        node_identifier_str: ctx.node_identifier_str().to_string(),
        command: Command {
            command_seq: encode_command_seq(record.id),
            command: record.command.clone(),
            synchronized: record.synchronized,
            parameters,
        },
    }
    .marshal()?;

    let reply = ctx
        .transport
        .send_request(&target, AgentEndpoint::Command, body)
        .await?;
    let rep = RepStatus::unmarshal(&reply)?;

    let status = rep.status();
    let addr = target.agent_addr();
    let message = if status == CommandStatusCode::SendError {
        format!("命令下发到客户{addr}出错")
    } else {
        info!("命令 {} 已下发到客户端 {}", record.id, addr);
        format!("命令已经成功下发到客户端{addr}")
    };
    Ok((status, message))
}
