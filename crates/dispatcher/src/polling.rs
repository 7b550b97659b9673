use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sysadm_core::DispatchResult;
use tokio::sync::broadcast;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

/// 周期执行的轮询循环
#[async_trait]
pub trait PollingLoop: Send + Sync {
    fn name(&self) -> &'static str;

    /// 两次迭代之间的间隔
    fn interval(&self) -> Duration;

    /// 执行一次迭代，返回本次启动的任务数
    async fn run_once(&self) -> DispatchResult<usize>;

    /// 等待本循环启动的任务全部结束
    async fn wait_idle(&self);
}

/// 按间隔运行轮询循环，收到关闭信号后等待在途任务结束再返回
///
/// 单次迭代的错误只记录日志，不会终止循环。
pub async fn run_polling_loop(
    polling: Arc<dyn PollingLoop>,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    let mut interval = tokio::time::interval(polling.interval());
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    info!("{}循环已启动，间隔 {:?}", polling.name(), polling.interval());

    loop {
        tokio::select! {
            _ = interval.tick() => {
                match polling.run_once().await {
                    Ok(launched) => debug!("{}循环本次启动了 {} 个任务", polling.name(), launched),
                    Err(e) => error!("{}循环执行失败: {}", polling.name(), e),
                }
            }
            _ = shutdown_rx.recv() => {
                info!("{}循环收到关闭信号", polling.name());
                break;
            }
        }
    }

    polling.wait_idle().await;
    info!("{}循环已停止", polling.name());
}
