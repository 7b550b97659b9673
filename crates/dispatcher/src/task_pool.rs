use std::collections::HashSet;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::Semaphore;
use tracing::{debug, warn};

/// 有界任务池
///
/// 同时运行的任务数不超过信号量大小，相邻两次启动之间间隔 `ceil(1000/concurrency)` 毫秒。
/// 同一条命令在上一个任务结束前不会再次启动。
pub struct TaskPool {
    name: &'static str,
    size: usize,
    permits: Arc<Semaphore>,
    launch_delay: Duration,
    in_flight: Arc<Mutex<HashSet<i64>>>,
}

/// 任务结束时释放命令占位
struct InFlightGuard {
    key: i64,
    in_flight: Arc<Mutex<HashSet<i64>>>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if let Ok(mut keys) = self.in_flight.lock() {
            keys.remove(&self.key);
        }
    }
}

impl TaskPool {
    pub fn new(name: &'static str, concurrency: usize) -> Self {
        let size = concurrency.clamp(1, u32::MAX as usize);
        let millis = 1000_u64.div_ceil(size as u64);
        Self {
            name,
            size,
            permits: Arc::new(Semaphore::new(size)),
            launch_delay: Duration::from_millis(millis),
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn launch_delay(&self) -> Duration {
        self.launch_delay
    }

    /// 正在运行或等待运行的任务数
    pub fn in_flight(&self) -> usize {
        self.in_flight.lock().map(|keys| keys.len()).unwrap_or(0)
    }

    /// 为命令 `key` 启动一个任务，池满时等待空闲位置
    ///
    /// 同一命令已有任务在运行时直接返回 `false`。
    pub async fn launch<F>(&self, key: i64, task: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        match self.in_flight.lock() {
            Ok(mut keys) => {
                if !keys.insert(key) {
                    debug!("{}: 命令 {} 仍在处理中，跳过", self.name, key);
                    return false;
                }
            }
            Err(_) => {
                warn!("{}: 任务登记表已损坏，跳过命令 {}", self.name, key);
                return false;
            }
        }
        let guard = InFlightGuard {
            key,
            in_flight: Arc::clone(&self.in_flight),
        };

        let permit = match Arc::clone(&self.permits).acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => {
                warn!("{}: 任务池已关闭，命令 {} 未启动", self.name, key);
                return false;
            }
        };

        tokio::spawn(async move {
            let _permit = permit;
            let _guard = guard;
            task.await;
        });
        true
    }

    /// 等待所有已启动的任务结束
    pub async fn wait_idle(&self) {
        let all = u32::try_from(self.size).unwrap_or(u32::MAX);
        if let Ok(permits) = self.permits.acquire_many(all).await {
            drop(permits);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn launch_delay_follows_concurrency() {
        assert_eq!(TaskPool::new("t", 10).launch_delay(), Duration::from_millis(100));
        assert_eq!(TaskPool::new("t", 3).launch_delay(), Duration::from_millis(334));
        assert_eq!(TaskPool::new("t", 2000).launch_delay(), Duration::from_millis(1));
        assert_eq!(TaskPool::new("t", 0).size(), 1);
    }

    #[tokio::test]
    async fn running_tasks_never_exceed_pool_size() {
        let pool = TaskPool::new("bounded", 2);
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        for key in 0..6 {
            let running = Arc::clone(&running);
            let peak = Arc::clone(&peak);
            assert!(
                pool.launch(key, async move {
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    running.fetch_sub(1, Ordering::SeqCst);
                })
                .await
            );
        }
        pool.wait_idle().await;

        assert!(peak.load(Ordering::SeqCst) <= 2);
        assert_eq!(running.load(Ordering::SeqCst), 0);
        assert_eq!(pool.in_flight(), 0);
    }

    #[tokio::test]
    async fn same_key_is_not_launched_twice() {
        let pool = TaskPool::new("dedupe", 4);
        let (release_tx, release_rx) = tokio::sync::oneshot::channel::<()>();

        assert!(
            pool.launch(7, async move {
                let _ = release_rx.await;
            })
            .await
        );
        assert!(!pool.launch(7, async {}).await);
        assert_eq!(pool.in_flight(), 1);

        let _ = release_tx.send(());
        pool.wait_idle().await;
        assert_eq!(pool.in_flight(), 0);
        assert!(pool.launch(7, async {}).await);
        pool.wait_idle().await;
    }
}
