use std::sync::Arc;

use anyhow::{Context, Result};
use sysadm_core::{AppConfig, CommandStore, CursorCache};
use sysadm_dispatcher::{
    run_polling_loop, DispatchContext, LogPuller, PollingLoop, SendLoop, StatusPoller,
};
use sysadm_infrastructure::{DatabaseManager, HttpAgentTransport, MemoryCursorCache, RedisCursorCache};
use tokio::sync::broadcast;
use tracing::{info, warn};

/// 主应用程序：持有数据库连接和下发上下文，运行三个轮询循环
pub struct Application {
    database: DatabaseManager,
    context: Arc<DispatchContext>,
}

impl Application {
    pub async fn new(config: AppConfig) -> Result<Self> {
        info!("连接数据库: {}", mask_url(&config.database.url));
        let database = DatabaseManager::new(&config.database)
            .await
            .context("连接数据库失败")?;
        if config.database.auto_migrate {
            database.migrate().await.context("初始化数据库表结构失败")?;
        }

        let cache = create_cursor_cache(&config).await?;
        let store: Arc<dyn CommandStore> = Arc::new(database.command_store());
        let transport = Arc::new(HttpAgentTransport::new(config.transport.clone()));

        let context = DispatchContext::new(&config, store, cache, transport);

        Ok(Self { database, context })
    }

    pub fn context(&self) -> Arc<DispatchContext> {
        Arc::clone(&self.context)
    }

    /// 运行下发、状态查询、日志拉取三个循环，直到收到关闭信号
    pub async fn run(&self, shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
        if !self.context.dispatcher.enabled {
            warn!("命令下发已在配置中禁用，不启动轮询循环");
            let mut shutdown_rx = shutdown_rx;
            let _ = shutdown_rx.recv().await;
            self.database.close().await;
            return Ok(());
        }

        let loops: Vec<Arc<dyn PollingLoop>> = vec![
            Arc::new(SendLoop::new(self.context())),
            Arc::new(StatusPoller::new(self.context())),
            Arc::new(LogPuller::new(self.context())),
        ];

        let handles: Vec<_> = loops
            .into_iter()
            .map(|polling| tokio::spawn(run_polling_loop(polling, shutdown_rx.resubscribe())))
            .collect();
        drop(shutdown_rx);

        for handle in handles {
            handle.await.context("轮询循环异常退出")?;
        }

        self.database.close().await;
        info!("所有轮询循环已停止");
        Ok(())
    }
}

/// 初始化数据库表结构后退出
pub async fn init_schema(config: &AppConfig) -> Result<()> {
    let database = DatabaseManager::new(&config.database)
        .await
        .context("连接数据库失败")?;
    database.migrate().await.context("初始化数据库表结构失败")?;
    database.close().await;
    info!("数据库表结构已初始化");
    Ok(())
}

async fn create_cursor_cache(config: &AppConfig) -> Result<Arc<dyn CursorCache>> {
    if !config.cache.enabled {
        warn!("缓存未启用，日志游标保存在进程内存中，重启后将从头拉取日志");
        return Ok(Arc::new(MemoryCursorCache::new()));
    }

    info!("连接Redis: {}", mask_url(&config.cache.redis_url));
    let cache = RedisCursorCache::new(&config.cache)
        .await
        .context("连接Redis失败")?;
    Ok(Arc::new(cache))
}

/// 屏蔽URL中的密码
fn mask_url(url: &str) -> String {
    let Some((scheme, rest)) = url.split_once("://") else {
        return url.to_string();
    };
    let Some((credentials, host)) = rest.rsplit_once('@') else {
        return url.to_string();
    };
    match credentials.split_once(':') {
        Some((user, _)) => format!("{scheme}://{user}:***@{host}"),
        None => url.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn masks_password_only() {
        assert_eq!(
            mask_url("postgres://sysadm:secret@db:5432/sysadm"),
            "postgres://sysadm:***@db:5432/sysadm"
        );
        assert_eq!(mask_url("redis://:secret@cache:6379"), "redis://:***@cache:6379");
        assert_eq!(mask_url("redis://cache:6379"), "redis://cache:6379");
        assert_eq!(mask_url("sqlite://sysadm.db?mode=rwc"), "sqlite://sysadm.db?mode=rwc");
    }
}
