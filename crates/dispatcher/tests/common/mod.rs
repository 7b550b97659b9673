#![allow(dead_code)]

use std::sync::Arc;

use sysadm_core::config::{AgentConfig, DispatcherConfig};
use sysadm_core::{CommandStatusCode, CommandStatusUpdate, CommandStore, NewCommand};
use sysadm_dispatcher::DispatchContext;
use sysadm_infrastructure::{MemoryCommandStore, MemoryCursorCache};
use sysadm_testing_utils::{CommandBuilder, HostBuilder, ScriptedTransport};

pub struct Harness {
    pub ctx: Arc<DispatchContext>,
    pub store: MemoryCommandStore,
    pub cache: MemoryCursorCache,
    pub transport: ScriptedTransport,
    pub host_id: i64,
}

/// 启动间隔缩短到1毫秒，避免测试等待
pub fn fast_config() -> DispatcherConfig {
    DispatcherConfig {
        concurrency_send_command: 1000,
        concurrency_get_command_status: 1000,
        concurrency_get_command_log: 1000,
        ..DispatcherConfig::default()
    }
}

pub async fn harness() -> Harness {
    harness_with(fast_config()).await
}

pub async fn harness_with(config: DispatcherConfig) -> Harness {
    let store = MemoryCommandStore::new();
    let cache = MemoryCursorCache::new();
    let transport = ScriptedTransport::new();
    let host_id = HostBuilder::new()
        .with_address("10.0.0.1")
        .with_port(8080)
        .create(&store)
        .await
        .unwrap();

    let ctx = DispatchContext::from_parts(
        config,
        AgentConfig::default(),
        Arc::new(store.clone()),
        Arc::new(cache.clone()),
        Arc::new(transport.clone()),
    );

    Harness {
        ctx,
        store,
        cache,
        transport,
        host_id,
    }
}

impl Harness {
    /// 使用另一个存储构造上下文，缓存和传输与本测试环境共用
    pub fn context_with_store(&self, store: Arc<dyn CommandStore>) -> Arc<DispatchContext> {
        DispatchContext::from_parts(
            self.ctx.dispatcher.clone(),
            AgentConfig::default(),
            store,
            Arc::new(self.cache.clone()),
            Arc::new(self.transport.clone()),
        )
    }

    pub async fn create_command(&self, name: &str) -> i64 {
        CommandBuilder::new(self.host_id)
            .with_name(name)
            .with_parameter("Repo", "base")
            .create(&self.store)
            .await
            .unwrap()
    }

    pub async fn create_plain(&self, command: NewCommand) -> i64 {
        self.store.create_command(command).await.unwrap()
    }

    /// 直接改写命令状态，不经过状态机
    pub async fn force_status(
        &self,
        id: i64,
        status: CommandStatusCode,
        send_time: Option<chrono::DateTime<chrono::Utc>>,
    ) {
        let mut tx = self.store.begin().await.unwrap();
        let mut update = CommandStatusUpdate::new(status, 0, "");
        update.send_time = send_time;
        assert_eq!(tx.update_status(id, &update).await.unwrap(), 1);
        tx.commit().await.unwrap();
    }

    /// 删除命令，让后续命令获得指定的ID
    pub async fn discard(&self, id: i64) {
        let record = self.store.find_command(id).await.unwrap().unwrap();
        let mut tx = self.store.begin().await.unwrap();
        tx.archive_command(&record, CommandStatusCode::Ok, "discarded")
            .await
            .unwrap();
        tx.commit().await.unwrap();
    }
}
