use std::sync::Arc;

use sysadm_core::config::{AgentConfig, DispatcherConfig};
use sysadm_core::{AgentTransport, AppConfig, CommandStore, CursorCache};

use crate::status_machine::StatusMachine;

/// 三个轮询循环共享的运行环境，启动时构建一次，之后只读
pub struct DispatchContext {
    pub dispatcher: DispatcherConfig,
    pub agent: AgentConfig,
    pub store: Arc<dyn CommandStore>,
    pub cache: Arc<dyn CursorCache>,
    pub transport: Arc<dyn AgentTransport>,
    pub status_machine: StatusMachine,
}

impl DispatchContext {
    pub fn new(
        config: &AppConfig,
        store: Arc<dyn CommandStore>,
        cache: Arc<dyn CursorCache>,
        transport: Arc<dyn AgentTransport>,
    ) -> Arc<Self> {
        Self::from_parts(
            config.dispatcher.clone(),
            config.agent.clone(),
            store,
            cache,
            transport,
        )
    }

    pub fn from_parts(
        dispatcher: DispatcherConfig,
        agent: AgentConfig,
        store: Arc<dyn CommandStore>,
        cache: Arc<dyn CursorCache>,
        transport: Arc<dyn AgentTransport>,
    ) -> Arc<Self> {
        let status_machine = StatusMachine::new(
            Arc::clone(&store),
            dispatcher.max_try_times,
            dispatcher.max_execute_time_seconds,
        );

        Arc::new(Self {
            dispatcher,
            agent,
            store,
            cache,
            transport,
            status_machine,
        })
    }

    /// 请求中携带的节点标识串
    pub fn node_identifier_str(&self) -> &str {
        &self.agent.node_identifier
    }
}
