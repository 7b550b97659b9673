pub mod agent;
pub mod app_config;
pub mod cache;
pub mod database;
pub mod dispatcher;
pub mod observability;

pub use agent::{AgentConfig, TransportConfig};
pub use app_config::AppConfig;
pub use cache::CacheConfig;
pub use database::DatabaseConfig;
pub use dispatcher::DispatcherConfig;
pub use observability::ObservabilityConfig;
