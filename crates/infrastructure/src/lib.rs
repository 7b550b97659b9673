pub mod cache;
pub mod database;
pub mod memory_store;
pub mod transport;

pub use cache::{MemoryCursorCache, RedisCursorCache};
pub use database::{DatabaseManager, DatabaseType, SqlCommandStore};
pub use memory_store::MemoryCommandStore;
pub use transport::HttpAgentTransport;
