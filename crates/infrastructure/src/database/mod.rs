pub mod command_store;
pub mod manager;
pub mod mapping;
pub mod schema;

pub use command_store::{SqlCommandStore, SqlCommandTransaction};
pub use manager::{DatabaseManager, DatabaseType};
