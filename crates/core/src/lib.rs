pub mod config;
pub mod errors;
pub mod models;
pub mod sequence;
pub mod traits;

pub use config::AppConfig;
pub use errors::*;
pub use models::*;
pub use traits::*;
