pub mod cache;
pub mod store;
pub mod transport;

pub use cache::CursorCache;
pub use store::{CommandStatusUpdate, CommandStore, CommandTransaction};
pub use transport::AgentTransport;
