//! Cursor caches for resumable log retrieval
//!
//! The log-pull loop remembers the last persisted log sequence of every
//! command under `<root>/<commandSeq>`. Redis keeps that state across
//! restarts; the in-memory variant serves embedded runs and tests.

pub mod memory;
pub mod redis_cursor;

pub use memory::MemoryCursorCache;
pub use redis_cursor::RedisCursorCache;
