//! # Sysadm Testing Utils
//!
//! Shared testing utilities for the command dispatch workspace.
//!
//! - **Scripted transport**: an `AgentTransport` that replays canned agent replies
//!   and records every request it was given
//! - **Failing log store**: a `CommandStore` wrapper whose transactions reject a log append
//! - **Builders**: hosts and commands with sensible defaults
//! - **Helpers**: agent reply bodies and polling helpers
//!
//! ## Usage
//!
//! ```toml
//! [dev-dependencies]
//! sysadm-testing-utils = { path = "../testing-utils" }
//! ```

pub mod builders;
pub mod helpers;
pub mod mocks;

pub use builders::*;
pub use helpers::*;
pub use mocks::*;
