//! 主动模式下的命令下发引擎
//!
//! 三个轮询循环共享同一个 [`DispatchContext`]：
//! - [`SendLoop`] 清理超时命令并下发待发送的命令
//! - [`StatusPoller`] 查询在途命令的执行状态
//! - [`LogPuller`] 按游标增量拉取在途命令的日志
//!
//! 所有状态变化都经过 [`StatusMachine`]，在一个存储事务内完成。

pub mod context;
pub mod log_puller;
pub mod polling;
pub mod sender;
pub mod status_machine;
pub mod status_poller;
pub mod task_pool;

pub use context::DispatchContext;
pub use log_puller::LogPuller;
pub use polling::{run_polling_loop, PollingLoop};
pub use sender::SendLoop;
pub use status_machine::{StatusMachine, StatusTransition, MAX_TRY_TIMES_MESSAGE, TIMEOUT_MESSAGE};
pub use status_poller::StatusPoller;
pub use task_pool::TaskPool;
