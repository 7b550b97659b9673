use serde::{Deserialize, Serialize};
use std::fmt;

/// 命令状态码
///
/// 数值越小表示越早的生命周期阶段，可用于粗略比较。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(into = "u32", from = "u32")]
pub enum CommandStatusCode {
    /// 命令已创建，尚未下发
    Created,
    /// 客户端已接收命令
    Received,
    /// 下发失败
    SendError,
    /// 已下发
    Sent,
    /// 客户端执行中
    Running,
    /// 执行超时
    Timeout,
    /// 子任务执行成功
    TaskOk,
    /// 子任务执行失败
    TaskError,
    /// 执行失败
    Error,
    /// 执行成功
    Ok,
    /// 客户端无法识别命令
    Unrecognized,
    /// 未知状态
    Unknown,
}

impl CommandStatusCode {
    /// 所有可识别的状态码
    pub const ALL: [CommandStatusCode; 12] = [
        CommandStatusCode::Created,
        CommandStatusCode::Received,
        CommandStatusCode::SendError,
        CommandStatusCode::Sent,
        CommandStatusCode::Running,
        CommandStatusCode::Timeout,
        CommandStatusCode::TaskOk,
        CommandStatusCode::TaskError,
        CommandStatusCode::Error,
        CommandStatusCode::Ok,
        CommandStatusCode::Unrecognized,
        CommandStatusCode::Unknown,
    ];

    /// 需要下发的命令状态
    pub const PENDING_DELIVERY: [CommandStatusCode; 3] = [
        CommandStatusCode::Created,
        CommandStatusCode::SendError,
        CommandStatusCode::Error,
    ];

    /// 已下发且需要跟踪的命令状态
    pub const IN_FLIGHT: [CommandStatusCode; 3] = [
        CommandStatusCode::Received,
        CommandStatusCode::Sent,
        CommandStatusCode::Running,
    ];

    pub fn code(self) -> u32 {
        match self {
            CommandStatusCode::Created => 300,
            CommandStatusCode::Received => 500,
            CommandStatusCode::SendError => 600,
            CommandStatusCode::Sent => 700,
            CommandStatusCode::Running => 800,
            CommandStatusCode::Timeout => 900,
            CommandStatusCode::TaskOk => 950,
            CommandStatusCode::TaskError => 960,
            CommandStatusCode::Error => 1000,
            CommandStatusCode::Ok => 1100,
            CommandStatusCode::Unrecognized => 1200,
            CommandStatusCode::Unknown => 9000,
        }
    }

    /// 按数值查找状态码，无法识别时返回None
    pub fn from_code(code: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|status| status.code() == code)
    }

    /// 子任务进度状态，不影响重试计数与归档
    pub fn is_task_progress(self) -> bool {
        matches!(self, CommandStatusCode::TaskOk | CommandStatusCode::TaskError)
    }

    /// 需要累加重试次数的失败状态
    pub fn is_failure(self) -> bool {
        matches!(self, CommandStatusCode::SendError | CommandStatusCode::Error)
    }

    /// 表示命令已经到达客户端的状态
    pub fn marks_delivery(self) -> bool {
        matches!(
            self,
            CommandStatusCode::Received | CommandStatusCode::Sent | CommandStatusCode::Running
        )
    }
}

impl From<CommandStatusCode> for u32 {
    fn from(status: CommandStatusCode) -> Self {
        status.code()
    }
}

impl From<u32> for CommandStatusCode {
    fn from(code: u32) -> Self {
        CommandStatusCode::from_code(code).unwrap_or(CommandStatusCode::Unknown)
    }
}

impl fmt::Display for CommandStatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}({})", self, self.code())
    }
}
