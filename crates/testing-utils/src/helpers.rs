//! Agent reply bodies and polling helpers

use std::future::Future;
use std::time::{Duration, Instant};

use sysadm_core::{
    CommandStatus, CommandStatusCode, LogData, LogLine, NodeIdentifier, RepStatus,
};
use tokio::time::sleep;

/// Identifier every scripted agent reports
pub fn test_identifier() -> NodeIdentifier {
    NodeIdentifier {
        ips: vec!["10.0.0.1".to_string()],
        macs: Vec::new(),
        hostname: "agent-01".to_string(),
        customize: String::new(),
    }
}

/// Reply of the command endpoint
pub fn rep_status(command_seq: &str, status: CommandStatusCode, message: &str) -> RepStatus {
    RepStatus {
        command_seq: command_seq.to_string(),
        status_code: status.code(),
        message: message.to_string(),
        not_command: false,
    }
}

/// Reply of the status endpoint
pub fn command_status(command_seq: &str, status: CommandStatusCode, message: &str) -> CommandStatus {
    CommandStatus {
        command_seq: command_seq.to_string(),
        node_identifier: test_identifier(),
        status_code: status.code(),
        status_message: message.to_string(),
        ..Default::default()
    }
}

/// Status reply from an agent that has never seen the command
pub fn unknown_command_status(command_seq: &str) -> CommandStatus {
    CommandStatus {
        not_command: true,
        ..command_status(command_seq, CommandStatusCode::Unknown, "")
    }
}

/// Reply of the log endpoint; each line is `(log_seq, message)`
pub fn log_data(command_seq: &str, lines: &[(&str, &str)], end_flag: bool) -> LogData {
    LogData {
        command_seq: command_seq.to_string(),
        node_identifier: test_identifier(),
        logs: lines
            .iter()
            .map(|(log_seq, message)| LogLine {
                log_seq: log_seq.to_string(),
                level: 4,
                message: message.to_string(),
            })
            .collect(),
        total: lines.len() as i64,
        end_flag,
        not_command: false,
    }
}

/// Wait until a condition holds or the timeout elapses
pub async fn wait_for<F, Fut>(mut condition: F, timeout: Duration) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let start = Instant::now();
    while start.elapsed() < timeout {
        if condition().await {
            return true;
        }
        sleep(Duration::from_millis(20)).await;
    }
    false
}
