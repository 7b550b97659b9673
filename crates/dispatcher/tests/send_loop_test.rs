mod common;

use chrono::{Duration, NaiveDate, Utc};
use sysadm_core::sequence::{decode_command_seq, encode_command_seq_on};
use sysadm_core::{AgentEndpoint, CommandStatusCode, CommandStore, DispatchError, NewCommand};
use sysadm_dispatcher::{PollingLoop, SendLoop, MAX_TRY_TIMES_MESSAGE, TIMEOUT_MESSAGE};
use sysadm_testing_utils::rep_status;

use common::harness;

#[test]
fn test_scenario_sequence_format() {
    let june_first = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
    assert_eq!(encode_command_seq_on(june_first, 7), "2024060100000000007");
}

#[tokio::test]
async fn test_delivery_marks_command_received() {
    let h = harness().await;
    for _ in 0..6 {
        let id = h.create_command("placeholder").await;
        h.discard(id).await;
    }
    let id = h
        .create_plain(NewCommand::new("addyum", h.host_id).with_parameter("Repo", "base"))
        .await;
    assert_eq!(id, 7);

    h.transport.reply(
        AgentEndpoint::Command,
        &rep_status("2024060100000000007", CommandStatusCode::Received, "ok"),
    );

    let sender = SendLoop::new(h.ctx.clone());
    assert_eq!(sender.run_once().await.unwrap(), 1);
    sender.wait_idle().await;

    let requests = h.transport.requests_to(AgentEndpoint::Command);
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].url, "http://10.0.0.1:8080/receiveCommand");
    let body = requests[0].json();
    let seq = body["command"]["commandSeq"].as_str().unwrap();
    assert_eq!(seq.len(), 19);
    assert_eq!(decode_command_seq(seq).unwrap(), 7);
    assert_eq!(body["command"]["command"], "addyum");
    assert_eq!(body["command"]["synchronized"], false);
    assert_eq!(body["command"]["parameter"]["repo"], "base");

    let record = h.store.find_command(id).await.unwrap().unwrap();
    assert_eq!(record.status, CommandStatusCode::Received);
    assert_eq!(record.try_times, 0);
    assert_eq!(record.status_msg, "命令已经成功下发到客户端10.0.0.1:8080");
    assert!(record.send_time.is_some());

    let audit = h.store.status_history_of(id).await.unwrap();
    assert_eq!(audit.len(), 1);
    assert_eq!(audit[0].status.code(), 500);
}

#[tokio::test]
async fn test_unreachable_agent_exhausts_retries() {
    let h = harness().await;
    let id = h.create_command("addyum").await;
    let sender = SendLoop::new(h.ctx.clone());

    for attempt in 1..=3_i64 {
        assert_eq!(sender.run_once().await.unwrap(), 1);
        sender.wait_idle().await;
        if attempt < 3 {
            let record = h.store.find_command(id).await.unwrap().unwrap();
            assert_eq!(record.status, CommandStatusCode::SendError);
            assert_eq!(record.try_times, attempt);
            assert!(record.status_msg.contains("can not connect to agent 10.0.0.1:8080"));
        }
    }

    assert!(h.store.find_command(id).await.unwrap().is_none());
    let history = h.store.history_of(id).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].status_msg, MAX_TRY_TIMES_MESSAGE);
    assert_eq!(h.store.status_history_of(id).await.unwrap().len(), 3);

    // 已归档的命令不再被选中
    assert_eq!(sender.run_once().await.unwrap(), 0);
    assert_eq!(h.transport.request_count(), 3);
}

#[tokio::test]
async fn test_agent_reported_send_error_counts_as_retry() {
    let h = harness().await;
    let id = h.create_command("addyum").await;
    h.transport.reply(
        AgentEndpoint::Command,
        &rep_status("", CommandStatusCode::SendError, "busy"),
    );

    let sender = SendLoop::new(h.ctx.clone());
    sender.run_once().await.unwrap();
    sender.wait_idle().await;

    let record = h.store.find_command(id).await.unwrap().unwrap();
    assert_eq!(record.status, CommandStatusCode::SendError);
    assert_eq!(record.try_times, 1);
    assert_eq!(record.status_msg, "命令下发到客户10.0.0.1:8080出错");
}

#[tokio::test]
async fn test_malformed_reply_is_a_send_error() {
    let h = harness().await;
    let id = h.create_command("addyum").await;
    h.transport.reply_raw(AgentEndpoint::Command, "<html>bad gateway</html>");
    h.transport.fail(
        AgentEndpoint::Command,
        DispatchError::AgentResponse("HTTP 502".to_string()),
    );

    let sender = SendLoop::new(h.ctx.clone());
    sender.run_once().await.unwrap();
    sender.wait_idle().await;
    sender.run_once().await.unwrap();
    sender.wait_idle().await;

    let record = h.store.find_command(id).await.unwrap().unwrap();
    assert_eq!(record.status, CommandStatusCode::SendError);
    assert_eq!(record.try_times, 2);
}

#[tokio::test]
async fn test_missing_host_is_a_send_error() {
    let h = harness().await;
    let id = h.create_plain(NewCommand::new("addyum", 999)).await;

    let sender = SendLoop::new(h.ctx.clone());
    sender.run_once().await.unwrap();
    sender.wait_idle().await;

    let record = h.store.find_command(id).await.unwrap().unwrap();
    assert_eq!(record.status, CommandStatusCode::SendError);
    assert_eq!(record.try_times, 1);
    assert_eq!(h.transport.request_count(), 0);
}

#[tokio::test]
async fn test_sweep_runs_before_selection() {
    let h = harness().await;
    let overtime = h.create_command("long-job").await;
    let long_ago = Utc::now() - Duration::hours(2);
    h.force_status(overtime, CommandStatusCode::Running, Some(long_ago))
        .await;

    let sender = SendLoop::new(h.ctx.clone());
    assert_eq!(sender.run_once().await.unwrap(), 0);

    let history = h.store.history_of(overtime).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].status_msg, TIMEOUT_MESSAGE);
    assert_eq!(h.transport.request_count(), 0);
}

#[tokio::test]
async fn test_in_flight_commands_are_not_selected() {
    let h = harness().await;
    let id = h.create_command("addyum").await;
    h.force_status(id, CommandStatusCode::Sent, Some(Utc::now()))
        .await;

    let sender = SendLoop::new(h.ctx.clone());
    assert_eq!(sender.run_once().await.unwrap(), 0);
    assert_eq!(h.transport.request_count(), 0);
}
