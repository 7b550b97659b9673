mod common;

use std::sync::Arc;
use std::time::Duration;

use sysadm_core::{AgentEndpoint, CommandStatusCode, CommandStore};
use sysadm_dispatcher::{run_polling_loop, PollingLoop, SendLoop};
use sysadm_testing_utils::{rep_status, wait_for};
use tokio::sync::broadcast;

use common::harness;

#[tokio::test]
async fn test_loop_runs_until_shutdown() {
    let h = harness().await;
    let id = h.create_command("addyum").await;
    h.transport.always(
        AgentEndpoint::Command,
        &rep_status("", CommandStatusCode::Received, "ok"),
    );

    let sender: Arc<dyn PollingLoop> = Arc::new(SendLoop::new(h.ctx.clone()));
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let handle = tokio::spawn(run_polling_loop(sender, shutdown_rx));

    let store = h.store.clone();
    let delivered = wait_for(
        || {
            let store = store.clone();
            async move {
                matches!(
                    store.find_command(id).await,
                    Ok(Some(record)) if record.status == CommandStatusCode::Received
                )
            }
        },
        Duration::from_secs(5),
    )
    .await;
    assert!(delivered);

    shutdown_tx.send(()).unwrap();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("loop stops after shutdown")
        .unwrap();
    assert_eq!(h.transport.request_count(), 1);
}
