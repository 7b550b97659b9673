use std::time::{Duration, Instant};

use sysadm_apiserver::app::Application;
use sysadm_apiserver::shutdown::ShutdownManager;
use sysadm_core::{AppConfig, CommandStatusCode, NewCommand, NewHost};

fn embedded_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.database.url = "sqlite::memory:".to_string();
    config.cache.enabled = false;
    config.dispatcher.check_command_interval_seconds = 1;
    config.transport.dial_timeout_seconds = 1;
    config.transport.request_timeout_seconds = 2;
    config
}

#[tokio::test]
async fn test_application_dispatches_and_shuts_down() {
    let app = Application::new(embedded_config()).await.unwrap();
    let store = app.context().store.clone();

    // 端口1上没有客户端监听，下发会失败并计入重试次数
    let host_id = store
        .create_host(&NewHost::new("127.0.0.1", 1))
        .await
        .unwrap();
    let id = store
        .create_command(NewCommand::new("addyum", host_id))
        .await
        .unwrap();

    let shutdown = ShutdownManager::new();
    let shutdown_rx = shutdown.subscribe().await;
    let handle = tokio::spawn(async move { app.run(shutdown_rx).await });

    let start = Instant::now();
    let mut failed = false;
    while start.elapsed() < Duration::from_secs(10) {
        if let Ok(Some(record)) = store.find_command(id).await {
            if record.status == CommandStatusCode::SendError {
                assert!(record.status_msg.contains("can not connect to agent 127.0.0.1:1"));
                failed = true;
                break;
            }
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert!(failed, "command was never attempted");

    shutdown.shutdown().await;
    let result = tokio::time::timeout(Duration::from_secs(10), handle)
        .await
        .expect("application stops after shutdown")
        .unwrap();
    assert!(result.is_ok());
}
