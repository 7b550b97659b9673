use sysadm_core::config::TransportConfig;
use sysadm_core::{AgentEndpoint, AgentTransport, DispatchError, DispatchTarget};
use sysadm_infrastructure::HttpAgentTransport;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::oneshot;

/// 应答一次请求的HTTP服务，返回 (端口, 收到的请求行和请求体)
async fn serve_once(
    status_line: &'static str,
    body: &'static str,
) -> (u16, oneshot::Receiver<(String, String)>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let (tx, rx) = oneshot::channel();

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut buffer = Vec::new();
        let mut chunk = [0_u8; 1024];

        let (head, content_length) = loop {
            let n = socket.read(&mut chunk).await.unwrap();
            assert!(n > 0, "connection closed before headers");
            buffer.extend_from_slice(&chunk[..n]);
            if let Some(pos) = buffer.windows(4).position(|w| w == b"\r\n\r\n") {
                let head = String::from_utf8_lossy(&buffer[..pos]).to_string();
                let length = head
                    .lines()
                    .find_map(|line| {
                        let (name, value) = line.split_once(':')?;
                        name.eq_ignore_ascii_case("content-length")
                            .then(|| value.trim().parse::<usize>().ok())
                            .flatten()
                    })
                    .unwrap_or(0);
                buffer.drain(..pos + 4);
                break (head, length);
            }
        };

        while buffer.len() < content_length {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buffer.extend_from_slice(&chunk[..n]);
        }

        let request_line = head.lines().next().unwrap_or_default().to_string();
        let _ = tx.send((request_line, String::from_utf8_lossy(&buffer).to_string()));

        let response = format!(
            "{status_line}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        socket.write_all(response.as_bytes()).await.unwrap();
        socket.shutdown().await.ok();
    });

    (port, rx)
}

fn target(port: u16) -> DispatchTarget {
    DispatchTarget {
        host_id: 1,
        address: "127.0.0.1".to_string(),
        port,
        is_tls: false,
        ca: String::new(),
        cert: String::new(),
        key: String::new(),
        insecure_skip_verify: false,
        command_uri: "/receiveCommand".to_string(),
        command_status_uri: "/getCommandStatus".to_string(),
        command_logs_uri: "getLogs".to_string(),
    }
}

#[tokio::test]
async fn test_posts_body_to_endpoint_path() {
    let (port, received) = serve_once(
        "HTTP/1.1 200 OK",
        r#"{"commandSeq":"2024060100000000007","statusCode":500}"#,
    )
    .await;
    let transport = HttpAgentTransport::new(TransportConfig::default());

    let reply = transport
        .send_request(&target(port), AgentEndpoint::Command, br#"{"hello":"agent"}"#.to_vec())
        .await
        .unwrap();
    assert_eq!(
        reply,
        br#"{"commandSeq":"2024060100000000007","statusCode":500}"#.to_vec()
    );

    let (request_line, body) = received.await.unwrap();
    assert_eq!(request_line, "POST /receiveCommand HTTP/1.1");
    assert_eq!(body, r#"{"hello":"agent"}"#);
}

#[tokio::test]
async fn test_relative_path_gets_leading_slash() {
    let (port, received) = serve_once("HTTP/1.1 200 OK", "{}").await;
    let transport = HttpAgentTransport::new(TransportConfig::default());

    transport
        .send_request(&target(port), AgentEndpoint::CommandLogs, b"{}".to_vec())
        .await
        .unwrap();

    let (request_line, _) = received.await.unwrap();
    assert_eq!(request_line, "POST /getLogs HTTP/1.1");
}

#[tokio::test]
async fn test_non_success_status_is_agent_error() {
    let (port, _received) = serve_once("HTTP/1.1 500 Internal Server Error", "boom").await;
    let transport = HttpAgentTransport::new(TransportConfig::default());

    let result = transport
        .send_request(&target(port), AgentEndpoint::CommandStatus, b"{}".to_vec())
        .await;
    assert!(matches!(result, Err(DispatchError::AgentResponse(_))));
}

#[tokio::test]
async fn test_unreachable_agent_is_network_error() {
    // 绑定后立即释放，得到一个没有监听者的端口
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().port()
    };
    let transport = HttpAgentTransport::new(TransportConfig::default());

    let result = transport
        .send_request(&target(port), AgentEndpoint::Command, b"{}".to_vec())
        .await;
    match result {
        Err(DispatchError::Network(message)) => {
            assert!(message.starts_with(&format!("can not connect to agent 127.0.0.1:{port}")));
        }
        other => panic!("unexpected result: {other:?}"),
    }
}
