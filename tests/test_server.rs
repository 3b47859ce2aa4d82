//! Integration tests for the MCP server tools via duplex transport.
//!
//! Uses `tokio::io::duplex` to create an in-process transport, connects a
//! test client to the server, and exercises all seven tools through the
//! MCP protocol.

use agentsh_pty::registry::Registry;
use agentsh_pty::server::PtyMcpServer;
use rmcp::model::*;
use rmcp::{ClientHandler, ServiceExt};
use serde_json::Value;

#[derive(Default, Clone)]
struct TestClient;

impl ClientHandler for TestClient {}

async fn setup(
    max_sessions: usize,
) -> rmcp::service::RunningService<
    rmcp::service::RoleClient,
    impl rmcp::service::Service<rmcp::service::RoleClient>,
> {
    let (server_transport, client_transport) = tokio::io::duplex(65536);

    let registry = Registry::new(max_sessions, None);
    let server = PtyMcpServer::new(registry);
    tokio::spawn(async move {
        let service = server.serve(server_transport).await.unwrap();
        let _ = service.waiting().await;
    });

    let client = TestClient::default();
    client.serve(client_transport).await.unwrap()
}

async fn call_tool(
    client: &rmcp::service::RunningService<
        rmcp::service::RoleClient,
        impl rmcp::service::Service<rmcp::service::RoleClient>,
    >,
    name: &str,
    args: Value,
) -> String {
    let params = CallToolRequestParams {
        meta: None,
        name: name.to_string().into(),
        arguments: Some(serde_json::from_value(args).unwrap()),
        task: None,
    };
    let request = ClientRequest::CallToolRequest(Request::new(params));
    let response = client.send_request(request).await.unwrap();

    let ServerResult::CallToolResult(result) = response else {
        panic!("expected CallToolResult, got {response:?}");
    };

    result
        .content
        .iter()
        .filter_map(|c| match &c.raw {
            RawContent::Text(t) => Some(t.text.as_str()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("")
}

#[tokio::test]
async fn start_run_stop_roundtrip() {
    let client = setup(10).await;

    let started = call_tool(
        &client,
        "start_session",
        serde_json::json!({"command": "/bin/bash", "cwd": "/tmp"}),
    )
    .await;
    assert!(started.starts_with("Session started: "));
    let id = started
        .lines()
        .next()
        .unwrap()
        .trim_start_matches("Session started: ")
        .to_string();

    let output = call_tool(
        &client,
        "run_command",
        serde_json::json!({"session_id": id, "command": "echo hello_mcp"}),
    )
    .await;
    assert!(output.contains("hello_mcp"), "got: {output}");

    let stopped = call_tool(
        &client,
        "stop_session",
        serde_json::json!({"session_id": id}),
    )
    .await;
    assert_eq!(stopped, format!("Session stopped: {id}"));

    client.cancel().await.unwrap();
}

#[tokio::test]
async fn run_command_unknown_session_reports_not_found() {
    let client = setup(10).await;
    let result = call_tool(
        &client,
        "run_command",
        serde_json::json!({"session_id": "nope", "command": "echo hi"}),
    )
    .await;
    assert_eq!(result, "Session not found: nope");
    client.cancel().await.unwrap();
}

#[tokio::test]
async fn stop_unknown_session_reports_not_found() {
    let client = setup(10).await;
    let result = call_tool(
        &client,
        "stop_session",
        serde_json::json!({"session_id": "nope"}),
    )
    .await;
    assert_eq!(result, "Session not found: nope");
    client.cancel().await.unwrap();
}

#[tokio::test]
async fn send_keys_then_read_buffer() {
    let client = setup(10).await;
    let started = call_tool(
        &client,
        "start_session",
        serde_json::json!({"command": "/bin/bash"}),
    )
    .await;
    let id = started
        .lines()
        .next()
        .unwrap()
        .trim_start_matches("Session started: ")
        .to_string();

    let sent = call_tool(
        &client,
        "send_keys",
        serde_json::json!({"session_id": id, "keys": "echo via_send_keys\\n"}),
    )
    .await;
    assert_eq!(sent, "Keys sent");

    // Give the shell a moment to process and echo the line.
    tokio::time::sleep(std::time::Duration::from_millis(300)).await;

    let buffer = call_tool(
        &client,
        "get_buffer",
        serde_json::json!({"session_id": id}),
    )
    .await;
    assert!(buffer.contains("via_send_keys"), "got: {buffer}");

    client.cancel().await.unwrap();
}

#[tokio::test]
async fn set_sentinel_rejects_missing_placeholder() {
    let client = setup(10).await;
    let started = call_tool(
        &client,
        "start_session",
        serde_json::json!({"command": "/bin/bash"}),
    )
    .await;
    let id = started
        .lines()
        .next()
        .unwrap()
        .trim_start_matches("Session started: ")
        .to_string();

    let result = call_tool(
        &client,
        "set_sentinel",
        serde_json::json!({"session_id": id, "sentinel_command": "echo done"}),
    )
    .await;
    assert!(result.starts_with("Error: "));
    assert!(result.contains("{sentinel}"));

    client.cancel().await.unwrap();
}

#[tokio::test]
async fn list_sessions_reports_none_then_active() {
    let client = setup(10).await;

    let empty = call_tool(&client, "list_sessions", serde_json::json!({})).await;
    assert_eq!(empty, "No active sessions");

    let started = call_tool(
        &client,
        "start_session",
        serde_json::json!({"command": "/bin/bash"}),
    )
    .await;
    let id = started
        .lines()
        .next()
        .unwrap()
        .trim_start_matches("Session started: ")
        .to_string();

    let listing = call_tool(&client, "list_sessions", serde_json::json!({})).await;
    assert!(listing.starts_with("Active sessions:\n"));
    assert!(listing.contains(&id));

    client.cancel().await.unwrap();
}

#[tokio::test]
async fn start_session_enforces_capacity() {
    let client = setup(1).await;

    let first = call_tool(
        &client,
        "start_session",
        serde_json::json!({"command": "/bin/bash"}),
    )
    .await;
    assert!(first.starts_with("Session started: "));

    let second = call_tool(
        &client,
        "start_session",
        serde_json::json!({"command": "/bin/bash"}),
    )
    .await;
    assert_eq!(second, "Maximum sessions (1) reached");

    client.cancel().await.unwrap();
}
