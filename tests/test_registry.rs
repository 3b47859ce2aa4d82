//! Integration tests for `Registry`: capacity enforcement, lookup, and
//! removal, independent of the MCP tool surface.

use agentsh_pty::config::SessionConfig;
use agentsh_pty::error::PtyError;
use agentsh_pty::registry::Registry;

fn config() -> SessionConfig {
    SessionConfig::from_overrides(
        Some("/bin/bash".to_string()),
        vec![],
        Some("/tmp".to_string()),
        None,
        None,
        None,
    )
}

#[tokio::test]
async fn create_get_remove_roundtrip() {
    let registry = Registry::new(10, None);
    let session = registry.create("r1".to_string(), config()).await.unwrap();
    assert_eq!(session.id, "r1");

    assert!(registry.get("r1").await.is_some());
    assert!(registry.remove("r1").await);
    assert!(registry.get("r1").await.is_none());
    assert!(!registry.remove("r1").await);
}

#[tokio::test]
async fn capacity_is_enforced() {
    let registry = Registry::new(2, None);
    registry.create("a".to_string(), config()).await.unwrap();
    registry.create("b".to_string(), config()).await.unwrap();

    let err = registry.create("c".to_string(), config()).await.unwrap_err();
    assert!(matches!(err, PtyError::Capacity(2)));

    registry.shutdown().await;
}

#[tokio::test]
async fn list_reflects_created_sessions() {
    let registry = Registry::new(10, None);
    registry.create("x".to_string(), config()).await.unwrap();
    registry.create("y".to_string(), config()).await.unwrap();

    let list = registry.list().await;
    assert_eq!(list.len(), 2);
    let ids: Vec<&str> = list.iter().map(|s| s.id.as_str()).collect();
    assert!(ids.contains(&"x"));
    assert!(ids.contains(&"y"));

    registry.shutdown().await;
}

#[tokio::test]
async fn shutdown_stops_every_session() {
    let registry = Registry::new(10, None);
    let session = registry.create("z".to_string(), config()).await.unwrap();
    assert!(session.is_alive());

    registry.shutdown().await;
    assert!(!session.is_alive());
    assert!(registry.list().await.is_empty());
}
