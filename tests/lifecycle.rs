//! Process lifetime: the startup script and fail-fast lookups decide the exit code.
#![cfg(unix)]

use std::sync::Arc;
use std::time::Duration;

use gatekeeper::access::{MembershipStore, MemoryStore, StoreError, StoreResult};
use gatekeeper::lifecycle::{startup, ExitReason};
use gatekeeper::net::Listener;
use tokio::time::timeout;

mod common;

struct FailingStore;

#[async_trait::async_trait]
impl MembershipStore for FailingStore {
    async fn is_member(&self, _address: &str) -> StoreResult<bool> {
        Err(StoreError::Timeout(Duration::from_secs(2)))
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}

#[tokio::test]
async fn script_exit_code_becomes_exit_reason() {
    let backend = common::start_mock_backend("ok").await;
    let mut config = common::gate_config(backend);
    config.script.command = "sleep 0.2; exit 7".to_string();
    config.script.shell = Some("sh".to_string());

    let listener = Listener::bind("127.0.0.1:0").await.unwrap();
    let store = Arc::new(MemoryStore::new(Vec::<String>::new()));

    let reason = timeout(Duration::from_secs(10), startup::serve(config, store, listener))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(reason, ExitReason::ScriptExited(7));
    assert_eq!(reason.exit_code(), 7);
}

#[tokio::test]
async fn script_that_cannot_start_is_a_startup_error() {
    let backend = common::start_mock_backend("ok").await;
    let mut config = common::gate_config(backend);
    config.script.command = "true".to_string();
    config.script.shell = Some("/nonexistent/shell".to_string());

    let listener = Listener::bind("127.0.0.1:0").await.unwrap();
    let store = Arc::new(MemoryStore::new(Vec::<String>::new()));

    let result = startup::serve(config, store, listener).await;
    assert!(matches!(result, Err(startup::StartupError::Script(_))));
}

#[tokio::test]
async fn lookup_timeout_ends_serving() {
    let backend = common::start_mock_backend("ok").await;
    let config = common::gate_config(backend);

    let listener = Listener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let serving = tokio::spawn(startup::serve(config, Arc::new(FailingStore), listener));

    let client = common::client();
    let _ = client
        .get(format!("http://{}/", addr))
        .header(common::CLIENT_IP_HEADER, "198.51.100.9")
        .timeout(Duration::from_millis(500))
        .send()
        .await;

    let reason = timeout(Duration::from_secs(5), serving)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert!(matches!(reason, ExitReason::StoreFailure(_)));
    assert_eq!(reason.exit_code(), 1);
}
