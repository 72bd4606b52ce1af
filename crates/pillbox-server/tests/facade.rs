//! End-to-end tests for the query facade
//!
//! Each test owns a [`TestContext`] holding a seeded log directory that is
//! removed when the context drops.

use std::sync::Arc;
use std::time::Duration;

use pillbox_core::{DEBUGGER_PLUGIN_NAME, DataType, DebuggerEventMetadata};
use pillbox_multiplexer::RunState;
use pillbox_server::seed::{DEBUGGER_DEVICE, seed_debugger_logdir};
use pillbox_server::{
    DataServer, FakeDataServer, IndexDataServer, LookupRequest, QueryError, ServerConfig,
};
use pillbox_storage::RunLogConfig;
use tempfile::TempDir;

struct TestContext {
    temp: TempDir,
    server: IndexDataServer,
}

impl TestContext {
    /// Seeded log directory with runs discovered but not yet reloaded
    async fn seeded() -> Self {
        let temp = TempDir::new().unwrap();
        seed_debugger_logdir(temp.path(), &RunLogConfig::default()).unwrap();
        let server = IndexDataServer::open(&ServerConfig::with_logdir(temp.path()))
            .await
            .unwrap();
        Self { temp, server }
    }

    async fn reloaded() -> Self {
        let ctx = Self::seeded().await;
        assert!(ctx.server.refresh(Duration::from_secs(5)).await.unwrap());
        ctx
    }
}

// ============================================================================
// Lookup
// ============================================================================

#[tokio::test]
async fn test_lookup_orders_by_step() {
    let ctx = TestContext::reloaded().await;

    let response = ctx
        .server
        .lookup(&LookupRequest::new(".", "layers/Matmul"))
        .await
        .unwrap();
    assert!(response.ready);
    assert_eq!(response.steps(), vec![2, 7]);
    assert_eq!(response.values[0].wall_time, 42.0);
    assert_eq!(response.values[1].summary.output_slot, 1);

    let foo = ctx
        .server
        .lookup(&LookupRequest::new("run_foo", "layers/Variable"))
        .await
        .unwrap();
    assert_eq!(foo.steps(), vec![42]);
}

#[tokio::test]
async fn test_lookup_unknown_tag_is_typed_error() {
    let ctx = TestContext::reloaded().await;
    let err = ctx
        .server
        .lookup(&LookupRequest::new(".", "nonexistent"))
        .await
        .unwrap_err();
    assert!(matches!(err, QueryError::UnknownTag { ref tag, .. } if tag == "nonexistent"));
}

#[tokio::test]
async fn test_lookup_step_range() {
    let ctx = TestContext::reloaded().await;
    let request = LookupRequest::new(".", "logits/Add").with_step_range(Some(8), None);
    let response = ctx.server.lookup(&request).await.unwrap();
    assert_eq!(response.steps(), vec![8]);
    assert_eq!(response.values[0].wall_time, 1338.0);
}

#[tokio::test]
async fn test_lookup_before_reload_is_not_ready() {
    let ctx = TestContext::seeded().await;
    assert_eq!(
        ctx.server.multiplexer().run_state(".").unwrap(),
        RunState::Registered
    );

    let response = ctx
        .server
        .lookup(&LookupRequest::new(".", "layers/Matmul"))
        .await
        .unwrap();
    assert!(!response.ready);
    assert!(response.values.is_empty());
}

#[tokio::test]
async fn test_response_json_shape() {
    let ctx = TestContext::reloaded().await;
    let response = ctx
        .server
        .lookup(&LookupRequest::new("run_foo", "layers/Variable"))
        .await
        .unwrap();

    let json: serde_json::Value = serde_json::from_str(&response.to_json().unwrap()).unwrap();
    assert_eq!(json["run"], "run_foo");
    assert_eq!(json["ready"], true);
    assert_eq!(json["values"][0]["step"], 42);
    assert_eq!(json["values"][0]["summary"]["device"], DEBUGGER_DEVICE);
}

// ============================================================================
// Refresh
// ============================================================================

#[tokio::test]
async fn test_refresh_before_logdir_exists() {
    let temp = TempDir::new().unwrap();
    let logdir = temp.path().join("logdir");
    let config = ServerConfig::with_logdir(&logdir).with_run(".", &logdir);
    let server = IndexDataServer::open(&config).await.unwrap();

    let request = LookupRequest::new(".", "layers/Matmul");
    let response = server
        .refresh_and_lookup(&request, Duration::from_secs(5))
        .await
        .unwrap();
    assert!(!response.ready);
    assert_eq!(server.multiplexer().run_state(".").unwrap(), RunState::Empty);

    seed_debugger_logdir(&logdir, &RunLogConfig::default()).unwrap();
    let response = server
        .refresh_and_lookup(&request, Duration::from_secs(5))
        .await
        .unwrap();
    assert!(response.ready);
    assert_eq!(response.steps(), vec![2, 7]);
}

#[tokio::test]
async fn test_refresh_discovers_runs_written_after_open() {
    let temp = TempDir::new().unwrap();
    let logdir = temp.path().join("logdir");
    let server = IndexDataServer::open(&ServerConfig::with_logdir(&logdir))
        .await
        .unwrap();

    let request = LookupRequest::new(".", "layers/Matmul");
    assert!(matches!(
        server.lookup(&request).await,
        Err(QueryError::UnknownRun(_))
    ));

    seed_debugger_logdir(&logdir, &RunLogConfig::default()).unwrap();
    let response = server
        .refresh_and_lookup(&request, Duration::from_secs(5))
        .await
        .unwrap();
    assert!(response.ready);
    assert_eq!(response.steps(), vec![2, 7]);
    assert!(server.multiplexer().list_runs().contains("run_foo"));
}

#[tokio::test]
async fn test_refresh_is_idempotent() {
    let ctx = TestContext::reloaded().await;
    let request = LookupRequest::new(".", "logits/Add");
    let first = ctx.server.lookup(&request).await.unwrap();

    let again = ctx
        .server
        .refresh_and_lookup(&request, Duration::from_secs(5))
        .await
        .unwrap();
    assert_eq!(again, first);
    assert_eq!(ctx.server.multiplexer().snapshot().record_count(), 5);
}

// ============================================================================
// Health Pills
// ============================================================================

#[tokio::test]
async fn test_health_pills_by_node() {
    let ctx = TestContext::reloaded().await;
    let nodes = vec![
        "layers/Matmul".to_string(),
        "logits/Add".to_string(),
        "layers/Variable".to_string(),
    ];

    let pills = ctx.server.health_pills(".", &nodes, None).await.unwrap();
    assert_eq!(pills.len(), 2);
    assert!(!pills.contains_key("layers/Variable"));

    let add = &pills["logits/Add"];
    assert_eq!(add.len(), 2);
    assert_eq!(add[0].dtype, Some(DataType::Int32));
    assert_eq!(add[0].shape, vec![3, 3]);
    assert_eq!(add[1].dtype, Some(DataType::Int16));
    assert!(add[1].shape.is_empty());

    let at_seven = ctx.server.health_pills(".", &nodes, Some(7)).await.unwrap();
    assert_eq!(at_seven["layers/Matmul"].len(), 1);
    assert_eq!(at_seven["layers/Matmul"][0].output_slot, 1);
    assert_eq!(at_seven["logits/Add"][0].wall_time, 1337.0);
}

#[tokio::test]
async fn test_plugin_content_is_debugger_metadata() {
    let ctx = TestContext::reloaded().await;
    let content = ctx
        .server
        .multiplexer()
        .plugin_run_to_tag_to_content(DEBUGGER_PLUGIN_NAME);

    let matmul = DebuggerEventMetadata::from_content(&content["."]["layers/Matmul"]).unwrap();
    assert_eq!(matmul.device, DEBUGGER_DEVICE);
    // Latest record for the tag wins
    assert_eq!(matmul.output_slot, 1);
    assert_eq!(content["run_foo"].len(), 1);
}

// ============================================================================
// Injection
// ============================================================================

/// Consumers hold `dyn DataServer`, so either implementation can be injected
async fn first_step(server: &dyn DataServer, run: &str, tag: &str) -> Option<i64> {
    let response = server.lookup(&LookupRequest::new(run, tag)).await.ok()?;
    response.values.first().map(|v| v.step)
}

#[tokio::test]
async fn test_consumers_accept_either_server() {
    let ctx = TestContext::reloaded().await;
    assert_eq!(first_step(&ctx.server, ".", "logits/Add").await, Some(7));

    let fake = Arc::new(FakeDataServer::new());
    assert_eq!(first_step(fake.as_ref(), ".", "logits/Add").await, None);
    assert_eq!(
        fake.lookup_requests(),
        vec![LookupRequest::new(".", "logits/Add")]
    );

    // Keep the seeded directory alive until the end
    assert!(ctx.temp.path().exists());
}
