//! Daemon regression tests.
//!
//! Loads configuration files the way the daemon does and drives the
//! resulting status server through the full router.

use std::io::Write;
use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use tower::ServiceExt;

use ebbflow_api::{build_router, ApiState};
use ebbflow_core::{Config, ConfigError, TargetKind};
use ebbflow_metrics::{MetricsRecorder, Outcome};

const CONFIG: &str = r#"
enabled = false

[[queues]]
queue = "invoices"
broker_env = "AMQ"
threshold = 100
watermark = 20
scale_by = 2
scale_min = 1
scale_max = 10
method = "scale"
app = "billing"
process_type = "worker"

[[queues]]
queue = "outbound"
broker_env = "AMQ"
threshold = 500
method = "restart"
app = "mailer"
process_type = "worker"

[[queues]]
queue = "legacy"
broker_env = "AMQ"
threshold = 1
method = "drain"
app = "legacy"
process_type = "worker"

[[groups]]
name = "agents"
region = "us-east-1"
queue = "builds"
broker_env = "AMQ"
threshold = 50
watermark = 5
enabled = true
disable_cooldown = true
method = "scale"
"#;

fn write_config(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[test]
fn config_loads_and_skips_unknown_methods() {
    let file = write_config(CONFIG);
    let config = Config::load(file.path(), None).unwrap();

    assert!(!config.enabled);
    let ids: Vec<String> = config.targets.iter().map(|t| t.id()).collect();
    assert_eq!(
        ids,
        [
            "pod-scale/billing-worker",
            "restart/mailer-worker",
            "group-scale/agents",
        ]
    );

    match &config.targets[2].kind {
        TargetKind::GroupScale {
            honor_cooldown,
            policy,
            ..
        } => {
            assert!(!honor_cooldown);
            assert_eq!((policy.scale_up_by, policy.scale_down_by), (4, 2));
        }
        other => panic!("unexpected kind {other:?}"),
    }
}

#[test]
fn state_env_value_enables_scaling() {
    let file = write_config(CONFIG);
    assert!(Config::load(file.path(), Some("enabled")).unwrap().enabled);
    assert!(!Config::load(file.path(), Some("disabled")).unwrap().enabled);
}

#[test]
fn missing_config_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = Config::load(&dir.path().join("absent.toml"), None).unwrap_err();
    assert!(matches!(err, ConfigError::Read { .. }));
}

#[test]
fn invalid_bounds_are_rejected() {
    let file = write_config(
        r#"
        [[queues]]
        queue = "invoices"
        broker_env = "AMQ"
        threshold = 100
        watermark = 20
        scale_min = 8
        scale_max = 2
        method = "scale"
        app = "billing"
        process_type = "worker"
        "#,
    );
    assert!(matches!(
        Config::load(file.path(), None).unwrap_err(),
        ConfigError::Invalid { .. }
    ));
}

#[tokio::test]
async fn status_server_reflects_loaded_config() {
    let file = write_config(CONFIG);
    let config = Config::load(file.path(), Some("enabled")).unwrap();
    let recorder = Arc::new(MetricsRecorder::new());
    recorder
        .record_pod_capacity("billing-worker", Outcome::Success, 3)
        .await;
    // The daemon has no group provider, so only the first two targets run.
    let running = ["pod-scale/billing-worker", "restart/mailer-worker"].map(String::from);
    let router = build_router(ApiState::new(&config, running, recorder));

    let req = Request::builder().uri("/").body(Body::empty()).unwrap();
    let resp = router.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let page = String::from_utf8(body.to_vec()).unwrap();
    assert!(page.starts_with("scaling: enabled\ntargets: 3\nloops: 2\n"));
    assert!(page.contains("agents (us-east-1)"));
    assert!(page.ends_with("\tEnabled: true\n\tLoop: skipped\n"));

    let req = Request::builder()
        .uri("/api/v1/targets")
        .body(Body::empty())
        .unwrap();
    let resp = router.clone().oneshot(req).await.unwrap();
    let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["data"][0]["active"], true);
    assert_eq!(json["data"][2]["id"], "group-scale/agents");
    assert_eq!(json["data"][2]["running"], false);
    assert_eq!(json["data"][2]["active"], false);

    let req = Request::builder().uri("/metrics").body(Body::empty()).unwrap();
    let resp = router.oneshot(req).await.unwrap();
    let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains(r#"ebbflow_pod_scale_event{service="billing-worker",status="success"} 3"#));
}
