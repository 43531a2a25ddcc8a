//! Common test utilities for API testing with mock stages.
//!
//! The fixture builds the real router over an orchestrator whose worker
//! stages are the mocks from `cadence_core::testing`, so requests can be
//! driven in-process without any worker services.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use cadence_core::testing::{MockFinalizeStage, MockPartialProcessor, RecordingObserver};
use cadence_core::{Config, OrchestratorConfig, OrchestratorHandle, StagesConfig, StatusSnapshot};
use cadence_server::api::{create_router, WsBroadcaster};
use cadence_server::state::AppState;

/// Re-export fixtures for test convenience
#[allow(unused_imports)]
pub use cadence_core::testing::fixtures;

/// In-process server with controllable worker stages.
pub struct TestFixture {
    pub router: Router,
    pub processor: Arc<MockPartialProcessor>,
    pub finalizer: Arc<MockFinalizeStage>,
    pub orchestrator: OrchestratorHandle,
    pub observer: RecordingObserver,
    pub ws_broadcaster: WsBroadcaster,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

#[allow(dead_code)]
impl TestFixture {
    pub async fn new() -> Self {
        Self::with_config(OrchestratorConfig::default()).await
    }

    pub async fn with_config(orchestrator_config: OrchestratorConfig) -> Self {
        let processor = Arc::new(MockPartialProcessor::new());
        processor
            .set_default_delay(std::time::Duration::from_millis(10))
            .await;
        let finalizer = Arc::new(MockFinalizeStage::new());

        let config = Config {
            orchestrator: orchestrator_config.clone(),
            stages: StagesConfig {
                partial_url: Some("http://partial.worker.test/process".into()),
                finalize_url: Some("http://finalize.worker.test/merge".into()),
                ..StagesConfig::default()
            },
            ..Config::default()
        };

        let ws_broadcaster = WsBroadcaster::default();
        let observer = RecordingObserver::new();
        let observer_cb = observer.callback();
        let broadcaster = ws_broadcaster.clone();
        let orchestrator = cadence_core::SessionOrchestrator::new(
            orchestrator_config,
            Arc::clone(&processor) as _,
            Arc::clone(&finalizer) as _,
        )
        .with_status_callback(Arc::new(move |snapshot: &StatusSnapshot| {
            observer_cb(snapshot);
            broadcaster.status(snapshot);
        }))
        .spawn();

        let state = Arc::new(AppState::new(
            config,
            orchestrator.clone(),
            ws_broadcaster.clone(),
        ));

        Self {
            router: create_router(state),
            processor,
            finalizer,
            orchestrator,
            observer,
            ws_broadcaster,
        }
    }

    pub async fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path, None).await
    }

    pub async fn post(&self, path: &str, body: Value) -> TestResponse {
        self.request("POST", path, Some(body)).await
    }

    pub async fn request(&self, method: &str, path: &str, body: Option<Value>) -> TestResponse {
        let builder = Request::builder().method(method).uri(path);
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_vec(&json).unwrap()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };

        TestResponse { status, body }
    }

    /// Start a session with a fixed id.
    pub async fn start(&self, session_id: &str) -> TestResponse {
        self.post(
            "/api/v1/session",
            serde_json::json!({ "session_id": session_id, "participant": "Dr. Lee" }),
        )
        .await
    }
}
