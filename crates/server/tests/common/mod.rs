//! Common test utilities for in-process API testing with mocks.
//!
//! This module provides a test fixture that builds the router around a
//! `MockTorrentClient`, so every endpoint can be exercised without a
//! qBittorrent instance.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use grabbit_core::{
    load_config_from_str, testing::MockTorrentClient, CancelHandle, TorrentService,
};
use grabbit_server::state::AppState;

/// Re-export fixtures for test convenience
pub use grabbit_core::testing::fixtures;

/// Test fixture with a controllable mock torrent client.
///
/// # Example
///
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_plugins() {
///     let fixture = TestFixture::new();
///     fixture.torrent_client.set_plugins(vec![fixtures::plugin("yts_mx", true)]).await;
///
///     let response = fixture.get("/plugins").await;
///     assert_eq!(response.status, 200);
/// }
/// ```
pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    /// Mock torrent client - configure searches, inspect calls
    pub torrent_client: Arc<MockTorrentClient>,
    /// Fires the same token the server cancels on shutdown
    pub shutdown: CancelHandle,
    /// Upload staging directory
    pub upload_dir: TempDir,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl TestFixture {
    /// Create a new test fixture with default settings.
    pub fn new() -> Self {
        Self::with_config(TestConfig::default())
    }

    /// Create a test fixture with custom configuration.
    pub fn with_config(test_config: TestConfig) -> Self {
        let upload_dir = TempDir::new().expect("Failed to create temp dir");

        let api_key = test_config
            .api_key
            .map(|key| format!("api_key = \"{}\"", key))
            .unwrap_or_default();
        let config = load_config_from_str(&format!(
            r#"
[qbittorrent]
host = "localhost"
port = 8080

[server]
upload_dir = "{}"
{}

[search]
poll_interval_ms = {}
max_wait_cycles = {}

[downloads]
save_path = "/srv/downloads/yify"
"#,
            upload_dir.path().display(),
            api_key,
            test_config.poll_interval_ms,
            test_config.max_wait_cycles,
        ))
        .expect("Failed to parse test config");

        let torrent_client = Arc::new(MockTorrentClient::new());
        let service = TorrentService::new(torrent_client.clone(), config);
        let (shutdown, token) = CancelHandle::new();
        let state = Arc::new(AppState::new(service, token));

        let router = grabbit_server::api::create_router(state);

        Self {
            router,
            torrent_client,
            shutdown,
            upload_dir,
        }
    }

    /// Send a GET request to the test server.
    pub async fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path, None, &[]).await
    }

    /// Send a POST request with an optional JSON body.
    pub async fn post(&self, path: &str, body: Option<Value>) -> TestResponse {
        self.request("POST", path, body, &[]).await
    }

    /// Send a DELETE request.
    pub async fn delete(&self, path: &str) -> TestResponse {
        self.request("DELETE", path, None, &[]).await
    }

    /// Send a GET request with extra headers.
    pub async fn get_with_headers(&self, path: &str, headers: &[(&str, &str)]) -> TestResponse {
        self.request("GET", path, None, headers).await
    }

    /// Send a POST request with a raw body and optional content type.
    pub async fn post_raw(&self, path: &str, content_type: Option<&str>, body: &str) -> TestResponse {
        let mut request_builder = Request::builder().method("POST").uri(path);
        if let Some(content_type) = content_type {
            request_builder = request_builder.header("Content-Type", content_type);
        }
        let request = request_builder.body(Body::from(body.to_string())).unwrap();
        self.send(request).await
    }

    /// Upload `data` as multipart field `field` with the given file name.
    pub async fn upload(&self, path: &str, field: &str, filename: &str, data: &[u8]) -> TestResponse {
        let boundary = "grabbit-test-boundary";
        let mut body = Vec::new();
        body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
                field, filename
            )
            .as_bytes(),
        );
        body.extend_from_slice(b"Content-Type: application/x-bittorrent\r\n\r\n");
        body.extend_from_slice(data);
        body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());

        let request = Request::builder()
            .method("POST")
            .uri(path)
            .header(
                "Content-Type",
                format!("multipart/form-data; boundary={}", boundary),
            )
            .body(Body::from(body))
            .unwrap();

        self.send(request).await
    }

    /// Send a request to the test server.
    async fn request(
        &self,
        method: &str,
        path: &str,
        body: Option<Value>,
        headers: &[(&str, &str)],
    ) -> TestResponse {
        let mut request_builder = Request::builder().method(method).uri(path);
        for (name, value) in headers {
            request_builder = request_builder.header(*name, *value);
        }

        let body = if let Some(json_body) = body {
            request_builder = request_builder.header("Content-Type", "application/json");
            Body::from(serde_json::to_vec(&json_body).unwrap())
        } else {
            Body::empty()
        };

        let request = request_builder.body(body).unwrap();
        self.send(request).await
    }

    async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        let body: Value = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&body_bytes).into_owned()))
        };

        TestResponse { status, body }
    }
}

/// Configuration for test fixture.
#[derive(Debug, Clone)]
pub struct TestConfig {
    pub api_key: Option<String>,
    pub poll_interval_ms: u64,
    pub max_wait_cycles: u32,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            poll_interval_ms: 10,
            max_wait_cycles: 5,
        }
    }
}

impl TestConfig {
    /// Create config with the API key guard enabled.
    pub fn with_api_key(key: &str) -> Self {
        Self {
            api_key: Some(key.to_string()),
            ..Default::default()
        }
    }
}

/// Helper to assert a response has expected status.
#[macro_export]
macro_rules! assert_status {
    ($response:expr, $status:expr) => {
        assert_eq!(
            $response.status, $status,
            "Expected status {:?}, got {:?}. Body: {}",
            $status,
            $response.status,
            serde_json::to_string_pretty(&$response.body).unwrap_or_default()
        );
    };
}
