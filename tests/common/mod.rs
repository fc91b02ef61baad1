//! Common test utilities for goes-dl integration tests

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use goes_dl::config::SourceConfig;
use goes_dl::{Config, Dataset, FetchError, Store, TaskHandler};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Bucket name served by the mock storage endpoint
pub const TEST_BUCKET: &str = "test-goes-bucket";

/// Smallest payload the decoder accepts as a netCDF classic file
pub const CLASSIC_HEADER: &[u8] = b"CDF\x01\0\0\0\0";

/// Open a fresh store in a temp directory
///
/// The directory is removed when the returned guard drops.
pub async fn temp_store() -> (Arc<Store>, TempDir) {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let store = Store::open(&dir.path().join("tasks.db"))
        .await
        .expect("Failed to open store");
    (Arc::new(store), dir)
}

/// Config pointing the source at `server` and persistence into `dir`
pub fn mock_config(server: &MockServer, dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.persistence.database_path = dir.path().join("tasks.db");
    config.source = SourceConfig {
        base_url: server.uri(),
        bucket: TEST_BUCKET.to_string(),
    };
    config
}

/// Serve `body` for object `name` in the test bucket
pub async fn serve_object(server: &MockServer, name: &str, body: &[u8]) {
    Mock::given(method("GET"))
        .and(path(format!("/{}/{}", TEST_BUCKET, name)))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body.to_vec()))
        .mount(server)
        .await;
}

/// Answer requests for object `name` with an HTTP error status
pub async fn fail_object(server: &MockServer, name: &str, status: u16) {
    Mock::given(method("GET"))
        .and(path(format!("/{}/{}", TEST_BUCKET, name)))
        .respond_with(ResponseTemplate::new(status))
        .mount(server)
        .await;
}

/// Handler that remembers what it saw
#[derive(Default)]
pub struct RecordingHandler {
    /// Names of datasets handed to `on_item_success`
    pub saved: Mutex<Vec<String>>,
    /// Names and error kinds handed to `on_item_error`
    pub failed: Mutex<Vec<(String, &'static str)>>,
}

#[async_trait::async_trait]
impl TaskHandler for RecordingHandler {
    async fn on_item_success(&self, name: &str, _dataset: &Dataset) -> Result<(), String> {
        self.saved.lock().unwrap().push(name.to_string());
        Ok(())
    }

    async fn on_item_error(&self, name: &str, error: &FetchError) {
        self.failed
            .lock()
            .unwrap()
            .push((name.to_string(), error.kind()));
    }
}
