//! Common test utilities and helpers

use breakwater::HttpClient;
use std::path::Path;
use wiremock::MockServer;

/// Load a response fixture
#[allow(dead_code)]
pub fn load_response_fixture(name: &str) -> String {
    let manifest_dir = env!("CARGO_MANIFEST_DIR");
    let path = Path::new(manifest_dir)
        .join("tests")
        .join("fixtures")
        .join("responses")
        .join(format!("{}.json", name));

    std::fs::read_to_string(&path).unwrap_or_else(|e| {
        panic!(
            "Failed to load response fixture '{}' from {:?}: {}",
            name, path, e
        )
    })
}

/// Client whose base URL points at the mock server
#[allow(dead_code)]
pub fn client_for(server: &MockServer) -> HttpClient {
    HttpClient::builder()
        .base_url(server.uri())
        .expect("mock server URI is absolute")
        .build()
        .expect("Failed to build client")
}
