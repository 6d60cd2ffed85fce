//! Shared fixtures for the unit tests. Compiled only under `cfg(test)`.

use axum::http::{HeaderMap, HeaderValue};

use crate::auth::ADMIN_TOKEN_HEADER;
use crate::config::{Config, StoreBackendKind};
use crate::state::AppState;
use crate::store::Store;

pub const TEST_ADMIN_TOKEN: &str = "secret123";

pub fn test_config() -> Config {
    Config {
        store_backend: StoreBackendKind::Memory,
        database_url: String::new(),
        admin_token: TEST_ADMIN_TOKEN.to_string(),
        s3_bucket: "test-bucket".to_string(),
        s3_endpoint: "http://localhost:9000".to_string(),
        s3_public_url: "http://localhost:9000".to_string(),
        aws_access_key_id: "test".to_string(),
        aws_secret_access_key: "test".to_string(),
        port: 8080,
        rust_log: "info".to_string(),
    }
}

pub fn admin_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(ADMIN_TOKEN_HEADER, HeaderValue::from_static(TEST_ADMIN_TOKEN));
    headers
}

/// An `AppState` over the given store. The S3 client is never exercised by
/// unit tests; it only needs to construct.
pub fn test_state(store: Store) -> AppState {
    let s3_conf = aws_sdk_s3::Config::builder()
        .behavior_version(aws_sdk_s3::config::BehaviorVersion::latest())
        .region(aws_sdk_s3::config::Region::new("us-east-1"))
        .build();

    AppState {
        store,
        s3: aws_sdk_s3::Client::from_conf(s3_conf),
        config: test_config(),
    }
}
