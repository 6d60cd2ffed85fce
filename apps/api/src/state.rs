use aws_sdk_s3::Client as S3Client;

use crate::config::Config;
use crate::store::Store;

/// Shared application state injected into all route handlers via Axum
/// extractors. Handlers are stateless; everything mutable lives behind the
/// store facade.
#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    /// Blob storage for project image uploads.
    pub s3: S3Client,
    pub config: Config,
}
