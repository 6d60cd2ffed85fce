use anyhow::{bail, Context, Result};

/// Which document-store backend to run against.
///
/// `Postgres` is the production default; `Memory` keeps everything in
/// process and is meant for local development without a database.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackendKind {
    Postgres,
    Memory,
}

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub store_backend: StoreBackendKind,
    pub database_url: String,
    pub admin_token: String,
    pub s3_bucket: String,
    pub s3_endpoint: String,
    /// Base URL prefixed to uploaded object keys in responses.
    /// Defaults to the S3 endpoint (correct for path-style MinIO).
    pub s3_public_url: String,
    pub aws_access_key_id: String,
    pub aws_secret_access_key: String,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let store_backend = match std::env::var("STORE_BACKEND")
            .unwrap_or_else(|_| "postgres".to_string())
            .as_str()
        {
            "postgres" => StoreBackendKind::Postgres,
            "memory" => StoreBackendKind::Memory,
            other => bail!("STORE_BACKEND must be 'postgres' or 'memory', got '{other}'"),
        };

        // DATABASE_URL is only meaningful for the postgres backend.
        let database_url = match store_backend {
            StoreBackendKind::Postgres => require_env("DATABASE_URL")?,
            StoreBackendKind::Memory => std::env::var("DATABASE_URL").unwrap_or_default(),
        };

        let s3_endpoint = require_env("S3_ENDPOINT")?;

        Ok(Config {
            store_backend,
            database_url,
            admin_token: require_env("ADMIN_TOKEN")?,
            s3_bucket: require_env("S3_BUCKET")?,
            s3_public_url: std::env::var("S3_PUBLIC_URL").unwrap_or_else(|_| s3_endpoint.clone()),
            s3_endpoint,
            aws_access_key_id: require_env("AWS_ACCESS_KEY_ID")?,
            aws_secret_access_key: require_env("AWS_SECRET_ACCESS_KEY")?,
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}
