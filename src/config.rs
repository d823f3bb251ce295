use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct PhotoConfig {
    /// Key prefix all photo objects live under.
    pub prefix: String,
    /// Maximum accepted upload size, in kilobytes.
    pub max_upload_kb: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub minio_endpoint: String,
    pub minio_bucket: String,
    pub minio_access_key: String,
    pub minio_secret_key: String,
    pub session_ttl_minutes: i64,
    pub photos: PhotoConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            database_url: std::env::var("DATABASE_URL")?,
            minio_endpoint: std::env::var("MINIO_ENDPOINT")?,
            minio_bucket: std::env::var("MINIO_BUCKET")?,
            minio_access_key: std::env::var("MINIO_ACCESS_KEY")?,
            minio_secret_key: std::env::var("MINIO_SECRET_KEY")?,
            session_ttl_minutes: std::env::var("SESSION_TTL_MINUTES")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(60 * 24 * 7),
            photos: PhotoConfig {
                prefix: std::env::var("PHOTO_PREFIX").unwrap_or_else(|_| "photos/".into()),
                max_upload_kb: std::env::var("PHOTO_MAX_KB")
                    .ok()
                    .and_then(|v| v.parse::<u64>().ok())
                    .unwrap_or(1999),
            },
        })
    }
}
