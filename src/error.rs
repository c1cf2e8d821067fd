use thiserror::Error;

#[derive(Error, Debug)]
pub enum OfflineError {
    #[error("Offline store error: {0}")]
    Store(#[from] rusqlite::Error),

    #[error("Offline store schema version {found} is newer than supported version {supported}")]
    SchemaVersion { found: i64, supported: i64 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Tile fetch returned status {status}: {url}")]
    TileStatus { status: u16, url: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl OfflineError {
    /// Build an error from a non-success tile response.
    pub fn from_tile_status(status: reqwest::StatusCode, url: &str) -> Self {
        OfflineError::TileStatus {
            status: status.as_u16(),
            url: url.to_string(),
        }
    }
}
