use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Could not initialize item store: {0}")]
    StoreInit(String),

    #[error("Could not read item store: {0}")]
    StoreRead(String),

    #[error("Could not write item {id}: {reason}")]
    StoreWrite { id: i64, reason: String },

    #[error("Could not purge expired items: {0}")]
    Purge(String),

    #[error("Timeline fetch failed: {0}")]
    Fetch(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Async database error: {0}")]
    AsyncDatabase(#[from] tokio_rusqlite::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, AppError>;
