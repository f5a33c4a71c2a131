use ksr_ingest::credentials::RefreshError;
use ksr_ingest::pagination::PaginationError;
use ksr_ingest::store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Ingest(#[from] ksr_ingest::Error),

    #[error("Pagination failed: {0}")]
    Pagination(#[from] PaginationError),

    #[error("Session refresh failed: {0}")]
    Refresh(#[from] RefreshError),

    #[error("Record store error: {0}")]
    Store(#[from] StoreError),

    #[error("Invalid configuration file: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to initialize logging: {0}")]
    Logging(String),
}

pub type Result<T> = std::result::Result<T, AppError>;
