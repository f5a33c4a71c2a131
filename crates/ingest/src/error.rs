//! Crate-wide error type.

use thiserror::Error;

use crate::client::ClientError;
use crate::credentials::{CredentialError, RefreshError};
use crate::pagination::PaginationError;
use crate::store::StoreError;

/// Crate-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Credential error: {0}")]
    Credential(#[from] CredentialError),

    #[error("Refresh error: {0}")]
    Refresh(#[from] RefreshError),

    #[error("Request error: {0}")]
    Client(#[from] ClientError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Pagination error: {0}")]
    Pagination(#[from] PaginationError),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl Error {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }
}
