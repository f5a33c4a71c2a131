//! Request client error types.

use thiserror::Error;

use crate::credentials::{CredentialError, RefreshError};

/// Terminal failures of a single GraphQL operation.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The server kept rejecting freshly derived credentials.
    #[error("Authentication rejected after {attempts} attempts")]
    AuthExhausted { attempts: u32 },

    /// The server kept answering 429.
    #[error("Rate limited after {attempts} attempts")]
    RetryExhausted { attempts: u32 },

    /// The connection kept failing.
    #[error("Transport failed after {attempts} attempts: {reason}")]
    TransportExhausted { attempts: u32, reason: String },

    #[error("Credential refresh failed: {0}")]
    Refresh(#[from] RefreshError),

    #[error("Credential store error: {0}")]
    Credential(#[from] CredentialError),

    /// The payload did not have the expected shape.
    #[error("Unexpected response shape: {0}")]
    Decode(String),
}

impl ClientError {
    /// Check if this error means a retry ceiling was reached.
    pub fn is_exhausted(&self) -> bool {
        matches!(
            self,
            Self::AuthExhausted { .. } | Self::RetryExhausted { .. } | Self::TransportExhausted { .. }
        )
    }

    /// Number of attempts made before giving up, for exhaustion errors.
    pub fn attempts(&self) -> Option<u32> {
        match self {
            Self::AuthExhausted { attempts }
            | Self::RetryExhausted { attempts }
            | Self::TransportExhausted { attempts, .. } => Some(*attempts),
            _ => None,
        }
    }
}
