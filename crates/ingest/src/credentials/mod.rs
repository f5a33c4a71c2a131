//! Credential management.
//!
//! - [`CredentialPair`]: the session cookie + CSRF token used on every call
//! - [`CredentialStore`]: persistence (file-backed or in-memory)
//! - [`CredentialRefresher`]: re-derives a pair when the stored one is
//!   missing or rejected by the server

mod error;
mod refresher;
mod store;
mod types;

pub use error::{CredentialError, RefreshError};
#[cfg(test)]
pub use refresher::MockCredentialRefresher;
pub use refresher::{CredentialRefresher, HttpSessionRefresher, extract_csrf_token, extract_session_cookie};
pub use store::{CredentialStore, FileCredentialStore, MemoryCredentialStore};
pub use types::{CSRF_HEADER, CredentialPair, SESSION_COOKIE};
