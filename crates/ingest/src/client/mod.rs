//! Authenticated GraphQL request client.
//!
//! A request runs as an explicit bounded loop: every attempt reloads
//! credentials, waits for the [`RateLimiter`], sends through a [`Transport`]
//! and classifies the raw result into an [`Outcome`]. Auth rejections,
//! rate limiting and transport failures each have their own remedy but share
//! one attempt counter and one ceiling ([`RetryPolicy::max_retries`]).

mod error;
mod graph;
mod outcome;
mod rate_limit;
mod retry;
mod session;
mod transport;

pub use error::ClientError;
pub use graph::GraphClient;
pub use outcome::{GraphError, GraphResponse, Outcome};
pub use rate_limit::{RateLimitConfig, RateLimiter};
pub use retry::RetryPolicy;
pub use session::{SessionHandle, install_rustls_provider};
pub use transport::{GraphQuery, HttpTransport, RawResponse, Transport, TransportError};

#[cfg(test)]
pub(crate) use graph::tests::{SavingRefresher, ScriptedTransport};
