//! Kickstarter GraphQL ingestion.
//!
//! The crate walks a cursor-paginated GraphQL connection through an
//! authenticated, rate-limited request client and merges every fetched
//! project into a durable JSON record store.
//!
//! # Architecture
//!
//! - [`credentials`]: session token / CSRF token persistence and re-derivation
//! - [`client`]: the authenticated request client, its retry state machine,
//!   the rate limiter and the HTTP session resource
//! - [`pagination`]: the cursor-driven batching driver
//! - [`store`]: the project record model, merge algorithm and persistence
//! - [`enrich`], [`filter`], [`currency`]: follow-up passes over the store

pub mod client;
pub mod config;
pub mod credentials;
pub mod currency;
pub mod enrich;
pub mod error;
pub mod filter;
mod fs;
pub mod pagination;
pub mod queries;
pub mod store;

pub use client::{GraphClient, GraphQuery, GraphResponse, RetryPolicy};
pub use credentials::{CredentialPair, CredentialRefresher, CredentialStore};
pub use error::{Error, Result};
pub use pagination::{PaginationConfig, PaginationReport, drive_pagination};
pub use store::{ProjectMap, ProjectRecord, RecordStore, merge_batch};
