//! The project record store.
//!
//! Records are keyed by the server identifier and merged idempotently:
//! descriptive fields are filled once, classification flags and timestamps
//! follow the server, and funding history only grows when the numbers move.

mod error;
mod merge;
mod model;
mod persist;

pub use error::StoreError;
pub use merge::{MergeStats, merge_batch, merge_into};
pub use model::{Creator, FundingSnapshot, ProjectMap, ProjectRecord, Tags, extract_slug};
pub use persist::RecordStore;
