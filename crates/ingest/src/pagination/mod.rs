//! Cursor-driven pagination.
//!
//! [`drive_pagination`] walks a [`PageSource`] page by page, collects edges
//! into a bounded batch and hands full batches to a [`BatchSink`]. Flushing
//! bounds how much work a crash can lose to one batch.

mod driver;
mod model;
mod source;

pub(crate) use driver::random_delay;
pub use driver::{
    BatchSink, PaginationConfig, PaginationError, PaginationReport, StopPredicate,
    drive_pagination,
};
pub use model::{Category, Count, CreatorNode, Edge, Money, Page, PageInfo, ProjectNode};
pub use source::{ConnectionQuery, PageSource, extract_page};
