//! Partial upserts: per-column merging of records that share a primary key.

pub mod handler;
pub mod merger;

pub use handler::PartialUpsertHandler;
pub use merger::{PartialUpsertMerger, Strategy, merger_for};
