//! # Quarry
//!
//! Segment-side building blocks of a real-time columnar analytics server.
//!
//! ## Features
//!
//! - JSON index reconciliation for sealed segments, safe across crashes
//! - Partial upserts with per-column merge strategies
//! - A cluster readiness gate that holds back merging until every assigned
//!   segment is loaded

pub mod cluster;
pub mod config;
pub mod data;
mod error;
pub mod index;
pub mod schema;
pub mod segment;
pub mod upsert;
mod util;

// Re-exports for the public API
pub use cluster::{ClusterStateAccessor, InMemoryClusterState, SegmentReadinessGate, SegmentState};
pub use config::{IndexingConfig, TableConfig, UpsertConfig, UpsertMode};
pub use data::{DataValue, Record};
pub use error::{QuarryError, Result};
pub use index::json::{JsonIndexHandler, JsonIndexReader};
pub use index::{IndexHandler, IndexLoadingConfig, SegmentPreProcessor};
pub use schema::{DataType, FieldSpec, Schema};
pub use segment::{SegmentCreator, SegmentDirectory, SegmentVersion};
pub use upsert::{PartialUpsertHandler, Strategy};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
