//! Secondary indexes built on top of sealed segments.

pub mod json;
pub mod loader;

pub use loader::{IndexHandler, IndexLoadingConfig, SegmentPreProcessor};
