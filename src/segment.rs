//! Immutable columnar segments on local disk.

pub mod creator;
pub mod directory;
pub mod forward;
pub mod metadata;

pub use creator::SegmentCreator;
pub use directory::{IndexKind, SegmentDirectory, SegmentFormatPacker};
pub use forward::{ColumnValueSource, Dictionary, ForwardIndex};
pub use metadata::{ColumnMetadata, SegmentMetadata, SegmentVersion};
