//! JSON index: posting lists keyed by flattened JSON paths and values.

pub mod creator;
pub mod handler;
pub mod reader;

pub use creator::JsonIndexCreator;
pub use handler::{JsonIndexHandler, check_json_index_eligible};
pub use reader::JsonIndexReader;
