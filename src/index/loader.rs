//! Brings the indexes of a freshly loaded segment in line with the table config.

use std::collections::BTreeSet;
use std::path::Path;

use log::info;

use crate::config::TableConfig;
use crate::error::Result;
use crate::index::json::handler::JsonIndexHandler;
use crate::segment::directory::SegmentDirectory;

/// Index settings the loader reconciles against.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexLoadingConfig {
    json_index_columns: BTreeSet<String>,
}

impl IndexLoadingConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_table_config(table_config: &TableConfig) -> Self {
        Self {
            json_index_columns: table_config
                .indexing
                .json_index_columns
                .iter()
                .cloned()
                .collect(),
        }
    }

    pub fn with_json_index_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.json_index_columns = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn json_index_columns(&self) -> &BTreeSet<String> {
        &self.json_index_columns
    }
}

/// One kind of index that can be added to or removed from a sealed segment.
pub trait IndexHandler {
    /// Whether the on-disk state differs from the configured one.
    fn needs_update_indices(&self) -> Result<bool>;

    /// Add missing indexes and drop unwanted ones.
    fn update_indices(&mut self) -> Result<()>;
}

/// Runs every index handler over a segment directory.
#[derive(Debug)]
pub struct SegmentPreProcessor {
    segment: SegmentDirectory,
    config: IndexLoadingConfig,
}

impl SegmentPreProcessor {
    pub fn new(index_dir: impl AsRef<Path>, config: &IndexLoadingConfig) -> Result<Self> {
        Ok(Self {
            segment: SegmentDirectory::open(index_dir)?,
            config: config.clone(),
        })
    }

    pub fn segment(&self) -> &SegmentDirectory {
        &self.segment
    }

    pub fn needs_process(&self) -> Result<bool> {
        JsonIndexHandler::new(&self.segment, &self.config).needs_update_indices()
    }

    pub fn process(&self) -> Result<()> {
        let mut handler = JsonIndexHandler::new(&self.segment, &self.config);
        if handler.needs_update_indices()? {
            handler.update_indices()?;
        } else {
            info!("Segment: {} indexes are up to date", self.segment.name());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::DataType;
    use crate::segment::creator::SegmentCreator;
    use crate::segment::directory::IndexKind;
    use crate::segment::metadata::SegmentVersion;
    use tempfile::TempDir;

    #[test]
    fn test_from_table_config() {
        let table = TableConfig::new("t_OFFLINE").with_json_index_columns(&["b", "a", "b"]);
        let config = IndexLoadingConfig::from_table_config(&table);
        let columns: Vec<&str> = config.json_index_columns().iter().map(String::as_str).collect();
        assert_eq!(columns, vec!["a", "b"]);
    }

    #[test]
    fn test_process_then_up_to_date() {
        let root = TempDir::new().unwrap();
        let dir = root.path().join("seg");
        SegmentCreator::new(&dir, "seg", SegmentVersion::V1)
            .add_column("doc", DataType::Json, false, vec![r#"{"a": 1}"#.into()])
            .build()
            .unwrap();

        let config = IndexLoadingConfig::new().with_json_index_columns(["doc"]);
        let processor = SegmentPreProcessor::new(&dir, &config).unwrap();
        assert!(processor.needs_process().unwrap());
        processor.process().unwrap();
        assert!(!processor.needs_process().unwrap());
        assert!(processor.segment().has_index("doc", IndexKind::Json));
    }
}
