//! Segment and column metadata persisted as `metadata.json`.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{QuarryError, Result};
use crate::schema::DataType;

pub const METADATA_FILE: &str = "metadata.json";

/// On-disk layout of a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmentVersion {
    /// One standalone file per index artifact.
    V1,
    /// All index artifacts folded into a single packed file.
    V3,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnMetadata {
    pub name: String,
    pub data_type: DataType,
    pub single_value: bool,
    pub has_dictionary: bool,
    pub total_docs: u32,
    /// Number of distinct values.
    pub cardinality: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentMetadata {
    pub name: String,
    pub version: SegmentVersion,
    pub total_docs: u32,
    pub columns: Vec<ColumnMetadata>,
}

impl SegmentMetadata {
    pub fn column_metadata_for(&self, column: &str) -> Option<&ColumnMetadata> {
        self.columns.iter().find(|c| c.name == column)
    }

    pub fn load(index_dir: &Path) -> Result<Self> {
        let path = index_dir.join(METADATA_FILE);
        if !path.exists() {
            return Err(QuarryError::not_found(format!(
                "segment metadata at {}",
                path.display()
            )));
        }
        let bytes = fs::read(&path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Persist the metadata with a write-then-rename so readers never see a torn file.
    pub fn save(&self, index_dir: &Path) -> Result<()> {
        let json = serde_json::to_vec_pretty(self)?;
        let tmp = index_dir.join(format!("{METADATA_FILE}.tmp"));
        fs::write(&tmp, json)?;
        fs::rename(&tmp, index_dir.join(METADATA_FILE))?;
        Ok(())
    }
}
