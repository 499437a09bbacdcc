//! Reconciles the JSON indexes present in a segment with the table config.
//!
//! Building a column is guarded by an `<column>.json.idx.inprogress` marker
//! file. The marker is created before the first byte of the index is written
//! and deleted only after the index is sealed (and packed, for V3 segments).
//! A marker found on a later pass means the previous attempt died midway, so
//! whatever artifact exists for that column is discarded and rebuilt.

use std::collections::BTreeSet;
use std::fs::{self, File};
use std::path::PathBuf;

use log::{debug, info, warn};

use crate::error::{QuarryError, Result};
use crate::index::json::creator::{JsonIndexCreator, spill_dir_prefix};
use crate::index::loader::{IndexHandler, IndexLoadingConfig};
use crate::schema::DataType;
use crate::segment::directory::{IndexKind, SegmentDirectory, SegmentFormatPacker};
use crate::segment::forward::ColumnValueSource;
use crate::segment::metadata::{ColumnMetadata, SegmentVersion};

const IN_PROGRESS_SUFFIX: &str = ".inprogress";

/// Adds and removes JSON indexes of one segment.
///
/// Columns are processed in name order. The first failing column aborts the
/// pass; indexes sealed before it stay valid and its marker is left behind so
/// the next pass rebuilds it.
#[derive(Debug)]
pub struct JsonIndexHandler<'a> {
    segment: &'a SegmentDirectory,
    columns_to_add: BTreeSet<String>,
}

impl<'a> JsonIndexHandler<'a> {
    pub fn new(segment: &'a SegmentDirectory, config: &IndexLoadingConfig) -> Self {
        Self {
            segment,
            columns_to_add: config.json_index_columns().clone(),
        }
    }

    /// Path of the build marker for `column`.
    pub fn build_marker(&self, column: &str) -> PathBuf {
        let mut name = self
            .segment
            .index_file(column, IndexKind::Json)
            .into_os_string();
        name.push(IN_PROGRESS_SUFFIX);
        PathBuf::from(name)
    }

    /// Columns with a build marker left on disk.
    pub fn columns_with_marker(&self) -> Result<BTreeSet<String>> {
        let suffix = format!("{}{IN_PROGRESS_SUFFIX}", IndexKind::Json.file_extension());
        let mut columns = BTreeSet::new();
        for entry in fs::read_dir(self.segment.dir())? {
            let entry = entry?;
            if let Some(column) = entry
                .file_name()
                .to_str()
                .and_then(|name| name.strip_suffix(suffix.as_str()))
            {
                columns.insert(column.to_string());
            }
        }
        Ok(columns)
    }

    /// Columns whose sealed JSON index can be trusted.
    pub fn existing_columns(&self) -> Result<BTreeSet<String>> {
        let markers = self.columns_with_marker()?;
        Ok(self
            .segment
            .columns_with_index(IndexKind::Json)?
            .into_iter()
            .filter(|column| !markers.contains(column))
            .collect())
    }

    fn remove_json_index(&self, column: &str) -> Result<()> {
        let segment_name = self.segment.name();
        info!("Removing existing json index from segment: {segment_name}, column: {column}");
        self.segment.remove_index(column, IndexKind::Json)?;
        let marker = self.build_marker(column);
        if marker.exists() {
            self.remove_spill_dirs(column)?;
            fs::remove_file(&marker)?;
        }
        info!("Removed existing json index from segment: {segment_name}, column: {column}");
        Ok(())
    }

    /// Drop every trace of an interrupted build of `column`.
    fn discard_stale_artifacts(&self, column: &str) -> Result<()> {
        info!(
            "Found in-progress marker for segment: {}, column: {column}; \
             discarding stale json index",
            self.segment.name()
        );
        self.segment.remove_index(column, IndexKind::Json)?;
        self.remove_spill_dirs(column)
    }

    /// Scratch directories left by a creator that never got dropped.
    fn remove_spill_dirs(&self, column: &str) -> Result<()> {
        let prefix = spill_dir_prefix(column);
        for entry in fs::read_dir(self.segment.dir())? {
            let entry = entry?;
            let is_spill = entry
                .file_name()
                .to_str()
                .is_some_and(|name| name.starts_with(&prefix));
            if is_spill && entry.file_type()?.is_dir() {
                fs::remove_dir_all(entry.path())?;
            }
        }
        Ok(())
    }

    fn create_json_index_for_column(&self, column: &ColumnMetadata) -> Result<()> {
        let segment_name = self.segment.name();
        let column_name = column.name.as_str();
        let marker = self.build_marker(column_name);

        if marker.exists() {
            self.discard_stale_artifacts(column_name)?;
        } else {
            File::create(&marker)?.sync_all()?;
        }

        info!("Creating new json index for segment: {segment_name}, column: {column_name}");
        let index_file = {
            let source = ColumnValueSource::open(self.segment, column)?;
            let mut creator = JsonIndexCreator::new(self.segment.dir(), column_name)?;
            for doc_id in 0..column.total_docs {
                creator.add(source.string_value(doc_id)?)?;
            }
            creator.seal()?
        };

        if self.segment.version() == SegmentVersion::V3 {
            self.segment.pack(column_name, &index_file, IndexKind::Json)?;
        }

        if let Err(e) = fs::remove_file(&marker) {
            warn!(
                "Failed to delete build marker {} for segment: {segment_name}: {e}; \
                 the index will be rebuilt on next load",
                marker.display()
            );
        }

        info!("Created json index for segment: {segment_name}, column: {column_name}");
        Ok(())
    }
}

/// JSON indexes can only be built on single-value STRING or JSON columns.
pub fn check_json_index_eligible(column: &ColumnMetadata) -> Result<()> {
    if column.single_value && matches!(column.data_type, DataType::String | DataType::Json) {
        Ok(())
    } else {
        Err(QuarryError::invalid_config(format!(
            "json index can only be applied to single-value STRING or JSON columns, \
             column {} is {}{:?}",
            column.name,
            if column.single_value { "single-value " } else { "multi-value " },
            column.data_type
        )))
    }
}

impl IndexHandler for JsonIndexHandler<'_> {
    fn needs_update_indices(&self) -> Result<bool> {
        if !self.columns_with_marker()?.is_empty() {
            return Ok(true);
        }
        let metadata = self.segment.metadata();
        let desired: BTreeSet<String> = self
            .columns_to_add
            .iter()
            .filter(|column| metadata.column_metadata_for(column).is_some())
            .cloned()
            .collect();
        Ok(self.existing_columns()? != desired)
    }

    fn update_indices(&mut self) -> Result<()> {
        let segment = self.segment;
        let markers = self.columns_with_marker()?;
        let listed = segment.columns_with_index(IndexKind::Json)?;

        // Remove indices not set in table config any more.
        for column in listed.union(&markers) {
            if !self.columns_to_add.contains(column) {
                self.remove_json_index(column)?;
            }
        }

        let metadata = segment.metadata();
        let mut to_build = Vec::new();
        for column in &self.columns_to_add {
            if listed.contains(column) && !markers.contains(column) {
                continue;
            }
            match metadata.column_metadata_for(column) {
                Some(column_metadata) => {
                    check_json_index_eligible(column_metadata)?;
                    to_build.push(column_metadata);
                }
                None => {
                    debug!(
                        "Skipping json index for column: {column} absent from segment: {}",
                        segment.name()
                    );
                    if markers.contains(column) {
                        self.remove_json_index(column)?;
                    }
                }
            }
        }

        for column_metadata in to_build {
            self.create_json_index_for_column(column_metadata)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column(data_type: DataType, single_value: bool) -> ColumnMetadata {
        ColumnMetadata {
            name: "c".to_string(),
            data_type,
            single_value,
            has_dictionary: false,
            total_docs: 0,
            cardinality: 0,
        }
    }

    #[test]
    fn test_eligibility() {
        assert!(check_json_index_eligible(&column(DataType::String, true)).is_ok());
        assert!(check_json_index_eligible(&column(DataType::Json, true)).is_ok());

        let err = check_json_index_eligible(&column(DataType::String, false)).unwrap_err();
        assert!(matches!(err, QuarryError::InvalidConfig(_)));
        assert!(check_json_index_eligible(&column(DataType::Long, true)).is_err());
    }
}
