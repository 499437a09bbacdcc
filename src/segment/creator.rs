//! Writes immutable segments from in-memory column values.

use std::fs;
use std::path::PathBuf;

use log::info;

use crate::error::{QuarryError, Result};
use crate::schema::DataType;
use crate::segment::directory::{IndexKind, SegmentDirectory, SegmentFormatPacker};
use crate::segment::forward::{Dictionary, ForwardIndex};
use crate::segment::metadata::{ColumnMetadata, SegmentMetadata, SegmentVersion};

#[derive(Debug)]
struct PendingColumn {
    name: String,
    data_type: DataType,
    dictionary: bool,
    values: Vec<String>,
}

/// Builds a single-value segment column by column.
///
/// Values are stored in their string form; every column must have the same
/// number of rows.
#[derive(Debug)]
pub struct SegmentCreator {
    dir: PathBuf,
    name: String,
    version: SegmentVersion,
    columns: Vec<PendingColumn>,
}

impl SegmentCreator {
    pub fn new(dir: impl Into<PathBuf>, name: impl Into<String>, version: SegmentVersion) -> Self {
        Self {
            dir: dir.into(),
            name: name.into(),
            version,
            columns: Vec::new(),
        }
    }

    /// Add a column. `dictionary` selects dictionary encoding over raw storage.
    pub fn add_column(
        mut self,
        name: impl Into<String>,
        data_type: DataType,
        dictionary: bool,
        values: Vec<String>,
    ) -> Self {
        self.columns.push(PendingColumn {
            name: name.into(),
            data_type,
            dictionary,
            values,
        });
        self
    }

    pub fn build(self) -> Result<SegmentDirectory> {
        let total_docs = self.columns.first().map_or(0, |c| c.values.len());
        if let Some(column) = self.columns.iter().find(|c| c.values.len() != total_docs) {
            return Err(QuarryError::invalid_argument(format!(
                "column {} has {} rows, expected {total_docs}",
                column.name,
                column.values.len()
            )));
        }
        let total_docs: u32 = total_docs
            .try_into()
            .map_err(|_| QuarryError::invalid_argument("too many rows for one segment"))?;

        fs::create_dir_all(&self.dir)?;

        let mut columns_metadata = Vec::with_capacity(self.columns.len());
        let mut written = Vec::new();
        for column in self.columns {
            let mut distinct = column.values.clone();
            distinct.sort();
            distinct.dedup();
            let cardinality = distinct.len() as u32;

            let forward = if column.dictionary {
                let dictionary = Dictionary::new(distinct);
                let mut ids = Vec::with_capacity(column.values.len());
                for value in &column.values {
                    ids.push(dictionary.index_of(value).ok_or_else(|| {
                        QuarryError::internal(format!(
                            "value missing from dictionary of {}",
                            column.name
                        ))
                    })?);
                }
                let path = self.dir.join(format!(
                    "{}{}",
                    column.name,
                    IndexKind::Dictionary.file_extension()
                ));
                fs::write(&path, dictionary.to_bytes()?)?;
                written.push((column.name.clone(), path, IndexKind::Dictionary));
                ForwardIndex::DictIds(ids)
            } else {
                ForwardIndex::Raw(column.values)
            };

            let path = self.dir.join(format!(
                "{}{}",
                column.name,
                IndexKind::Forward.file_extension()
            ));
            fs::write(&path, forward.to_bytes()?)?;
            written.push((column.name.clone(), path, IndexKind::Forward));

            columns_metadata.push(ColumnMetadata {
                name: column.name,
                data_type: column.data_type,
                single_value: true,
                has_dictionary: column.dictionary,
                total_docs,
                cardinality,
            });
        }

        let metadata = SegmentMetadata {
            name: self.name,
            version: self.version,
            total_docs,
            columns: columns_metadata,
        };
        metadata.save(&self.dir)?;

        let segment = SegmentDirectory::open(&self.dir)?;
        if self.version == SegmentVersion::V3 {
            for (column, path, kind) in written {
                segment.pack(&column, &path, kind)?;
            }
        }

        info!(
            "Created segment: {} with {} docs in {}",
            segment.name(),
            total_docs,
            self.dir.display()
        );
        Ok(segment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::forward::ColumnValueSource;
    use tempfile::TempDir;

    #[test]
    fn test_build_dictionary_and_raw_columns() {
        let root = TempDir::new().unwrap();
        let segment = SegmentCreator::new(root.path().join("s"), "s", SegmentVersion::V1)
            .add_column(
                "city",
                DataType::String,
                true,
                vec!["paris".into(), "oslo".into(), "paris".into()],
            )
            .add_column(
                "doc",
                DataType::Json,
                false,
                vec!["{}".into(), "[]".into(), "1".into()],
            )
            .build()
            .unwrap();

        let city = segment.metadata().column_metadata_for("city").unwrap();
        assert_eq!(city.cardinality, 2);
        assert!(city.has_dictionary);

        let source = ColumnValueSource::open(&segment, city).unwrap();
        assert!(matches!(source, ColumnValueSource::Dictionary { .. }));
        assert_eq!(source.string_value(0).unwrap(), "paris");
        assert_eq!(source.string_value(1).unwrap(), "oslo");

        let doc = segment.metadata().column_metadata_for("doc").unwrap();
        let source = ColumnValueSource::open(&segment, doc).unwrap();
        assert!(matches!(source, ColumnValueSource::Raw { .. }));
        assert_eq!(source.string_value(2).unwrap(), "1");
    }

    #[test]
    fn test_mismatched_row_counts() {
        let root = TempDir::new().unwrap();
        let err = SegmentCreator::new(root.path().join("s"), "s", SegmentVersion::V1)
            .add_column("a", DataType::String, false, vec!["x".into()])
            .add_column("b", DataType::String, false, vec![])
            .build()
            .unwrap_err();
        assert!(matches!(err, QuarryError::InvalidArgument(_)));
    }
}
