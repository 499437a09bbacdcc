//! Local segment directory: standalone index files plus the packed v3 store.
//!
//! ```text
//! <segment>/
//! ├── metadata.json
//! ├── <column>.fwd / <column>.dict / <column>.json.idx   (standalone, V1)
//! ├── columns.psf                                        (packed bytes, V3)
//! └── index_map.json                                     (packed directory, V3)
//! ```
//!
//! Removing a packed artifact only drops its `index_map.json` entry; the
//! bytes stay in `columns.psf` until the segment is rewritten.

use std::collections::BTreeSet;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use log::debug;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::{QuarryError, Result};
use crate::segment::metadata::{SegmentMetadata, SegmentVersion};

pub const PACKED_FILE: &str = "columns.psf";
pub const INDEX_MAP_FILE: &str = "index_map.json";

/// Kind of artifact stored for a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexKind {
    Forward,
    Dictionary,
    Json,
}

impl IndexKind {
    pub fn file_extension(&self) -> &'static str {
        match self {
            IndexKind::Forward => ".fwd",
            IndexKind::Dictionary => ".dict",
            IndexKind::Json => ".json.idx",
        }
    }
}

/// Folds a finished standalone index file into a segment's packed store.
pub trait SegmentFormatPacker {
    /// Append `index_file` to the packed store under `(column, kind)` and
    /// remove the standalone file.
    fn pack(&self, column: &str, index_file: &Path, kind: IndexKind) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct IndexEntry {
    column: String,
    kind: IndexKind,
    offset: u64,
    size: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct IndexMap {
    entries: Vec<IndexEntry>,
}

impl IndexMap {
    fn find(&self, column: &str, kind: IndexKind) -> Option<&IndexEntry> {
        self.entries
            .iter()
            .find(|e| e.column == column && e.kind == kind)
    }
}

/// A segment on local disk.
///
/// Callers must ensure a single writer per segment; the internal lock only
/// keeps the in-memory index map consistent with `index_map.json`.
#[derive(Debug)]
pub struct SegmentDirectory {
    dir: PathBuf,
    metadata: SegmentMetadata,
    index_map: RwLock<IndexMap>,
}

impl SegmentDirectory {
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        let metadata = SegmentMetadata::load(&dir)?;
        let map_path = dir.join(INDEX_MAP_FILE);
        let index_map = if map_path.exists() {
            serde_json::from_slice(&fs::read(&map_path)?)?
        } else {
            IndexMap::default()
        };
        Ok(Self {
            dir,
            metadata,
            index_map: RwLock::new(index_map),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn metadata(&self) -> &SegmentMetadata {
        &self.metadata
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn version(&self) -> SegmentVersion {
        self.metadata.version
    }

    /// Path of the standalone file for `(column, kind)`.
    pub fn index_file(&self, column: &str, kind: IndexKind) -> PathBuf {
        self.dir.join(format!("{column}{}", kind.file_extension()))
    }

    /// Columns that have an artifact of `kind`, standalone or packed.
    pub fn columns_with_index(&self, kind: IndexKind) -> Result<BTreeSet<String>> {
        let mut columns: BTreeSet<String> = self
            .index_map
            .read()
            .entries
            .iter()
            .filter(|e| e.kind == kind)
            .map(|e| e.column.clone())
            .collect();

        let extension = kind.file_extension();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let file_name = entry.file_name();
            let Some(file_name) = file_name.to_str() else {
                continue;
            };
            if let Some(column) = file_name.strip_suffix(extension) {
                if !column.is_empty() {
                    columns.insert(column.to_string());
                }
            }
        }
        Ok(columns)
    }

    pub fn has_index(&self, column: &str, kind: IndexKind) -> bool {
        self.index_map.read().find(column, kind).is_some()
            || self.index_file(column, kind).is_file()
    }

    /// Remove the artifact for `(column, kind)` wherever it lives.
    pub fn remove_index(&self, column: &str, kind: IndexKind) -> Result<()> {
        let file = self.index_file(column, kind);
        if file.exists() {
            fs::remove_file(&file)?;
            debug!("Removed {} from segment {}", file.display(), self.name());
        }

        let mut map = self.index_map.write();
        let before = map.entries.len();
        map.entries.retain(|e| !(e.column == column && e.kind == kind));
        if map.entries.len() != before {
            self.persist_index_map(&map)?;
        }
        Ok(())
    }

    /// Read the full bytes of the artifact for `(column, kind)`.
    pub fn read_index(&self, column: &str, kind: IndexKind) -> Result<Vec<u8>> {
        if let Some(entry) = self.index_map.read().find(column, kind).cloned() {
            let mut file = File::open(self.dir.join(PACKED_FILE))?;
            file.seek(SeekFrom::Start(entry.offset))?;
            let mut buf = vec![0u8; entry.size as usize];
            file.read_exact(&mut buf)?;
            return Ok(buf);
        }

        let file = self.index_file(column, kind);
        if file.is_file() {
            return Ok(fs::read(&file)?);
        }
        Err(QuarryError::not_found(format!(
            "{kind:?} index for column {column} in segment {}",
            self.name()
        )))
    }

    fn persist_index_map(&self, map: &IndexMap) -> Result<()> {
        let tmp = self.dir.join(format!("{INDEX_MAP_FILE}.tmp"));
        fs::write(&tmp, serde_json::to_vec(map)?)?;
        fs::rename(&tmp, self.dir.join(INDEX_MAP_FILE))?;
        Ok(())
    }
}

impl SegmentFormatPacker for SegmentDirectory {
    fn pack(&self, column: &str, index_file: &Path, kind: IndexKind) -> Result<()> {
        let bytes = fs::read(index_file)?;

        let mut packed = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.dir.join(PACKED_FILE))?;
        let offset = packed.seek(SeekFrom::End(0))?;
        packed.write_all(&bytes)?;
        packed.sync_all()?;

        {
            let mut map = self.index_map.write();
            map.entries.retain(|e| !(e.column == column && e.kind == kind));
            map.entries.push(IndexEntry {
                column: column.to_string(),
                kind,
                offset,
                size: bytes.len() as u64,
            });
            self.persist_index_map(&map)?;
        }

        fs::remove_file(index_file)?;
        debug!(
            "Packed {kind:?} index for column {column} into segment {} at offset {offset}",
            self.name()
        );
        Ok(())
    }
}
