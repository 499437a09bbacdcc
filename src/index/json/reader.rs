//! Reader for sealed JSON indexes.

use std::collections::BTreeMap;

use crate::error::{QuarryError, Result};
use crate::index::json::creator::{JSON_INDEX_MAGIC, JSON_INDEX_VERSION, posting_key};
use crate::segment::directory::{IndexKind, SegmentDirectory};
use crate::util::structured::StructReader;

/// In-memory view of a sealed JSON index.
#[derive(Debug, Clone)]
pub struct JsonIndexReader {
    num_docs: u32,
    postings: BTreeMap<String, Vec<u32>>,
}

impl JsonIndexReader {
    /// Load the JSON index of `column`, standalone or packed.
    pub fn open(segment: &SegmentDirectory, column: &str) -> Result<Self> {
        Self::from_bytes(&segment.read_index(column, IndexKind::Json)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut reader = StructReader::verified(bytes)?;
        if reader.read_u32()? != JSON_INDEX_MAGIC {
            return Err(QuarryError::index("invalid JSON index format"));
        }
        let version = reader.read_u32()?;
        if version != JSON_INDEX_VERSION {
            return Err(QuarryError::index(format!(
                "unsupported JSON index version {version}"
            )));
        }

        let num_docs = reader.read_u32()?;
        let num_keys = reader.read_u32()?;
        let mut postings = BTreeMap::new();
        for _ in 0..num_keys {
            let key = reader.read_string()?;
            let len = reader.read_u32()? as usize;
            let mut doc_ids = Vec::with_capacity(len);
            for _ in 0..len {
                doc_ids.push(reader.read_u32()?);
            }
            postings.insert(key, doc_ids);
        }
        Ok(Self { num_docs, postings })
    }

    pub fn num_docs(&self) -> u32 {
        self.num_docs
    }

    pub fn num_keys(&self) -> usize {
        self.postings.len()
    }

    /// Docs holding `value` at `path`, e.g. `("$.user.name", "ann")`.
    pub fn matching_docs(&self, path: &str, value: &str) -> &[u32] {
        self.postings
            .get(&posting_key(path, value))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Docs holding any scalar at `path`.
    pub fn docs_with_path(&self, path: &str) -> &[u32] {
        self.postings.get(path).map(Vec::as_slice).unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::json::creator::JsonIndexCreator;
    use tempfile::TempDir;

    fn build(values: &[&str]) -> JsonIndexReader {
        let dir = TempDir::new().unwrap();
        let mut creator = JsonIndexCreator::new(dir.path(), "c").unwrap();
        for value in values {
            creator.add(value).unwrap();
        }
        let file = creator.seal().unwrap();
        JsonIndexReader::from_bytes(&std::fs::read(file).unwrap()).unwrap()
    }

    #[test]
    fn test_lookup() {
        let reader = build(&[
            r#"{"user": {"name": "ann"}, "tags": ["a", "b"]}"#,
            r#"{"user": {"name": "bob"}}"#,
            r#"{"user": {"name": "ann"}, "tags": ["b"]}"#,
            "null",
        ]);

        assert_eq!(reader.num_docs(), 4);
        assert_eq!(reader.matching_docs("$.user.name", "ann"), &[0, 2]);
        assert_eq!(reader.matching_docs("$.tags[*]", "b"), &[0, 2]);
        assert_eq!(reader.matching_docs("$.tags[0]", "b"), &[2]);
        assert_eq!(reader.docs_with_path("$.user.name"), &[0, 1, 2]);
        assert!(reader.matching_docs("$.user.name", "carl").is_empty());
    }

    #[test]
    fn test_rejects_foreign_bytes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("x");
        std::fs::write(&path, b"not an index").unwrap();
        assert!(JsonIndexReader::from_bytes(&std::fs::read(path).unwrap()).is_err());
    }
}
