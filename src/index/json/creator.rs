//! JSON index creator.
//!
//! Each added value is parsed and flattened into path keys:
//!
//! - `$.a.b` marks that the path exists with a scalar value
//! - `$.a.b\0value` records the scalar value at that path
//!
//! Arrays contribute both `[*]` and positional `[i]` path segments. Flattened
//! keys are spilled to a scratch directory next to the index while rows are
//! added, then grouped into sorted posting lists when the creator is sealed.
//! The scratch directory is removed when the creator is dropped, sealed or not.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use serde_json::Value;
use tempfile::TempDir;

use crate::error::{QuarryError, Result};
use crate::segment::directory::IndexKind;
use crate::util::structured::StructWriter;

pub(crate) const JSON_INDEX_MAGIC: u32 = 0x4E53_4A51; // "QJSN"
pub(crate) const JSON_INDEX_VERSION: u32 = 1;

/// Separates a flattened path from its value inside a posting key.
pub const KEY_VALUE_SEPARATOR: char = '\0';

pub const ROOT_PATH: &str = "$";

/// Prefix of the scratch directories created by [`JsonIndexCreator`].
pub fn spill_dir_prefix(column: &str) -> String {
    format!("{column}.json.spill.")
}

pub struct JsonIndexCreator {
    index_file: PathBuf,
    // Declared before `spill_dir` so the file is closed before the directory goes.
    spill: BufWriter<File>,
    spill_dir: TempDir,
    next_doc_id: u32,
    keys: Vec<String>,
}

impl std::fmt::Debug for JsonIndexCreator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonIndexCreator")
            .field("index_file", &self.index_file)
            .field("spill_dir", &self.spill_dir.path())
            .field("next_doc_id", &self.next_doc_id)
            .finish()
    }
}

impl JsonIndexCreator {
    /// Start a new JSON index for `column` inside `index_dir`.
    pub fn new(index_dir: &Path, column: &str) -> Result<Self> {
        let index_file = index_dir.join(format!("{column}{}", IndexKind::Json.file_extension()));
        let spill_dir = tempfile::Builder::new()
            .prefix(&spill_dir_prefix(column))
            .tempdir_in(index_dir)?;
        let spill = BufWriter::new(File::create(spill_dir.path().join("postings.spill"))?);
        Ok(Self {
            index_file,
            spill,
            spill_dir,
            next_doc_id: 0,
            keys: Vec::new(),
        })
    }

    /// Index the next row. Rows must be added in doc id order starting at 0.
    pub fn add(&mut self, json: &str) -> Result<()> {
        let value: Value = serde_json::from_str(json).map_err(|e| {
            QuarryError::index(format!("invalid JSON at doc {}: {e}", self.next_doc_id))
        })?;

        self.keys.clear();
        let mut path = String::from(ROOT_PATH);
        flatten(&value, &mut path, &mut self.keys);
        self.keys.sort_unstable();
        self.keys.dedup();

        for key in &self.keys {
            self.spill.write_u32::<LittleEndian>(self.next_doc_id)?;
            self.spill.write_u32::<LittleEndian>(key.len() as u32)?;
            self.spill.write_all(key.as_bytes())?;
        }
        self.next_doc_id += 1;
        Ok(())
    }

    pub fn num_docs(&self) -> u32 {
        self.next_doc_id
    }

    /// Finish the index file. Consumes the creator, so no rows can follow.
    pub fn seal(mut self) -> Result<PathBuf> {
        self.spill.flush()?;
        let postings = self.read_spill()?;

        let file = File::create(&self.index_file)?;
        let mut writer = StructWriter::new(BufWriter::new(file));
        writer.write_u32(JSON_INDEX_MAGIC)?;
        writer.write_u32(JSON_INDEX_VERSION)?;
        writer.write_u32(self.next_doc_id)?;
        writer.write_u32(postings.len() as u32)?;
        for (key, doc_ids) in &postings {
            writer.write_string(key)?;
            writer.write_u32(doc_ids.len() as u32)?;
            for doc_id in doc_ids {
                writer.write_u32(*doc_id)?;
            }
        }
        let out = writer.close()?;
        out.into_inner()
            .map_err(|e| QuarryError::Io(e.into_error()))?
            .sync_all()?;

        Ok(self.index_file)
    }

    fn read_spill(&self) -> Result<BTreeMap<String, Vec<u32>>> {
        let mut reader = BufReader::new(File::open(self.spill_dir.path().join("postings.spill"))?);
        let mut postings: BTreeMap<String, Vec<u32>> = BTreeMap::new();
        loop {
            let doc_id = match reader.read_u32::<LittleEndian>() {
                Ok(doc_id) => doc_id,
                Err(e) if e.kind() == ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(e.into()),
            };
            let len = reader.read_u32::<LittleEndian>()? as usize;
            let mut key = vec![0u8; len];
            reader.read_exact(&mut key)?;
            let key = String::from_utf8(key)
                .map_err(|e| QuarryError::internal(format!("corrupt spill key: {e}")))?;
            postings.entry(key).or_default().push(doc_id);
        }
        Ok(postings)
    }
}

/// Collect the posting keys for `value` rooted at `path`.
fn flatten(value: &Value, path: &mut String, keys: &mut Vec<String>) {
    match value {
        Value::Null => {}
        Value::Object(map) => {
            for (name, child) in map {
                let len = path.len();
                path.push('.');
                path.push_str(name);
                flatten(child, path, keys);
                path.truncate(len);
            }
        }
        Value::Array(items) => {
            for (i, child) in items.iter().enumerate() {
                let len = path.len();
                path.push_str("[*]");
                flatten(child, path, keys);
                path.truncate(len);

                path.push_str(&format!("[{i}]"));
                flatten(child, path, keys);
                path.truncate(len);
            }
        }
        Value::String(s) => push_leaf(path, s, keys),
        Value::Bool(b) => push_leaf(path, &b.to_string(), keys),
        Value::Number(n) => push_leaf(path, &n.to_string(), keys),
    }
}

fn push_leaf(path: &str, value: &str, keys: &mut Vec<String>) {
    keys.push(path.to_string());
    keys.push(posting_key(path, value));
}

/// Key under which `(path, value)` pairs are stored.
pub fn posting_key(path: &str, value: &str) -> String {
    format!("{path}{KEY_VALUE_SEPARATOR}{value}")
}
