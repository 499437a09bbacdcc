//! Forward index and dictionary readers, and the per-row string source built on them.

use crate::error::{QuarryError, Result};
use crate::segment::directory::{IndexKind, SegmentDirectory};
use crate::segment::metadata::ColumnMetadata;
use crate::util::structured::{StructReader, StructWriter};

const FORWARD_MAGIC: u32 = 0x4457_4651; // "QFWD"
const DICTIONARY_MAGIC: u32 = 0x4349_4451; // "QDIC"

const ENCODING_DICT_ID: u32 = 0;
const ENCODING_RAW: u32 = 1;

/// Row-ordered column values as stored on disk.
#[derive(Debug, Clone, PartialEq)]
pub enum ForwardIndex {
    /// One dictionary id per row.
    DictIds(Vec<u32>),
    /// One raw string per row.
    Raw(Vec<String>),
}

impl ForwardIndex {
    pub fn num_docs(&self) -> usize {
        match self {
            ForwardIndex::DictIds(ids) => ids.len(),
            ForwardIndex::Raw(values) => values.len(),
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut writer = StructWriter::new(Vec::new());
        writer.write_u32(FORWARD_MAGIC)?;
        match self {
            ForwardIndex::DictIds(ids) => {
                writer.write_u32(ENCODING_DICT_ID)?;
                writer.write_u32(ids.len() as u32)?;
                for id in ids {
                    writer.write_u32(*id)?;
                }
            }
            ForwardIndex::Raw(values) => {
                writer.write_u32(ENCODING_RAW)?;
                writer.write_u32(values.len() as u32)?;
                for value in values {
                    writer.write_string(value)?;
                }
            }
        }
        writer.close()
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut reader = StructReader::verified(bytes)?;
        if reader.read_u32()? != FORWARD_MAGIC {
            return Err(QuarryError::index("invalid forward index format"));
        }
        let encoding = reader.read_u32()?;
        let num_docs = reader.read_u32()? as usize;
        match encoding {
            ENCODING_DICT_ID => {
                let mut ids = Vec::with_capacity(num_docs);
                for _ in 0..num_docs {
                    ids.push(reader.read_u32()?);
                }
                Ok(ForwardIndex::DictIds(ids))
            }
            ENCODING_RAW => {
                let mut values = Vec::with_capacity(num_docs);
                for _ in 0..num_docs {
                    values.push(reader.read_string()?);
                }
                Ok(ForwardIndex::Raw(values))
            }
            other => Err(QuarryError::index(format!(
                "unknown forward index encoding {other}"
            ))),
        }
    }

    pub fn open(segment: &SegmentDirectory, column: &str) -> Result<Self> {
        Self::from_bytes(&segment.read_index(column, IndexKind::Forward)?)
    }
}

/// Sorted distinct values of a dictionary-encoded column.
#[derive(Debug, Clone, PartialEq)]
pub struct Dictionary {
    values: Vec<String>,
}

impl Dictionary {
    pub fn new(values: Vec<String>) -> Self {
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn index_of(&self, value: &str) -> Option<u32> {
        self.values
            .binary_search_by(|v| v.as_str().cmp(value))
            .ok()
            .map(|i| i as u32)
    }

    pub fn string_value(&self, dict_id: u32) -> Result<&str> {
        self.values
            .get(dict_id as usize)
            .map(|s| s.as_str())
            .ok_or_else(|| {
                QuarryError::index(format!(
                    "dictionary id {dict_id} out of range (cardinality {})",
                    self.values.len()
                ))
            })
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut writer = StructWriter::new(Vec::new());
        writer.write_u32(DICTIONARY_MAGIC)?;
        writer.write_u32(self.values.len() as u32)?;
        for value in &self.values {
            writer.write_string(value)?;
        }
        writer.close()
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut reader = StructReader::verified(bytes)?;
        if reader.read_u32()? != DICTIONARY_MAGIC {
            return Err(QuarryError::index("invalid dictionary format"));
        }
        let len = reader.read_u32()? as usize;
        let mut values = Vec::with_capacity(len);
        for _ in 0..len {
            values.push(reader.read_string()?);
        }
        Ok(Self { values })
    }

    pub fn open(segment: &SegmentDirectory, column: &str) -> Result<Self> {
        Self::from_bytes(&segment.read_index(column, IndexKind::Dictionary)?)
    }
}

/// Produces the string value of a column for any row id.
///
/// Dictionary-encoded columns decode each row's id through the dictionary;
/// raw columns hold the string directly.
#[derive(Debug)]
pub enum ColumnValueSource {
    Dictionary {
        dict_ids: Vec<u32>,
        dictionary: Dictionary,
    },
    Raw {
        values: Vec<String>,
    },
}

impl ColumnValueSource {
    /// Open the readers backing `column`, dispatching on its dictionary flag.
    pub fn open(segment: &SegmentDirectory, column: &ColumnMetadata) -> Result<Self> {
        let forward = ForwardIndex::open(segment, &column.name)?;
        if forward.num_docs() != column.total_docs as usize {
            return Err(QuarryError::index(format!(
                "forward index of column {} has {} rows, metadata says {}",
                column.name,
                forward.num_docs(),
                column.total_docs
            )));
        }

        match (column.has_dictionary, forward) {
            (true, ForwardIndex::DictIds(dict_ids)) => Ok(ColumnValueSource::Dictionary {
                dict_ids,
                dictionary: Dictionary::open(segment, &column.name)?,
            }),
            (false, ForwardIndex::Raw(values)) => Ok(ColumnValueSource::Raw { values }),
            (has_dictionary, _) => Err(QuarryError::index(format!(
                "forward index encoding of column {} does not match \
                 has_dictionary={has_dictionary}",
                column.name
            ))),
        }
    }

    pub fn num_docs(&self) -> u32 {
        match self {
            ColumnValueSource::Dictionary { dict_ids, .. } => dict_ids.len() as u32,
            ColumnValueSource::Raw { values } => values.len() as u32,
        }
    }

    pub fn string_value(&self, doc_id: u32) -> Result<&str> {
        let out_of_range =
            || QuarryError::invalid_argument(format!("row id {doc_id} out of range"));
        match self {
            ColumnValueSource::Dictionary {
                dict_ids,
                dictionary,
            } => {
                let dict_id = dict_ids.get(doc_id as usize).ok_or_else(out_of_range)?;
                dictionary.string_value(*dict_id)
            }
            ColumnValueSource::Raw { values } => values
                .get(doc_id as usize)
                .map(|s| s.as_str())
                .ok_or_else(out_of_range),
        }
    }
}
