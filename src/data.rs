use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// The value type for a single column of a row.
///
/// Multi-value columns carry their values as [`DataValue::Array`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DataValue {
    Null,
    Bool(bool),
    Int64(i64),
    Float64(f64),

    /// Plain string or serialized JSON document.
    String(String),

    Bytes(Vec<u8>),

    /// Date and time in UTC.
    DateTime(chrono::DateTime<chrono::Utc>),

    /// Values of a multi-value column.
    Array(Vec<DataValue>),
}

impl DataValue {
    /// Returns the string value if this is a String variant.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            DataValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the integer value if this is an Int64 variant.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            DataValue::Int64(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns the value widened to `f64` for any numeric variant.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            DataValue::Int64(i) => Some(*i as f64),
            DataValue::Float64(f) => Some(*f),
            _ => None,
        }
    }

    /// Returns the boolean value if this is a Bool variant.
    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            DataValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the array elements if this is an Array variant.
    pub fn as_array(&self) -> Option<&[DataValue]> {
        match self {
            DataValue::Array(values) => Some(values),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, DataValue::Null)
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, DataValue::Int64(_) | DataValue::Float64(_))
    }

    /// Views the value as a list of elements; scalars become a single element.
    pub fn into_elements(self) -> Vec<DataValue> {
        match self {
            DataValue::Array(values) => values,
            DataValue::Null => Vec::new(),
            other => vec![other],
        }
    }
}

// --- Conversions ---

impl From<String> for DataValue {
    fn from(v: String) -> Self {
        DataValue::String(v)
    }
}

impl From<&str> for DataValue {
    fn from(v: &str) -> Self {
        DataValue::String(v.to_string())
    }
}

impl From<i64> for DataValue {
    fn from(v: i64) -> Self {
        DataValue::Int64(v)
    }
}

impl From<i32> for DataValue {
    fn from(v: i32) -> Self {
        DataValue::Int64(v as i64)
    }
}

impl From<f64> for DataValue {
    fn from(v: f64) -> Self {
        DataValue::Float64(v)
    }
}

impl From<bool> for DataValue {
    fn from(v: bool) -> Self {
        DataValue::Bool(v)
    }
}

impl From<chrono::DateTime<chrono::Utc>> for DataValue {
    fn from(dt: chrono::DateTime<chrono::Utc>) -> Self {
        DataValue::DateTime(dt)
    }
}

impl<T: Into<DataValue>> From<Vec<T>> for DataValue {
    fn from(values: Vec<T>) -> Self {
        DataValue::Array(values.into_iter().map(Into::into).collect())
    }
}

/// A single ingested row.
///
/// Besides the column values, a record tracks which columns were absent in
/// the source event. Such columns may still hold a placeholder value, but
/// [`Record::is_null_value`] reports them as null.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Column values.
    pub fields: HashMap<String, DataValue>,

    /// Columns flagged as null.
    #[serde(default)]
    pub null_fields: HashSet<String>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a column value (builder style).
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<DataValue>) -> Self {
        self.put_value(name, value);
        self
    }

    /// Add a column flagged as null (builder style).
    pub fn with_null(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.fields.insert(name.clone(), DataValue::Null);
        self.null_fields.insert(name);
        self
    }

    pub fn get_value(&self, name: &str) -> Option<&DataValue> {
        self.fields.get(name)
    }

    /// Set a column value. The null flag is left as is.
    pub fn put_value(&mut self, name: impl Into<String>, value: impl Into<DataValue>) {
        self.fields.insert(name.into(), value.into());
    }

    /// A column is null when it is flagged, or when the record has no value for it.
    pub fn is_null_value(&self, name: &str) -> bool {
        self.null_fields.contains(name) || !self.fields.contains_key(name)
    }

    pub fn add_null_value_field(&mut self, name: impl Into<String>) {
        self.null_fields.insert(name.into());
    }

    pub fn remove_null_value_field(&mut self, name: &str) {
        self.null_fields.remove(name);
    }

    /// Names of every column that carries a value, null-flagged or not.
    pub fn field_names(&self) -> Vec<&str> {
        self.fields.keys().map(|s| s.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
