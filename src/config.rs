use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::Result;
use crate::upsert::merger::Strategy;

/// Table-level configuration relevant to segment loading and upserts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TableConfig {
    /// Table name including its type suffix, e.g. `orders_REALTIME`.
    pub table_name: String,
    #[serde(default)]
    pub indexing: IndexingConfig,
    #[serde(default)]
    pub upsert: Option<UpsertConfig>,
}

impl TableConfig {
    pub fn new(table_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            ..Default::default()
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn with_json_index_columns(mut self, columns: &[&str]) -> Self {
        self.indexing.json_index_columns = columns.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn with_upsert(mut self, upsert: UpsertConfig) -> Self {
        self.upsert = Some(upsert);
        self
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndexingConfig {
    /// Columns that should carry a JSON index.
    #[serde(default)]
    pub json_index_columns: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UpsertMode {
    #[default]
    None,
    Full,
    Partial,
}

/// Upsert settings for a real-time table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpsertConfig {
    pub mode: UpsertMode,
    /// Column deciding which of two records for a key is newer.
    /// Falls back to the schema time column when unset.
    #[serde(default)]
    pub comparison_column: Option<String>,
    /// Explicit per-column strategies.
    #[serde(default)]
    pub partial_upsert_strategies: HashMap<String, Strategy>,
    /// Strategy for every mergeable column without an explicit entry.
    #[serde(default)]
    pub default_partial_upsert_strategy: Strategy,
}

impl UpsertConfig {
    pub fn partial() -> Self {
        Self {
            mode: UpsertMode::Partial,
            ..Default::default()
        }
    }

    pub fn with_strategy(mut self, column: impl Into<String>, strategy: Strategy) -> Self {
        self.partial_upsert_strategies.insert(column.into(), strategy);
        self
    }

    pub fn with_default_strategy(mut self, strategy: Strategy) -> Self {
        self.default_partial_upsert_strategy = strategy;
        self
    }

    pub fn with_comparison_column(mut self, column: impl Into<String>) -> Self {
        self.comparison_column = Some(column.into());
        self
    }
}
