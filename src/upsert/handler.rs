//! Partial-upsert merging of a newly consumed record with the persisted one.

use std::collections::HashMap;
use std::sync::Arc;

use ahash::AHashMap;
use log::debug;

use crate::cluster::readiness::SegmentReadinessGate;
use crate::config::{UpsertConfig, UpsertMode};
use crate::data::Record;
use crate::error::{QuarryError, Result};
use crate::schema::Schema;
use crate::upsert::merger::{PartialUpsertMerger, Strategy, merger_for};

/// Merges records of a partial-upsert table column by column.
///
/// Every physical column except the primary key and the comparison column has
/// a merger: its configured strategy, or the default strategy. The table is
/// fixed at construction, so one handler can be shared across threads.
#[derive(Debug)]
pub struct PartialUpsertHandler {
    column_mergers: AHashMap<String, Arc<dyn PartialUpsertMerger>>,
    column_strategies: AHashMap<String, Strategy>,
    comparison_column: String,
    readiness: Option<Arc<SegmentReadinessGate>>,
}

impl PartialUpsertHandler {
    pub fn new(
        schema: &Schema,
        partial_upsert_strategies: &HashMap<String, Strategy>,
        default_strategy: Strategy,
        comparison_column: impl Into<String>,
        readiness: Option<Arc<SegmentReadinessGate>>,
    ) -> Result<Self> {
        let comparison_column = comparison_column.into();

        let mut column_strategies = AHashMap::new();
        for (column, strategy) in partial_upsert_strategies {
            validate_strategy(schema, column, *strategy, &comparison_column)?;
            column_strategies.insert(column.clone(), *strategy);
        }
        for column in schema.physical_column_names() {
            if !schema.is_primary_key(column)
                && column != comparison_column
                && !column_strategies.contains_key(column)
            {
                column_strategies.insert(column.to_string(), default_strategy);
            }
        }

        let column_mergers = column_strategies
            .iter()
            .map(|(column, strategy)| (column.clone(), merger_for(*strategy)))
            .collect();

        debug!(
            "Partial upsert handler for schema: {} merges {} columns, \
             comparison column: {comparison_column}",
            schema.name,
            column_strategies.len()
        );
        Ok(Self {
            column_mergers,
            column_strategies,
            comparison_column,
            readiness,
        })
    }

    /// Build from the table upsert config. The comparison column falls back to
    /// the schema time column.
    pub fn from_config(
        schema: &Schema,
        upsert: &UpsertConfig,
        readiness: Option<Arc<SegmentReadinessGate>>,
    ) -> Result<Self> {
        if upsert.mode != UpsertMode::Partial {
            return Err(QuarryError::invalid_config(format!(
                "partial upsert handler requires upsert mode PARTIAL, got {:?}",
                upsert.mode
            )));
        }
        let comparison_column = upsert
            .comparison_column
            .as_deref()
            .or_else(|| schema.time_column())
            .ok_or_else(|| {
                QuarryError::invalid_config(format!(
                    "schema {} has no time column and no comparison column is configured",
                    schema.name
                ))
            })?;
        Self::new(
            schema,
            &upsert.partial_upsert_strategies,
            upsert.default_partial_upsert_strategy,
            comparison_column,
            readiness,
        )
    }

    pub fn comparison_column(&self) -> &str {
        &self.comparison_column
    }

    /// Strategy applied to `column`, or `None` for unmerged columns.
    pub fn strategy_for(&self, column: &str) -> Option<Strategy> {
        self.column_strategies.get(column).copied()
    }

    /// Whether every segment this server should serve is loaded. Always true
    /// without a readiness gate.
    pub fn is_all_segments_loaded(&self) -> bool {
        self.readiness.as_ref().is_none_or(|gate| gate.is_ready())
    }

    /// Merge `new_record` onto `previous` and return the merged record.
    ///
    /// For merged columns: a null previous value leaves the new value as is, a
    /// null new value takes the previous one, otherwise the merger decides.
    /// Any other column of `new_record` is pinned to the previous non-null value.
    pub fn merge(&self, previous: &Record, mut new_record: Record) -> Record {
        for (column, merger) in &self.column_mergers {
            if previous.is_null_value(column) {
                continue;
            }
            let Some(previous_value) = previous.get_value(column) else {
                continue;
            };
            if new_record.is_null_value(column) {
                new_record.put_value(column.as_str(), previous_value.clone());
                new_record.remove_null_value_field(column);
            } else if let Some(current) = new_record.get_value(column) {
                let merged = merger.merge(previous_value, current);
                new_record.put_value(column.as_str(), merged);
            }
        }

        self.preserve_unmerged_columns(previous, &mut new_record);
        new_record
    }

    fn preserve_unmerged_columns(&self, previous: &Record, new_record: &mut Record) {
        let unmerged: Vec<String> = new_record
            .fields
            .keys()
            .filter(|column| !self.column_mergers.contains_key(column.as_str()))
            .cloned()
            .collect();
        for column in unmerged {
            if previous.is_null_value(&column) {
                continue;
            }
            if let Some(previous_value) = previous.get_value(&column) {
                new_record.put_value(column.as_str(), previous_value.clone());
                new_record.remove_null_value_field(&column);
            }
        }
    }
}

fn validate_strategy(
    schema: &Schema,
    column: &str,
    strategy: Strategy,
    comparison_column: &str,
) -> Result<()> {
    let field = schema.field_spec(column).ok_or_else(|| {
        QuarryError::invalid_config(format!(
            "partial upsert strategy {strategy} set on column {column} missing from schema {}",
            schema.name
        ))
    })?;
    if field.virtual_column {
        return Err(QuarryError::invalid_config(format!(
            "partial upsert strategy {strategy} set on virtual column {column}"
        )));
    }
    if schema.is_primary_key(column) {
        return Err(QuarryError::invalid_config(format!(
            "partial upsert strategy {strategy} set on primary key column {column}"
        )));
    }
    if column == comparison_column {
        return Err(QuarryError::invalid_config(format!(
            "partial upsert strategy {strategy} set on comparison column {column}"
        )));
    }
    if strategy.requires_multi_value() && field.single_value {
        return Err(QuarryError::invalid_config(format!(
            "{strategy} requires a multi-value column, {column} is single-value"
        )));
    }
    if strategy.requires_numeric() && !(field.single_value && field.data_type.is_numeric()) {
        return Err(QuarryError::invalid_config(format!(
            "{strategy} requires a numeric single-value column, {column} is {:?}",
            field.data_type
        )));
    }
    Ok(())
}
