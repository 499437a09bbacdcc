//! Per-column merge strategies for partial upserts.
//!
//! A merger only ever sees two non-null values: the value persisted for the
//! primary key so far and the value carried by the newly consumed record.
//! Null handling lives in [`super::handler::PartialUpsertHandler`].

use std::fmt::Debug;
use std::str::FromStr;
use std::sync::Arc;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::data::DataValue;
use crate::error::QuarryError;

/// Partial-upsert strategy configured for a column.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Strategy {
    /// Keep the new value.
    #[default]
    Overwrite,
    /// Keep the previous value, pinning the column to its first value.
    Ignore,
    /// Add the new value to the previous one.
    Increment,
    /// Concatenate multi-value columns.
    Append,
    /// Concatenate multi-value columns without duplicates.
    Union,
    /// Keep the larger numeric value.
    Max,
    /// Keep the smaller numeric value.
    Min,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Overwrite => "OVERWRITE",
            Strategy::Ignore => "IGNORE",
            Strategy::Increment => "INCREMENT",
            Strategy::Append => "APPEND",
            Strategy::Union => "UNION",
            Strategy::Max => "MAX",
            Strategy::Min => "MIN",
        }
    }

    /// Strategies that only make sense on multi-value columns.
    pub fn requires_multi_value(&self) -> bool {
        matches!(self, Strategy::Append | Strategy::Union)
    }

    /// Strategies that only make sense on numeric single-value columns.
    pub fn requires_numeric(&self) -> bool {
        matches!(self, Strategy::Increment | Strategy::Max | Strategy::Min)
    }
}

impl FromStr for Strategy {
    type Err = QuarryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "OVERWRITE" => Ok(Strategy::Overwrite),
            "IGNORE" => Ok(Strategy::Ignore),
            "INCREMENT" => Ok(Strategy::Increment),
            "APPEND" => Ok(Strategy::Append),
            "UNION" => Ok(Strategy::Union),
            "MAX" => Ok(Strategy::Max),
            "MIN" => Ok(Strategy::Min),
            other => Err(QuarryError::merge_strategy(other)),
        }
    }
}

impl TryFrom<String> for Strategy {
    type Error = QuarryError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Strategy> for String {
    fn from(strategy: Strategy) -> Self {
        strategy.as_str().to_string()
    }
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Combines the previous and the new non-null value of one column.
pub trait PartialUpsertMerger: Send + Sync + Debug {
    fn merge(&self, previous: &DataValue, current: &DataValue) -> DataValue;
}

/// Returns the merger implementing `strategy`.
pub fn merger_for(strategy: Strategy) -> Arc<dyn PartialUpsertMerger> {
    match strategy {
        Strategy::Overwrite => Arc::new(OverwriteMerger),
        Strategy::Ignore => Arc::new(IgnoreMerger),
        Strategy::Increment => Arc::new(IncrementMerger),
        Strategy::Append => Arc::new(AppendMerger),
        Strategy::Union => Arc::new(UnionMerger),
        Strategy::Max => Arc::new(MaxMerger),
        Strategy::Min => Arc::new(MinMerger),
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct OverwriteMerger;

impl PartialUpsertMerger for OverwriteMerger {
    fn merge(&self, _previous: &DataValue, current: &DataValue) -> DataValue {
        current.clone()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct IgnoreMerger;

impl PartialUpsertMerger for IgnoreMerger {
    fn merge(&self, previous: &DataValue, _current: &DataValue) -> DataValue {
        previous.clone()
    }
}

/// Applies `int_op` when both sides are integers, `float_op` when either side is a float.
fn numeric_merge(
    previous: &DataValue,
    current: &DataValue,
    int_op: fn(i64, i64) -> i64,
    float_op: fn(f64, f64) -> f64,
) -> Option<DataValue> {
    match (previous, current) {
        (DataValue::Int64(a), DataValue::Int64(b)) => Some(DataValue::Int64(int_op(*a, *b))),
        _ => {
            let a = previous.as_f64()?;
            let b = current.as_f64()?;
            Some(DataValue::Float64(float_op(a, b)))
        }
    }
}

fn non_numeric(strategy: Strategy, previous: &DataValue, current: &DataValue) -> DataValue {
    warn!(
        "{strategy} merge needs numeric values, got {previous:?} and {current:?}; \
         keeping the new value"
    );
    current.clone()
}

#[derive(Debug, Clone, Copy, Default)]
pub struct IncrementMerger;

impl PartialUpsertMerger for IncrementMerger {
    fn merge(&self, previous: &DataValue, current: &DataValue) -> DataValue {
        numeric_merge(previous, current, i64::wrapping_add, |a, b| a + b)
            .unwrap_or_else(|| non_numeric(Strategy::Increment, previous, current))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MaxMerger;

impl PartialUpsertMerger for MaxMerger {
    fn merge(&self, previous: &DataValue, current: &DataValue) -> DataValue {
        numeric_merge(previous, current, i64::max, f64::max)
            .unwrap_or_else(|| non_numeric(Strategy::Max, previous, current))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MinMerger;

impl PartialUpsertMerger for MinMerger {
    fn merge(&self, previous: &DataValue, current: &DataValue) -> DataValue {
        numeric_merge(previous, current, i64::min, f64::min)
            .unwrap_or_else(|| non_numeric(Strategy::Min, previous, current))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AppendMerger;

impl PartialUpsertMerger for AppendMerger {
    fn merge(&self, previous: &DataValue, current: &DataValue) -> DataValue {
        let mut values = previous.clone().into_elements();
        values.extend(current.clone().into_elements());
        DataValue::Array(values)
    }
}

/// Union of both value lists; the first occurrence of each value keeps its position.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnionMerger;

impl PartialUpsertMerger for UnionMerger {
    fn merge(&self, previous: &DataValue, current: &DataValue) -> DataValue {
        let mut values: Vec<DataValue> = Vec::new();
        for value in previous
            .clone()
            .into_elements()
            .into_iter()
            .chain(current.clone().into_elements())
        {
            if !values.contains(&value) {
                values.push(value);
            }
        }
        DataValue::Array(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_strategy() {
        assert_eq!("overwrite".parse::<Strategy>().unwrap(), Strategy::Overwrite);
        assert_eq!(" UNION ".parse::<Strategy>().unwrap(), Strategy::Union);

        let err = "LATEST".parse::<Strategy>().unwrap_err();
        assert!(matches!(err, QuarryError::MergeStrategy(_)));
    }

    #[test]
    fn test_strategy_serde() {
        let json = serde_json::to_string(&Strategy::Increment).unwrap();
        assert_eq!(json, "\"INCREMENT\"");
        let back: Strategy = serde_json::from_str("\"ignore\"").unwrap();
        assert_eq!(back, Strategy::Ignore);
        assert!(serde_json::from_str::<Strategy>("\"SUM\"").is_err());
    }

    #[test]
    fn test_overwrite_and_ignore() {
        let prev = DataValue::from(5);
        let cur = DataValue::from(9);
        assert_eq!(merger_for(Strategy::Overwrite).merge(&prev, &cur), cur);
        assert_eq!(merger_for(Strategy::Ignore).merge(&prev, &cur), prev);
    }

    #[test]
    fn test_increment() {
        let merger = merger_for(Strategy::Increment);
        assert_eq!(
            merger.merge(&DataValue::from(3), &DataValue::from(4)),
            DataValue::Int64(7)
        );
        assert_eq!(
            merger.merge(&DataValue::from(1), &DataValue::from(0.5)),
            DataValue::Float64(1.5)
        );
        // Non-numeric input falls back to the new value.
        assert_eq!(
            merger.merge(&DataValue::from("a"), &DataValue::from("b")),
            DataValue::from("b")
        );
    }

    #[test]
    fn test_max_min() {
        let prev = DataValue::from(10);
        let cur = DataValue::from(7);
        assert_eq!(merger_for(Strategy::Max).merge(&prev, &cur), DataValue::Int64(10));
        assert_eq!(merger_for(Strategy::Min).merge(&prev, &cur), DataValue::Int64(7));
        assert_eq!(
            merger_for(Strategy::Max).merge(&DataValue::from(2.5), &cur),
            DataValue::Float64(7.0)
        );
    }

    #[test]
    fn test_append_and_union() {
        let prev = DataValue::from(vec!["a", "b"]);
        let cur = DataValue::from(vec!["b", "c"]);

        assert_eq!(
            merger_for(Strategy::Append).merge(&prev, &cur),
            DataValue::from(vec!["a", "b", "b", "c"])
        );
        assert_eq!(
            merger_for(Strategy::Union).merge(&prev, &cur),
            DataValue::from(vec!["a", "b", "c"])
        );
        // A scalar is appended as a single element.
        assert_eq!(
            merger_for(Strategy::Append).merge(&prev, &DataValue::from("z")),
            DataValue::from(vec!["a", "b", "z"])
        );
    }
}
