//! Cluster metadata records as published by the controller.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::QuarryError;

/// State of a segment replica on one server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SegmentState {
    Online,
    Offline,
    Consuming,
    Error,
    Dropped,
    /// Any state this build does not know; never counts as loaded.
    #[serde(other)]
    Unknown,
}

impl SegmentState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SegmentState::Online => "ONLINE",
            SegmentState::Offline => "OFFLINE",
            SegmentState::Consuming => "CONSUMING",
            SegmentState::Error => "ERROR",
            SegmentState::Dropped => "DROPPED",
            SegmentState::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for SegmentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SegmentState {
    type Err = QuarryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ONLINE" => Ok(SegmentState::Online),
            "OFFLINE" => Ok(SegmentState::Offline),
            "CONSUMING" => Ok(SegmentState::Consuming),
            "ERROR" => Ok(SegmentState::Error),
            "DROPPED" => Ok(SegmentState::Dropped),
            other => Err(QuarryError::invalid_argument(format!(
                "unknown segment state: {other}"
            ))),
        }
    }
}

/// Desired placement of every segment of a table: segment -> instance -> state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IdealState {
    pub table_name_with_type: String,
    pub segment_assignment: BTreeMap<String, HashMap<String, SegmentState>>,
}

impl IdealState {
    pub fn new(table_name_with_type: impl Into<String>) -> Self {
        Self {
            table_name_with_type: table_name_with_type.into(),
            segment_assignment: BTreeMap::new(),
        }
    }

    pub fn with_assignment(
        mut self,
        segment: impl Into<String>,
        instance: impl Into<String>,
        state: SegmentState,
    ) -> Self {
        self.segment_assignment
            .entry(segment.into())
            .or_default()
            .insert(instance.into(), state);
        self
    }

    /// Expected state of `segment` on `instance`, if assigned there.
    pub fn instance_state(&self, segment: &str, instance: &str) -> Option<SegmentState> {
        self.segment_assignment
            .get(segment)
            .and_then(|instances| instances.get(instance))
            .copied()
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.segment_assignment.keys().map(String::as_str)
    }
}

/// A server currently connected to the cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveInstance {
    pub instance_name: String,
    /// Identifies the connection; current states are published per session.
    pub session_id: String,
}

impl LiveInstance {
    pub fn new(instance_name: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self {
            instance_name: instance_name.into(),
            session_id: session_id.into(),
        }
    }
}

/// Actual state of the segments of one table on one server session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CurrentState {
    pub partition_states: HashMap<String, SegmentState>,
}

impl CurrentState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state(mut self, segment: impl Into<String>, state: SegmentState) -> Self {
        self.partition_states.insert(segment.into(), state);
        self
    }

    pub fn state(&self, segment: &str) -> Option<SegmentState> {
        self.partition_states.get(segment).copied()
    }
}
