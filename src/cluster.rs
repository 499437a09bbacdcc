//! Read-only view of cluster segment assignment and the readiness gate built on it.

pub mod accessor;
pub mod memory;
pub mod readiness;
pub mod state;

pub use accessor::ClusterStateAccessor;
pub use memory::InMemoryClusterState;
pub use readiness::SegmentReadinessGate;
pub use state::{CurrentState, IdealState, LiveInstance, SegmentState};
