//! One-way latch answering "has this server loaded every segment assigned to it?".

use std::sync::Arc;

use log::{error, info, warn};
use parking_lot::Mutex;

use crate::cluster::accessor::ClusterStateAccessor;
use crate::cluster::state::SegmentState;

/// Checks the cluster until every segment this instance should serve is
/// ONLINE, then answers `true` forever without touching the cluster again.
///
/// Consuming segments must wait for this before merging new records, so that
/// previously persisted values for every key are visible.
#[derive(Debug)]
pub struct SegmentReadinessGate {
    accessor: Arc<dyn ClusterStateAccessor>,
    table_name_with_type: String,
    instance_name: String,
    loaded: Mutex<bool>,
}

impl SegmentReadinessGate {
    pub fn new(
        accessor: Arc<dyn ClusterStateAccessor>,
        table_name_with_type: impl Into<String>,
        instance_name: impl Into<String>,
    ) -> Self {
        Self {
            accessor,
            table_name_with_type: table_name_with_type.into(),
            instance_name: instance_name.into(),
            loaded: Mutex::new(false),
        }
    }

    pub fn table_name_with_type(&self) -> &str {
        &self.table_name_with_type
    }

    pub fn instance_name(&self) -> &str {
        &self.instance_name
    }

    pub fn is_ready(&self) -> bool {
        let mut loaded = self.loaded.lock();
        if *loaded {
            return true;
        }
        if self.all_segments_online() {
            info!("All segments loaded for table: {}", self.table_name_with_type);
            *loaded = true;
        }
        *loaded
    }

    fn all_segments_online(&self) -> bool {
        let table = self.table_name_with_type.as_str();
        let instance = self.instance_name.as_str();

        let ideal_state = match self.accessor.ideal_state(table) {
            Ok(Some(ideal_state)) => ideal_state,
            Ok(None) => {
                warn!("Failed to find ideal state for table: {table}");
                return false;
            }
            Err(e) => {
                warn!("Failed to read ideal state for table: {table}: {e}");
                return false;
            }
        };

        let session_id = match self.accessor.live_instance(instance) {
            Ok(Some(live_instance)) => live_instance.session_id,
            Ok(None) => {
                warn!("Failed to find live instance for instance: {instance}");
                return false;
            }
            Err(e) => {
                warn!("Failed to read live instance for instance: {instance}: {e}");
                return false;
            }
        };

        let current_state = match self.accessor.current_state(instance, &session_id, table) {
            Ok(Some(current_state)) => current_state,
            Ok(None) => {
                warn!(
                    "Failed to find current state for instance: {instance}, \
                     sessionId: {session_id}, table: {table}"
                );
                return false;
            }
            Err(e) => {
                warn!(
                    "Failed to read current state for instance: {instance}, \
                     sessionId: {session_id}, table: {table}: {e}"
                );
                return false;
            }
        };

        // Only segments this instance is expected to serve ONLINE are tracked.
        for segment in ideal_state.segments() {
            if ideal_state.instance_state(segment, instance) != Some(SegmentState::Online) {
                continue;
            }
            match current_state.state(segment) {
                Some(SegmentState::Online) => {}
                Some(SegmentState::Error) => {
                    error!("Found ERROR segment: {segment}, table: {table}, expected: ONLINE");
                    return false;
                }
                actual => {
                    info!(
                        "Found unloaded segment: {segment}, table: {table}, \
                         expected: ONLINE, actual: {}",
                        actual.map_or("NONE", |s| s.as_str())
                    );
                    return false;
                }
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::memory::InMemoryClusterState;
    use crate::cluster::state::{CurrentState, IdealState, LiveInstance};

    const TABLE: &str = "orders_REALTIME";
    const INSTANCE: &str = "server_1";

    fn cluster() -> Arc<InMemoryClusterState> {
        let cluster = Arc::new(InMemoryClusterState::new());
        cluster.set_ideal_state(
            IdealState::new(TABLE)
                .with_assignment("seg_0", INSTANCE, SegmentState::Online)
                .with_assignment("seg_1", INSTANCE, SegmentState::Consuming)
                .with_assignment("seg_2", "server_2", SegmentState::Online),
        );
        cluster.set_live_instance(LiveInstance::new(INSTANCE, "session"));
        cluster
    }

    #[test]
    fn test_missing_metadata_is_not_ready() {
        let empty = Arc::new(InMemoryClusterState::new());
        let gate = SegmentReadinessGate::new(empty, TABLE, INSTANCE);
        assert!(!gate.is_ready());

        // Ideal state and live instance but no current state yet.
        let gate = SegmentReadinessGate::new(cluster(), TABLE, INSTANCE);
        assert!(!gate.is_ready());
    }

    #[test]
    fn test_only_online_assignments_of_this_instance_count() {
        let cluster = cluster();
        // seg_1 is expected CONSUMING and seg_2 belongs to another server.
        cluster.set_current_state(
            INSTANCE,
            "session",
            TABLE,
            CurrentState::new().with_state("seg_0", SegmentState::Online),
        );
        let gate = SegmentReadinessGate::new(cluster, TABLE, INSTANCE);
        assert!(gate.is_ready());
    }

    #[test]
    fn test_latches() {
        let cluster = cluster();
        cluster.update_segment_state(INSTANCE, "session", TABLE, "seg_0", SegmentState::Offline);
        let gate = SegmentReadinessGate::new(cluster.clone(), TABLE, INSTANCE);
        assert!(!gate.is_ready());

        cluster.update_segment_state(INSTANCE, "session", TABLE, "seg_0", SegmentState::Online);
        assert!(gate.is_ready());

        cluster.update_segment_state(INSTANCE, "session", TABLE, "seg_0", SegmentState::Error);
        assert!(gate.is_ready());
    }
}
