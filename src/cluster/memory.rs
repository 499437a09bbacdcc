//! Cluster metadata kept in process memory.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::cluster::accessor::ClusterStateAccessor;
use crate::cluster::state::{CurrentState, IdealState, LiveInstance, SegmentState};
use crate::error::Result;

/// A [`ClusterStateAccessor`] whose records are set directly.
///
/// Used for single-process deployments and tests.
#[derive(Debug, Default)]
pub struct InMemoryClusterState {
    ideal_states: RwLock<HashMap<String, IdealState>>,
    live_instances: RwLock<HashMap<String, LiveInstance>>,
    // (instance, session, table)
    current_states: RwLock<HashMap<(String, String, String), CurrentState>>,
}

impl InMemoryClusterState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_ideal_state(&self, ideal_state: IdealState) {
        self.ideal_states
            .write()
            .insert(ideal_state.table_name_with_type.clone(), ideal_state);
    }

    pub fn set_live_instance(&self, live_instance: LiveInstance) {
        self.live_instances
            .write()
            .insert(live_instance.instance_name.clone(), live_instance);
    }

    pub fn remove_live_instance(&self, instance_name: &str) {
        self.live_instances.write().remove(instance_name);
    }

    pub fn set_current_state(
        &self,
        instance_name: &str,
        session_id: &str,
        table_name_with_type: &str,
        current_state: CurrentState,
    ) {
        self.current_states.write().insert(
            (
                instance_name.to_string(),
                session_id.to_string(),
                table_name_with_type.to_string(),
            ),
            current_state,
        );
    }

    /// Record a single segment transition in an existing or new current state.
    pub fn update_segment_state(
        &self,
        instance_name: &str,
        session_id: &str,
        table_name_with_type: &str,
        segment: &str,
        state: SegmentState,
    ) {
        self.current_states
            .write()
            .entry((
                instance_name.to_string(),
                session_id.to_string(),
                table_name_with_type.to_string(),
            ))
            .or_default()
            .partition_states
            .insert(segment.to_string(), state);
    }
}

impl ClusterStateAccessor for InMemoryClusterState {
    fn ideal_state(&self, table_name_with_type: &str) -> Result<Option<IdealState>> {
        Ok(self.ideal_states.read().get(table_name_with_type).cloned())
    }

    fn live_instance(&self, instance_name: &str) -> Result<Option<LiveInstance>> {
        Ok(self.live_instances.read().get(instance_name).cloned())
    }

    fn current_state(
        &self,
        instance_name: &str,
        session_id: &str,
        table_name_with_type: &str,
    ) -> Result<Option<CurrentState>> {
        let key = (
            instance_name.to_string(),
            session_id.to_string(),
            table_name_with_type.to_string(),
        );
        Ok(self.current_states.read().get(&key).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_current_state_is_per_session() {
        let cluster = InMemoryClusterState::new();
        cluster.update_segment_state(
            "server_1",
            "s-1",
            "t_REALTIME",
            "seg_0",
            SegmentState::Online,
        );

        let state = cluster.current_state("server_1", "s-1", "t_REALTIME").unwrap().unwrap();
        assert_eq!(state.state("seg_0"), Some(SegmentState::Online));
        assert!(cluster.current_state("server_1", "s-2", "t_REALTIME").unwrap().is_none());
    }

    #[test]
    fn test_live_instance_lifecycle() {
        let cluster = InMemoryClusterState::new();
        cluster.set_live_instance(LiveInstance::new("server_1", "s-1"));
        assert_eq!(
            cluster.live_instance("server_1").unwrap().unwrap().session_id,
            "s-1"
        );
        cluster.remove_live_instance("server_1");
        assert!(cluster.live_instance("server_1").unwrap().is_none());
    }
}
