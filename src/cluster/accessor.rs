use std::fmt::Debug;

use crate::cluster::state::{CurrentState, IdealState, LiveInstance};
use crate::error::Result;

/// Read access to the cluster metadata store.
///
/// `Ok(None)` means the record does not exist; `Err` means the store could
/// not be read.
pub trait ClusterStateAccessor: Send + Sync + Debug {
    fn ideal_state(&self, table_name_with_type: &str) -> Result<Option<IdealState>>;

    fn live_instance(&self, instance_name: &str) -> Result<Option<LiveInstance>>;

    fn current_state(
        &self,
        instance_name: &str,
        session_id: &str,
        table_name_with_type: &str,
    ) -> Result<Option<CurrentState>>;
}
