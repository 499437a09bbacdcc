use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use quarry::cluster::{CurrentState, IdealState, LiveInstance};
use quarry::{
    ClusterStateAccessor, InMemoryClusterState, PartialUpsertHandler, QuarryError, Schema,
    SegmentReadinessGate, SegmentState, UpsertConfig,
};

const TABLE: &str = "players_REALTIME";
const INSTANCE: &str = "server_1";
const SESSION: &str = "session_7";

/// Wraps the in-memory store and counts every read.
#[derive(Debug, Default)]
struct CountingAccessor {
    inner: InMemoryClusterState,
    reads: AtomicUsize,
    fail_ideal_state: AtomicBool,
}

impl CountingAccessor {
    fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

impl ClusterStateAccessor for CountingAccessor {
    fn ideal_state(&self, table: &str) -> quarry::Result<Option<IdealState>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if self.fail_ideal_state.load(Ordering::SeqCst) {
            return Err(QuarryError::internal("metadata store unavailable"));
        }
        self.inner.ideal_state(table)
    }

    fn live_instance(&self, instance: &str) -> quarry::Result<Option<LiveInstance>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.inner.live_instance(instance)
    }

    fn current_state(
        &self,
        instance: &str,
        session: &str,
        table: &str,
    ) -> quarry::Result<Option<CurrentState>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.inner.current_state(instance, session, table)
    }
}

fn accessor() -> Arc<CountingAccessor> {
    let accessor = Arc::new(CountingAccessor::default());
    accessor.inner.set_ideal_state(
        IdealState::new(TABLE)
            .with_assignment("seg_0", INSTANCE, SegmentState::Online)
            .with_assignment("seg_1", INSTANCE, SegmentState::Online),
    );
    accessor.inner.set_live_instance(LiveInstance::new(INSTANCE, SESSION));
    accessor
}

#[test]
fn test_error_segment_then_all_online_latches() {
    let accessor = accessor();
    accessor.inner.set_current_state(
        INSTANCE,
        SESSION,
        TABLE,
        CurrentState::new()
            .with_state("seg_0", SegmentState::Online)
            .with_state("seg_1", SegmentState::Error),
    );
    let gate = SegmentReadinessGate::new(accessor.clone(), TABLE, INSTANCE);

    assert!(!gate.is_ready());
    assert_eq!(accessor.reads(), 3);

    accessor
        .inner
        .update_segment_state(INSTANCE, SESSION, TABLE, "seg_1", SegmentState::Online);
    assert!(gate.is_ready());
    let reads = accessor.reads();
    assert_eq!(reads, 6);

    // Latched: later calls never read the cluster, even if states regress.
    accessor
        .inner
        .update_segment_state(INSTANCE, SESSION, TABLE, "seg_0", SegmentState::Offline);
    for _ in 0..10 {
        assert!(gate.is_ready());
    }
    assert_eq!(accessor.reads(), reads);
}

#[test]
fn test_unavailable_metadata_is_not_ready() {
    let accessor = accessor();
    accessor.fail_ideal_state.store(true, Ordering::SeqCst);
    let gate = SegmentReadinessGate::new(accessor.clone(), TABLE, INSTANCE);
    assert!(!gate.is_ready());
    assert_eq!(accessor.reads(), 1);

    accessor.fail_ideal_state.store(false, Ordering::SeqCst);
    accessor.inner.remove_live_instance(INSTANCE);
    assert!(!gate.is_ready());
    assert_eq!(accessor.reads(), 3);
}

#[test]
fn test_unloaded_segment_is_not_ready() {
    let accessor = accessor();
    accessor.inner.set_current_state(
        INSTANCE,
        SESSION,
        TABLE,
        CurrentState::new().with_state("seg_0", SegmentState::Online),
    );
    let gate = SegmentReadinessGate::new(accessor, TABLE, INSTANCE);
    assert!(!gate.is_ready());
}

#[test]
fn test_unrecognized_state_is_not_loaded() {
    let accessor = accessor();
    let current: CurrentState = serde_json::from_str(
        r#"{"partition_states": {"seg_0": "ONLINE", "seg_1": "BOOTSTRAP"}}"#,
    )
    .unwrap();
    accessor.inner.set_current_state(INSTANCE, SESSION, TABLE, current);
    let gate = SegmentReadinessGate::new(accessor.clone(), TABLE, INSTANCE);
    assert!(!gate.is_ready());

    accessor
        .inner
        .update_segment_state(INSTANCE, SESSION, TABLE, "seg_1", SegmentState::Online);
    assert!(gate.is_ready());
}

#[test]
fn test_handler_delegates_to_gate() {
    let accessor = accessor();
    let gate = Arc::new(SegmentReadinessGate::new(accessor.clone(), TABLE, INSTANCE));
    let schema = Schema::builder("players")
        .add_single_value("pk", quarry::DataType::String)
        .add_single_value("ts", quarry::DataType::Long)
        .primary_key(&["pk"])
        .time_column("ts")
        .build();
    let handler =
        PartialUpsertHandler::from_config(&schema, &UpsertConfig::partial(), Some(gate.clone()))
            .unwrap();

    assert!(!handler.is_all_segments_loaded());
    accessor.inner.set_current_state(
        INSTANCE,
        SESSION,
        TABLE,
        CurrentState::new()
            .with_state("seg_0", SegmentState::Online)
            .with_state("seg_1", SegmentState::Online),
    );
    assert!(handler.is_all_segments_loaded());
    assert!(gate.is_ready());
}

#[test]
fn test_concurrent_callers_agree() {
    let accessor = accessor();
    accessor.inner.set_current_state(
        INSTANCE,
        SESSION,
        TABLE,
        CurrentState::new()
            .with_state("seg_0", SegmentState::Online)
            .with_state("seg_1", SegmentState::Online),
    );
    let gate = Arc::new(SegmentReadinessGate::new(accessor.clone(), TABLE, INSTANCE));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let gate = gate.clone();
            std::thread::spawn(move || gate.is_ready())
        })
        .collect();
    for handle in handles {
        assert!(handle.join().unwrap());
    }
    // Only the first caller read the cluster.
    assert_eq!(accessor.reads(), 3);
}
