use std::sync::{Arc, Mutex};

use craft_trace::{emit_shared, SharedTraceSink, TraceEvent, TraceLog, TraceSink, VecTraceSink};

#[test]
fn vec_sink_collects_and_filters() {
    let mut sink = VecTraceSink::default();
    sink.emit(TraceEvent::new(1, "plan.expand").with_a(3));
    sink.emit(
        TraceEvent::new(2, "plan.found")
            .with_subject("inventory.stick")
            .with_a(2),
    );
    sink.emit(TraceEvent::new(3, "plan.expand").with_a(1));

    assert_eq!(sink.tagged("plan.expand").count(), 2);
    let found: Vec<_> = sink.tagged("plan.found").collect();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].subject, "inventory.stick");
    assert_eq!(found[0].a, 2);
}

#[test]
fn shared_sink_receives_events_through_the_mutex() {
    let handle = Arc::new(Mutex::new(VecTraceSink::default()));
    let shared: SharedTraceSink = handle.clone();

    emit_shared(&shared, TraceEvent::new(0, "exec.replan").with_subject("craft_sticks"));

    let sink = handle.lock().unwrap();
    assert_eq!(sink.events.len(), 1);
    assert_eq!(sink.events[0].tag, "exec.replan");
}

#[test]
fn collected_events_serialize_as_a_log() {
    let mut sink = VecTraceSink::default();
    sink.emit(TraceEvent::new(1, "resolve.start").with_subject("inventory.iron_ingot:3"));
    sink.emit(
        TraceEvent::new(2, "resolve.subgoal")
            .with_subject("inventory.crafting_table:1")
            .with_a(1),
    );
    let log = sink.into_log();
    assert_eq!(log.events.len(), 2);

    let json = serde_json::to_string(&log).expect("serialize");
    let roundtrip: TraceLog = serde_json::from_str(&json).expect("deserialize");
    assert_eq!(roundtrip, log);
}
