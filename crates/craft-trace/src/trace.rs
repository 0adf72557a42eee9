use std::borrow::Cow;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

/// A small, allocation-friendly trace event.
///
/// `seq` is the search iteration (planner) or step index (executor). `subject` names what
/// the event is about: an action, a goal, or a fact key. `a`/`b` are tag-specific counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceEvent {
    pub seq: u64,
    pub tag: Cow<'static, str>,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub a: u64,
    #[serde(default)]
    pub b: u64,
}

impl TraceEvent {
    pub fn new(seq: u64, tag: impl Into<Cow<'static, str>>) -> Self {
        Self {
            seq,
            tag: tag.into(),
            subject: String::new(),
            a: 0,
            b: 0,
        }
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = subject.into();
        self
    }

    pub fn with_a(mut self, a: u64) -> Self {
        self.a = a;
        self
    }

    pub fn with_b(mut self, b: u64) -> Self {
        self.b = b;
        self
    }
}

pub trait TraceSink: Send {
    fn emit(&mut self, event: TraceEvent);
}

impl<T: TraceSink + ?Sized> TraceSink for &mut T {
    fn emit(&mut self, event: TraceEvent) {
        (**self).emit(event);
    }
}

impl<T: TraceSink + ?Sized> TraceSink for Box<T> {
    fn emit(&mut self, event: TraceEvent) {
        (**self).emit(event);
    }
}

#[derive(Debug, Default)]
pub struct NullTraceSink;

impl TraceSink for NullTraceSink {
    fn emit(&mut self, _event: TraceEvent) {}
}

#[derive(Debug, Default)]
pub struct VecTraceSink {
    pub events: Vec<TraceEvent>,
}

impl VecTraceSink {
    pub fn tagged<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = &'a TraceEvent> + 'a {
        self.events.iter().filter(move |e| e.tag == tag)
    }

    pub fn into_log(self) -> TraceLog {
        TraceLog {
            events: self.events,
        }
    }
}

impl TraceSink for VecTraceSink {
    fn emit(&mut self, event: TraceEvent) {
        self.events.push(event);
    }
}

/// Forwards every event to `tracing` at debug level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl TraceSink for TracingSink {
    fn emit(&mut self, event: TraceEvent) {
        tracing::debug!(
            seq = event.seq,
            tag = %event.tag,
            subject = %event.subject,
            a = event.a,
            b = event.b,
            "trace"
        );
    }
}

#[derive(Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceLog {
    pub events: Vec<TraceEvent>,
}

/// Sink shared between the layers of one agent (resolver, executor).
pub type SharedTraceSink = Arc<Mutex<dyn TraceSink>>;

/// Emit into a shared sink. A poisoned lock drops the event rather than panicking.
pub fn emit_shared(sink: &SharedTraceSink, event: TraceEvent) {
    if let Ok(mut guard) = sink.lock() {
        guard.emit(event);
    }
}
