//! Trace event sinks.

use convoke_core::event::{TraceEvent, TraceEventKind, Tracer};
use parking_lot::Mutex;
use std::io::Write;

/// Writes one JSON object per line.
pub struct JsonlTracer<W: Write + Send> {
    out: Mutex<W>,
}

impl<W: Write + Send> JsonlTracer<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    pub fn into_inner(self) -> W {
        self.out.into_inner()
    }
}

impl JsonlTracer<std::io::Stderr> {
    pub fn stderr() -> Self {
        Self::new(std::io::stderr())
    }
}

impl<W: Write + Send> Tracer for JsonlTracer<W> {
    fn write(&self, event: TraceEvent) {
        let line = match serde_json::to_string(&event) {
            Ok(line) => line,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to serialize trace event");
                return;
            }
        };
        let mut out = self.out.lock();
        if let Err(e) = writeln!(out, "{line}").and_then(|_| out.flush()) {
            tracing::warn!(error = %e, "Failed to write trace event");
        }
    }
}

/// Keeps every event in memory. Handy in tests and for post-run summaries.
#[derive(Default)]
pub struct CollectingTracer {
    events: Mutex<Vec<TraceEvent>>,
}

impl CollectingTracer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<TraceEvent> {
        self.events.lock().clone()
    }

    pub fn kinds(&self) -> Vec<TraceEventKind> {
        self.events.lock().iter().map(|e| e.kind).collect()
    }

    pub fn count(&self, kind: TraceEventKind) -> usize {
        self.events.lock().iter().filter(|e| e.kind == kind).count()
    }
}

impl Tracer for CollectingTracer {
    fn write(&self, event: TraceEvent) {
        self.events.lock().push(event);
    }
}
