//! Structured VM tracing (§4.2, §6 "Trace JSON shape").
//!
//! Trace emission is synchronous and side-effect free with respect to
//! program semantics — it never influences control flow, only observes it.

use serde::Serialize;
use std::io::Write;
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TraceKind {
    Enter,
    Exit,
    Eval,
    Effect,
}

#[derive(Debug, Clone, Serialize)]
pub struct TraceEvent {
    pub ts: u128,
    pub call_id: u64,
    pub kind: TraceKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub op: Option<String>,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel: Option<&'static str>,
}

pub trait TraceSink {
    fn emit(&mut self, event: TraceEvent);
}

/// Assigns `ts` from the wall clock and a caller-supplied monotonic
/// `call_id`, then forwards to `sink`. Kept separate from [`TraceSink`] so
/// call sites never have to compute the timestamp themselves.
pub fn record(sink: &mut dyn TraceSink, call_id: u64, kind: TraceKind, path: String, op: Option<String>, channel: Option<&'static str>) {
    let ts = SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_millis()).unwrap_or(0);
    sink.emit(TraceEvent { ts, call_id, kind, op, path, channel });
}

/// Writes one JSON object per line (§6: NDJSON), matching the canonical
/// serialization rules used elsewhere (UTF-8, LF).
pub struct NdjsonTraceWriter<W: Write> {
    out: W,
}

impl<W: Write> NdjsonTraceWriter<W> {
    pub fn new(out: W) -> Self {
        NdjsonTraceWriter { out }
    }
}

impl<W: Write> TraceSink for NdjsonTraceWriter<W> {
    fn emit(&mut self, event: TraceEvent) {
        if let Ok(line) = serde_json::to_string(&event) {
            let _ = writeln!(self.out, "{line}");
        }
    }
}

/// Accumulates events in memory — used by tests that assert on trace shape
/// without going through a writer.
#[derive(Default)]
pub struct RecordingTraceSink {
    pub events: Vec<TraceEvent>,
}

impl TraceSink for RecordingTraceSink {
    fn emit(&mut self, event: TraceEvent) {
        self.events.push(event);
    }
}
