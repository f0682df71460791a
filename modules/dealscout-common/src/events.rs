//! Progress events — the ordered stream a pipeline run emits to its caller.
//!
//! The orchestrator owns a monotonically increasing sequence counter and
//! pushes events through an unbounded channel; the caller consumes them in
//! emission order. Fire-and-forget: a dropped receiver never blocks the run.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedSender;

/// Discriminated event payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressKind {
    PhaseStarted { phase: Phase },
    HarvestComplete { intents: u32, priced: u32 },
    SourceComplete { matches: u32 },
    BudgetDenied { used_cents: u64, limit_cents: u64 },
    VerifyComplete { opportunities: u32 },
    Error { phase: Phase },
    Done { success: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Harvest,
    Source,
    BudgetCheck,
    Verify,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Phase::Harvest => "harvest",
            Phase::Source => "source",
            Phase::BudgetCheck => "budget_check",
            Phase::Verify => "verify",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub seq: u32,
    pub message: String,
    #[serde(flatten)]
    pub kind: ProgressKind,
    /// Optional structured payload for programmatic consumers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

/// Sequenced, fire-and-forget emitter over a caller-supplied channel.
pub struct EventSink {
    tx: Option<UnboundedSender<ProgressEvent>>,
    seq: u32,
}

impl EventSink {
    pub fn new(tx: UnboundedSender<ProgressEvent>) -> Self {
        Self { tx: Some(tx), seq: 0 }
    }

    /// A sink that drops everything. Useful for tests and fire-and-forget
    /// callers that only want the terminal result.
    pub fn disabled() -> Self {
        Self { tx: None, seq: 0 }
    }

    pub fn emit(&mut self, kind: ProgressKind, message: impl Into<String>) {
        self.emit_with(kind, message, None);
    }

    pub fn emit_with(
        &mut self,
        kind: ProgressKind,
        message: impl Into<String>,
        data: Option<serde_json::Value>,
    ) {
        let event = ProgressEvent {
            seq: self.seq,
            message: message.into(),
            kind,
            data,
        };
        self.seq += 1;
        if let Some(tx) = &self.tx {
            // Receiver may be gone; the pipeline must not care.
            let _ = tx.send(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_carry_increasing_seq() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let mut sink = EventSink::new(tx);
        sink.emit(ProgressKind::PhaseStarted { phase: Phase::Harvest }, "start");
        sink.emit(
            ProgressKind::HarvestComplete { intents: 3, priced: 2 },
            "done",
        );

        let first = rx.try_recv().unwrap();
        let second = rx.try_recv().unwrap();
        assert_eq!(first.seq, 0);
        assert_eq!(second.seq, 1);
    }

    #[test]
    fn dropped_receiver_does_not_panic() {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        drop(rx);
        let mut sink = EventSink::new(tx);
        sink.emit(ProgressKind::Done { success: true }, "done");
    }

    #[test]
    fn event_serializes_with_type_tag() {
        let event = ProgressEvent {
            seq: 4,
            message: "harvest complete".into(),
            kind: ProgressKind::HarvestComplete { intents: 7, priced: 5 },
            data: None,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "harvest_complete");
        assert_eq!(json["intents"], 7);
    }
}
