//! Output records and the append-only sink the UI and history consume.

use std::collections::BTreeMap;

use serde::Serialize;

use core_fragments::{BlockKey, Fragment};
use core_timing::{EpochMs, TimerDirection};

use crate::block::CompletionReason;
use crate::events::RuntimeEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputKind {
    /// Header emitted when a block mounts.
    Segment,
    /// Intermediate marker: round header, sound cue.
    Milestone,
    /// Terminal record emitted when a block unmounts.
    Completion,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OutputMetadata {
    pub label: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, String>,
}

impl OutputMetadata {
    pub fn labeled(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            extra: BTreeMap::new(),
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutputRecord {
    pub kind: OutputKind,
    pub fragments: Vec<Fragment>,
    pub metadata: OutputMetadata,
    pub timestamp: EpochMs,
    pub source: BlockKey,
}

/// Payload of a `history:record` event, one per unmounted frame that
/// carries a history behavior. Fires for error-completed frames too.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryRecord {
    pub block_key: BlockKey,
    pub block_type: String,
    pub label: String,
    pub completed_at: EpochMs,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completion_reason: Option<CompletionReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elapsed_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timer_direction: Option<TimerDirection>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timer_duration_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_rounds: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_rounds: Option<u32>,
}

/// Ordered, append-only log of output records plus a parallel stream of
/// runtime-emitted events. Readers keep their own cursor; the sink never
/// drops entries during a run.
#[derive(Debug, Default)]
pub struct OutputSink {
    records: Vec<OutputRecord>,
    events: Vec<RuntimeEvent>,
}

impl OutputSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_record(&mut self, record: OutputRecord) {
        tracing::debug!(
            target: "runtime.output",
            kind = ?record.kind,
            source = %record.source,
            label = %record.metadata.label,
            "output_record"
        );
        self.records.push(record);
    }

    pub fn push_event(&mut self, event: RuntimeEvent) {
        tracing::trace!(target: "runtime.output", event = event.name(), "stream_event");
        self.events.push(event);
    }

    pub fn records(&self) -> &[OutputRecord] {
        &self.records
    }

    pub fn events(&self) -> &[RuntimeEvent] {
        &self.events
    }

    pub fn records_of_kind(&self, kind: OutputKind) -> impl Iterator<Item = &OutputRecord> {
        self.records.iter().filter(move |r| r.kind == kind)
    }

    /// History events in emission order.
    pub fn history(&self) -> impl Iterator<Item = &HistoryRecord> {
        self.events.iter().filter_map(|e| match e {
            RuntimeEvent::HistoryRecord { record } => Some(record),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sink_preserves_order() {
        let mut sink = OutputSink::new();
        for (i, kind) in [OutputKind::Segment, OutputKind::Milestone, OutputKind::Completion]
            .into_iter()
            .enumerate()
        {
            sink.push_record(OutputRecord {
                kind,
                fragments: vec![],
                metadata: OutputMetadata::labeled(format!("r{i}")),
                timestamp: i as u64,
                source: BlockKey::new(1, "b"),
            });
        }
        let kinds: Vec<_> = sink.records().iter().map(|r| r.kind).collect();
        assert_eq!(
            kinds,
            vec![OutputKind::Segment, OutputKind::Milestone, OutputKind::Completion]
        );
        assert_eq!(sink.records_of_kind(OutputKind::Completion).count(), 1);
    }
}
