//! Runtime blocks: the frames of the execution stack.

use std::fmt;

use serde::{Serialize, Serializer};

use core_fragments::BlockKey;
use core_memory::BlockMemory;

use crate::behavior::Behavior;
use crate::events::Subscription;

/// Why a frame finished. First reason recorded wins; later requests are
/// dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionReason {
    TimerExpired,
    RoundsExhausted,
    ChildrenComplete,
    UserAdvance,
    /// Completed by a named event (`event:<name>`).
    Event(String),
    Cancelled,
    /// Forced during an ancestor's unwind.
    Manual,
    /// A phase failed; the kind names the error class.
    Error(String),
}

impl fmt::Display for CompletionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TimerExpired => f.write_str("timer-expired"),
            Self::RoundsExhausted => f.write_str("rounds-exhausted"),
            Self::ChildrenComplete => f.write_str("children-complete"),
            Self::UserAdvance => f.write_str("user-advance"),
            Self::Event(name) => write!(f, "event:{name}"),
            Self::Cancelled => f.write_str("cancelled"),
            Self::Manual => f.write_str("manual"),
            Self::Error(kind) => write!(f, "error:{kind}"),
        }
    }
}

impl Serialize for CompletionReason {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Allocates totally ordered block keys. One generator per runtime.
#[derive(Debug, Default)]
pub struct KeyGenerator {
    next: u64,
}

impl KeyGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate(&mut self, tag: impl Into<String>) -> BlockKey {
        self.next += 1;
        BlockKey::new(self.next, tag)
    }
}

/// Lifecycle milestones asserted by the driver: mount precedes next,
/// next precedes unmount, unmount runs exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Created,
    Mounted,
    Unmounted,
    Disposed,
}

/// One frame on the stack. Owns its memory, behaviors, and event
/// subscriptions exclusively; destroyed when popped.
pub struct RuntimeBlock {
    key: BlockKey,
    block_type: String,
    source_ids: Vec<u32>,
    pub memory: BlockMemory,
    pub(crate) behaviors: Vec<Box<dyn Behavior>>,
    pub(crate) subscriptions: Vec<Subscription>,
    pub(crate) lifecycle: Lifecycle,
    is_complete: bool,
    completion_reason: Option<CompletionReason>,
    pending_completion: Option<CompletionReason>,
}

impl RuntimeBlock {
    pub fn new(
        key: BlockKey,
        block_type: impl Into<String>,
        source_ids: Vec<u32>,
        memory: BlockMemory,
        behaviors: Vec<Box<dyn Behavior>>,
    ) -> Self {
        Self {
            key,
            block_type: block_type.into(),
            source_ids,
            memory,
            behaviors,
            subscriptions: Vec::new(),
            lifecycle: Lifecycle::Created,
            is_complete: false,
            completion_reason: None,
            pending_completion: None,
        }
    }

    pub fn key(&self) -> &BlockKey {
        &self.key
    }

    pub fn block_type(&self) -> &str {
        &self.block_type
    }

    pub fn source_ids(&self) -> &[u32] {
        &self.source_ids
    }

    pub fn label(&self) -> &str {
        self.memory.label().unwrap_or(&self.block_type)
    }

    pub fn is_complete(&self) -> bool {
        self.is_complete
    }

    pub fn completion_reason(&self) -> Option<&CompletionReason> {
        self.completion_reason.as_ref()
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    /// Names of the composed behaviors in declared order.
    pub fn behavior_names(&self) -> Vec<&'static str> {
        self.behaviors.iter().map(|b| b.name()).collect()
    }

    /// Queue a completion request; the first one wins.
    pub(crate) fn request_completion(&mut self, reason: CompletionReason) {
        if self.is_complete || self.pending_completion.is_some() {
            tracing::trace!(
                target: "runtime.stack",
                block = %self.key,
                dropped = %reason,
                "completion_already_recorded"
            );
            return;
        }
        self.pending_completion = Some(reason);
    }

    /// Apply a pending completion request, if any. Returns whether the
    /// frame transitioned to complete.
    pub(crate) fn apply_pending_completion(&mut self) -> bool {
        if self.is_complete {
            return false;
        }
        let Some(reason) = self.pending_completion.take() else {
            return false;
        };
        tracing::debug!(
            target: "runtime.stack",
            block = %self.key,
            reason = %reason,
            "frame_complete"
        );
        self.is_complete = true;
        self.completion_reason = Some(reason);
        true
    }

    /// Mark complete immediately, bypassing the pending queue. Used by the
    /// driver for unwinds and phase failures.
    pub(crate) fn force_complete(&mut self, reason: CompletionReason) {
        if !self.is_complete {
            self.is_complete = true;
            self.completion_reason = Some(reason);
        }
    }
}

impl fmt::Debug for RuntimeBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuntimeBlock")
            .field("key", &self.key)
            .field("block_type", &self.block_type)
            .field("source_ids", &self.source_ids)
            .field("behaviors", &self.behaviors.len())
            .field("subscriptions", &self.subscriptions.len())
            .field("lifecycle", &self.lifecycle)
            .field("is_complete", &self.is_complete)
            .field("completion_reason", &self.completion_reason)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_completion_reason_wins() {
        let mut block = RuntimeBlock::new(
            BlockKey::new(1, "t"),
            "Test",
            vec![],
            BlockMemory::new(),
            vec![],
        );
        block.request_completion(CompletionReason::UserAdvance);
        block.request_completion(CompletionReason::TimerExpired);
        assert!(block.apply_pending_completion());
        assert_eq!(
            block.completion_reason(),
            Some(&CompletionReason::UserAdvance)
        );
        // A later request on a complete frame is dropped entirely.
        block.request_completion(CompletionReason::Cancelled);
        assert!(!block.apply_pending_completion());
        assert_eq!(
            block.completion_reason(),
            Some(&CompletionReason::UserAdvance)
        );
    }

    #[test]
    fn reason_strings_match_the_closed_set() {
        assert_eq!(CompletionReason::TimerExpired.to_string(), "timer-expired");
        assert_eq!(
            CompletionReason::Event("complete:row".into()).to_string(),
            "event:complete:row"
        );
        assert_eq!(
            CompletionReason::Error("max-depth".into()).to_string(),
            "error:max-depth"
        );
    }

    #[test]
    fn key_generator_is_monotonic() {
        let mut keys = KeyGenerator::new();
        let a = keys.allocate("a");
        let b = keys.allocate("b");
        assert!(a < b);
    }
}
