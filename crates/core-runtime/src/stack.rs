//! The block stack and its read-only snapshot view.

use serde::Serialize;

use core_fragments::BlockKey;
use core_memory::{MemoryTag, MemoryValue};

use crate::block::{CompletionReason, RuntimeBlock};

#[derive(Debug, Default)]
pub struct BlockStack {
    frames: Vec<RuntimeBlock>,
    revision: u64,
}

impl BlockStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Bumped on every push/pop; UI uses it as the stack-changed signal.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn frames(&self) -> &[RuntimeBlock] {
        &self.frames
    }

    pub fn top(&self) -> Option<&RuntimeBlock> {
        self.frames.last()
    }

    pub fn top_mut(&mut self) -> Option<&mut RuntimeBlock> {
        self.frames.last_mut()
    }

    pub fn get(&self, index: usize) -> Option<&RuntimeBlock> {
        self.frames.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut RuntimeBlock> {
        self.frames.get_mut(index)
    }

    pub fn index_of(&self, key_id: u64) -> Option<usize> {
        self.frames.iter().position(|f| f.key().id == key_id)
    }

    pub(crate) fn push(&mut self, frame: RuntimeBlock) {
        tracing::trace!(
            target: "runtime.stack",
            block = %frame.key(),
            depth = self.frames.len() + 1,
            "push"
        );
        self.frames.push(frame);
        self.revision += 1;
    }

    pub(crate) fn pop(&mut self) -> Option<RuntimeBlock> {
        let frame = self.frames.pop()?;
        tracing::trace!(
            target: "runtime.stack",
            block = %frame.key(),
            depth = self.frames.len(),
            "pop"
        );
        self.revision += 1;
        Some(frame)
    }

    /// Lowest (deepest) completed frame, if any.
    pub(crate) fn lowest_complete(&self) -> Option<usize> {
        self.frames.iter().position(RuntimeBlock::is_complete)
    }

    pub fn snapshot(&self) -> StackSnapshot {
        StackSnapshot {
            revision: self.revision,
            frames: self.frames.iter().map(FrameSnapshot::of).collect(),
        }
    }
}

/// Bottom-to-top copy of the stack for external readers. Values are
/// cloned; holding a snapshot never aliases live frames.
#[derive(Debug, Clone, Serialize)]
pub struct StackSnapshot {
    pub revision: u64,
    pub frames: Vec<FrameSnapshot>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FrameSnapshot {
    pub key: BlockKey,
    pub block_type: String,
    pub label: String,
    pub is_complete: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completion_reason: Option<CompletionReason>,
    pub memory: Vec<(MemoryTag, MemoryValue)>,
}

impl FrameSnapshot {
    fn of(frame: &RuntimeBlock) -> Self {
        Self {
            key: frame.key().clone(),
            block_type: frame.block_type().to_string(),
            label: frame.label().to_string(),
            is_complete: frame.is_complete(),
            completion_reason: frame.completion_reason().cloned(),
            memory: frame
                .memory
                .locations()
                .iter()
                .map(|l| (l.tag, l.value().clone()))
                .collect(),
        }
    }
}
