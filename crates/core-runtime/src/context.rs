//! The view a behavior gets of its owning frame and the runtime services.
//!
//! A context lives for one phase invocation on one frame. Behaviors never
//! see other frames; cross-frame coordination goes through events and the
//! memory visible on snapshots.

use thiserror::Error;

use core_fragments::{BlockKey, Fragment, FragmentOrigin, FragmentValue};
use core_memory::{
    BlockMemory, ChildrenStatus, ControlsState, DisplayHints, MemoryError, MemoryTag, MemoryValue,
};
use core_timing::{EpochMs, TimerState};

use crate::actions::RuntimeAction;
use crate::block::{CompletionReason, RuntimeBlock};
use crate::events::{EventHandler, EventScope, RuntimeEvent, Subscription};
use crate::outputs::{OutputKind, OutputMetadata, OutputRecord, OutputSink};

/// Recoverable behavior failures. The driver catches these at the frame
/// boundary and completes the frame with `error:<kind>`.
#[derive(Debug, Error)]
pub enum BehaviorError {
    #[error(transparent)]
    Memory(#[from] MemoryError),
    #[error("behavior contract violated: {0}")]
    Contract(String),
}

impl BehaviorError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Memory(_) => "memory",
            Self::Contract(_) => "contract",
        }
    }
}

pub struct BehaviorContext<'a> {
    frame: &'a mut RuntimeBlock,
    sink: &'a mut OutputSink,
    now: EpochMs,
    stack_level: usize,
    actions: Vec<RuntimeAction>,
    emitted: Vec<RuntimeEvent>,
    new_subscriptions: Vec<Subscription>,
}

impl<'a> BehaviorContext<'a> {
    pub(crate) fn new(
        frame: &'a mut RuntimeBlock,
        sink: &'a mut OutputSink,
        now: EpochMs,
        stack_level: usize,
    ) -> Self {
        Self {
            frame,
            sink,
            now,
            stack_level,
            actions: Vec::new(),
            emitted: Vec::new(),
            new_subscriptions: Vec::new(),
        }
    }

    // ---- frame view ------------------------------------------------------

    pub fn key(&self) -> &BlockKey {
        self.frame.key()
    }

    pub fn block_type(&self) -> &str {
        self.frame.block_type()
    }

    pub fn label(&self) -> String {
        self.frame.label().to_string()
    }

    pub fn stack_level(&self) -> usize {
        self.stack_level
    }

    pub fn is_complete(&self) -> bool {
        self.frame.is_complete()
    }

    pub fn completion_reason(&self) -> Option<&CompletionReason> {
        self.frame.completion_reason()
    }

    /// Clock reading captured by the driver for this phase.
    pub fn now(&self) -> EpochMs {
        self.now
    }

    pub fn memory(&self) -> &BlockMemory {
        &self.frame.memory
    }

    // ---- memory writes ---------------------------------------------------

    pub fn push_memory(&mut self, tag: MemoryTag, value: MemoryValue) -> Result<(), BehaviorError> {
        self.frame.memory.push(tag, value).map_err(Into::into)
    }

    pub fn update_memory(
        &mut self,
        tag: MemoryTag,
        value: MemoryValue,
    ) -> Result<(), BehaviorError> {
        self.frame.memory.update(tag, value).map_err(Into::into)
    }

    /// Single-value convenience: update the first location with `tag`, or
    /// create it.
    pub fn set_memory(&mut self, tag: MemoryTag, value: MemoryValue) -> Result<(), BehaviorError> {
        self.frame.memory.set(tag, value).map_err(Into::into)
    }

    pub fn get_memory(&self, tag: MemoryTag) -> Option<&MemoryValue> {
        self.frame.memory.get(tag).map(|l| l.value())
    }

    // ---- typed memory helpers -------------------------------------------

    pub fn timer_state(&self) -> Option<TimerState> {
        self.frame.memory.timer_state().cloned()
    }

    /// Read-modify-write on the timer fragment. No-op when the block has no
    /// timer.
    pub fn modify_timer(
        &mut self,
        f: impl FnOnce(&mut TimerState),
    ) -> Result<(), BehaviorError> {
        let Some(mut state) = self.frame.memory.timer_state().cloned() else {
            return Ok(());
        };
        f(&mut state);
        self.set_timer_state(state)
    }

    pub fn set_timer_state(&mut self, state: TimerState) -> Result<(), BehaviorError> {
        let fragment = Fragment::new(FragmentValue::Timer { state }, FragmentOrigin::Runtime)
            .with_source(self.frame.key().clone());
        self.set_memory(MemoryTag::Timer, MemoryValue::Fragments(vec![fragment]))
    }

    pub fn current_round(&self) -> Option<(u32, Option<u32>)> {
        self.frame.memory.current_round()
    }

    pub fn set_round(&mut self, current: u32, total: Option<u32>) -> Result<(), BehaviorError> {
        let fragment = Fragment::new(
            FragmentValue::CurrentRound { current, total },
            FragmentOrigin::Runtime,
        )
        .with_source(self.frame.key().clone());
        self.set_memory(MemoryTag::Round, MemoryValue::Fragments(vec![fragment]))
    }

    pub fn children_status(&self) -> Option<ChildrenStatus> {
        self.frame.memory.children_status()
    }

    pub fn set_children_status(&mut self, status: ChildrenStatus) -> Result<(), BehaviorError> {
        self.set_memory(MemoryTag::ChildrenStatus, MemoryValue::Children(status))
    }

    pub fn display_hints(&self) -> Option<DisplayHints> {
        self.frame.memory.display_hints().cloned()
    }

    pub fn set_display_hints(&mut self, hints: DisplayHints) -> Result<(), BehaviorError> {
        self.set_memory(MemoryTag::Display, MemoryValue::Display(hints))
    }

    /// Read-modify-write on display hints. No-op when none are set.
    pub fn modify_display(
        &mut self,
        f: impl FnOnce(&mut DisplayHints),
    ) -> Result<(), BehaviorError> {
        let Some(mut hints) = self.display_hints() else {
            return Ok(());
        };
        f(&mut hints);
        self.set_display_hints(hints)
    }

    pub fn controls(&self) -> Option<ControlsState> {
        self.frame.memory.controls().cloned()
    }

    pub fn set_controls(&mut self, controls: ControlsState) -> Result<(), BehaviorError> {
        self.set_memory(MemoryTag::Controls, MemoryValue::Controls(controls))
    }

    /// Fragment groups under a multi-valued tag, one `Vec` per location.
    pub fn fragment_groups(&self, tag: MemoryTag) -> Vec<Vec<Fragment>> {
        self.frame
            .memory
            .get_all(tag)
            .filter_map(|l| l.value().fragments().map(<[Fragment]>::to_vec))
            .collect()
    }

    /// All fragments under a tag, flattened across locations.
    pub fn collect_fragments(&self, tag: MemoryTag) -> Vec<Fragment> {
        self.fragment_groups(tag).into_iter().flatten().collect()
    }

    // ---- outputs, events, control ---------------------------------------

    pub fn emit_output(
        &mut self,
        kind: OutputKind,
        fragments: Vec<Fragment>,
        metadata: OutputMetadata,
    ) {
        self.sink.push_record(OutputRecord {
            kind,
            fragments,
            metadata,
            timestamp: self.now,
            source: self.frame.key().clone(),
        });
    }

    /// Queue an event for dispatch after the current phase settles. The
    /// event also lands on the sink's stream.
    pub fn emit_event(&mut self, event: RuntimeEvent) {
        self.emitted.push(event);
    }

    /// Request completion of the owning frame; the first reason wins.
    pub fn mark_complete(&mut self, reason: CompletionReason) {
        self.frame.request_completion(reason);
    }

    pub fn queue_action(&mut self, action: RuntimeAction) {
        self.actions.push(action);
    }

    pub fn subscribe(
        &mut self,
        event: impl Into<String>,
        scope: EventScope,
        handler: Box<dyn EventHandler>,
    ) {
        self.new_subscriptions
            .push(Subscription::new(event, scope, handler));
    }

    // ---- driver plumbing -------------------------------------------------

    pub(crate) fn take_actions(&mut self) -> Vec<RuntimeAction> {
        std::mem::take(&mut self.actions)
    }

    pub(crate) fn take_emitted(&mut self) -> Vec<RuntimeEvent> {
        std::mem::take(&mut self.emitted)
    }

    pub(crate) fn take_subscriptions(&mut self) -> Vec<Subscription> {
        std::mem::take(&mut self.new_subscriptions)
    }
}
