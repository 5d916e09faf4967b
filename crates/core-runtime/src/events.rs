//! Event taxonomy and scoped subscriptions.
//!
//! Host events (`tick`, `next`, pause/resume, cancel, custom completions)
//! drive the engine; runtime events (history, sound, previews, pops) flow
//! out on the sink's event stream and may be observed by subscriptions on
//! live frames.

use std::fmt;

use serde::Serialize;

use core_fragments::BlockKey;
use core_timing::EpochMs;

use crate::block::CompletionReason;
use crate::context::{BehaviorContext, BehaviorError};
use crate::outputs::HistoryRecord;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RuntimeEvent {
    #[serde(rename = "tick")]
    Tick { timestamp: EpochMs },
    #[serde(rename = "next")]
    Next,
    #[serde(rename = "timer:pause")]
    TimerPause,
    #[serde(rename = "timer:resume")]
    TimerResume,
    #[serde(rename = "cancel")]
    Cancel,
    /// Custom completion event; `name` is the full `complete:*` string.
    #[serde(rename = "complete")]
    Completion { name: String },
    /// Emitted by the driver after a frame is popped. Lets a container
    /// react to its dispatched child finishing without an extra user event.
    #[serde(rename = "block:popped")]
    BlockPopped {
        key: BlockKey,
        block_type: String,
        reason: Option<CompletionReason>,
        /// Stack index the frame occupied; a container recognizes its
        /// direct child by `depth == own level + 1`.
        depth: usize,
    },
    /// A `CompileChild` action found no block to push; the requesting
    /// frame hears about it so its dispatch can move on.
    #[serde(rename = "compile:skipped")]
    CompileSkipped {
        key: BlockKey,
        statement_ids: Vec<u32>,
    },
    /// Preview of the statements the container will compile next.
    #[serde(rename = "next:preview")]
    NextPreview {
        key: BlockKey,
        statement_ids: Vec<u32>,
    },
    #[serde(rename = "history:record")]
    HistoryRecord { record: HistoryRecord },
    #[serde(rename = "sound:play")]
    SoundPlay {
        sound: String,
        key: BlockKey,
        #[serde(skip_serializing_if = "Option::is_none")]
        remaining_seconds: Option<u32>,
    },
    #[serde(rename = "controls:changed")]
    ControlsChanged { key: BlockKey },
}

impl RuntimeEvent {
    /// Subscription-matching name.
    pub fn name(&self) -> &str {
        match self {
            Self::Tick { .. } => "tick",
            Self::Next => "next",
            Self::TimerPause => "timer:pause",
            Self::TimerResume => "timer:resume",
            Self::Cancel => "cancel",
            Self::Completion { name } => name,
            Self::BlockPopped { .. } => "block:popped",
            Self::CompileSkipped { .. } => "compile:skipped",
            Self::NextPreview { .. } => "next:preview",
            Self::HistoryRecord { .. } => "history:record",
            Self::SoundPlay { .. } => "sound:play",
            Self::ControlsChanged { .. } => "controls:changed",
        }
    }
}

/// Which frames a subscription fires on, relative to the active (top)
/// frame. In a linear stack `Bubble` and `Global` both cover every live
/// frame; `Local` restricts delivery to the frame currently on top.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventScope {
    Local,
    Bubble,
    Global,
}

impl EventScope {
    pub(crate) fn delivers(self, owner_index: usize, top_index: usize) -> bool {
        match self {
            Self::Local => owner_index == top_index,
            Self::Bubble | Self::Global => true,
        }
    }
}

/// A handler object with its state captured by value. Subscriptions never
/// borrow their behavior; shared state goes through block memory or an
/// explicit shared cell.
pub trait EventHandler {
    fn on_event(
        &mut self,
        event: &RuntimeEvent,
        ctx: &mut BehaviorContext<'_>,
    ) -> Result<(), BehaviorError>;
}

pub struct Subscription {
    pub event: String,
    pub scope: EventScope,
    pub handler: Box<dyn EventHandler>,
}

impl Subscription {
    pub fn new(
        event: impl Into<String>,
        scope: EventScope,
        handler: Box<dyn EventHandler>,
    ) -> Self {
        Self {
            event: event.into(),
            scope,
            handler,
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("event", &self.event)
            .field("scope", &self.scope)
            .finish()
    }
}
