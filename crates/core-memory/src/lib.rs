//! Block-scoped memory: an ordered list of tagged, subscribable locations.
//!
//! Every tag has a fixed payload shape, checked at the location boundary.
//! Single-valued tags (`timer`, `round`, `display`, `controls`,
//! `children:status`, `fragment:label`) admit at most one location per
//! block; the `fragment:*` plan/result tags may repeat (one location per
//! compiled sub-group).
//!
//! Writing to a released block's memory is a contract violation and panics;
//! shape and duplication problems are recoverable [`MemoryError`]s.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use core_fragments::{Fragment, FragmentKind, FragmentValue, resolve_precedence};
use core_timing::TimerState;

mod location;

pub use location::{MemoryChange, MemoryLocation, SubscriptionId};

/// Closed set of location tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryTag {
    /// Block display label (single Label fragment).
    FragmentLabel,
    /// Plan fragments grouped per compiled sub-group; repeats.
    FragmentDisplay,
    /// Terminal runtime-computed fragments written on unmount.
    FragmentResult,
    /// Intermediate runtime fragments merged into completion output.
    FragmentTracked,
    /// Fragments re-injected into compiled children for the current round.
    FragmentPromote,
    /// Current-round fragment.
    Round,
    /// Timer fragment wrapping [`TimerState`].
    Timer,
    /// UI display hints.
    Display,
    /// Child-dispatch progress.
    ChildrenStatus,
    /// Runtime control buttons.
    Controls,
}

impl MemoryTag {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::FragmentLabel => "fragment:label",
            Self::FragmentDisplay => "fragment:display",
            Self::FragmentResult => "fragment:result",
            Self::FragmentTracked => "fragment:tracked",
            Self::FragmentPromote => "fragment:promote",
            Self::Round => "round",
            Self::Timer => "timer",
            Self::Display => "display",
            Self::ChildrenStatus => "children:status",
            Self::Controls => "controls",
        }
    }

    /// Tags that admit at most one location per block.
    pub fn is_single_valued(self) -> bool {
        matches!(
            self,
            Self::Timer
                | Self::Round
                | Self::Display
                | Self::Controls
                | Self::ChildrenStatus
                | Self::FragmentLabel
        )
    }
}

impl fmt::Display for MemoryTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// UI rendering mode hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayMode {
    Clock,
    Timer,
    Countdown,
    Hidden,
}

/// Hints consumed by the rendering layer; owned by display behaviors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayHints {
    pub mode: DisplayMode,
    pub label: String,
    pub subtitle: Option<String>,
    pub round_display: Option<String>,
    pub action_display: Option<String>,
}

impl DisplayHints {
    pub fn new(mode: DisplayMode, label: impl Into<String>) -> Self {
        Self {
            mode,
            label: label.into(),
            subtitle: None,
            round_display: None,
            action_display: None,
        }
    }
}

/// Child-dispatch progress written by the container behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ChildrenStatus {
    pub child_index: usize,
    pub total_children: usize,
    pub all_executed: bool,
    pub all_completed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ButtonConfig {
    pub id: String,
    pub label: String,
    /// Event emitted when the host reports this button pressed.
    pub event: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlsDisplayMode {
    #[default]
    Timer,
    Clock,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ControlsState {
    pub buttons: Vec<ButtonConfig>,
    pub display_mode: ControlsDisplayMode,
}

/// Payload of one memory location. The tag fixes which variant is legal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MemoryValue {
    Fragments(Vec<Fragment>),
    Display(DisplayHints),
    Children(ChildrenStatus),
    Controls(ControlsState),
}

impl MemoryValue {
    pub fn fragments(&self) -> Option<&[Fragment]> {
        match self {
            Self::Fragments(f) => Some(f),
            _ => None,
        }
    }

    fn matches_tag(&self, tag: MemoryTag) -> bool {
        match tag {
            MemoryTag::Display => matches!(self, Self::Display(_)),
            MemoryTag::ChildrenStatus => matches!(self, Self::Children(_)),
            MemoryTag::Controls => matches!(self, Self::Controls(_)),
            _ => matches!(self, Self::Fragments(_)),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MemoryError {
    #[error("tag {tag} is single-valued but a location already exists")]
    DuplicateSingleValued { tag: MemoryTag },
    #[error("payload shape does not match tag {tag}")]
    ShapeMismatch { tag: MemoryTag },
    #[error("no location with tag {tag}")]
    MissingLocation { tag: MemoryTag },
}

/// Ordered list of locations owned by one block. Lifetime equals the
/// block's stack lifetime; [`BlockMemory::release`] seals it on pop.
#[derive(Default)]
pub struct BlockMemory {
    locations: Vec<MemoryLocation>,
    released: bool,
}

impl BlockMemory {
    pub fn new() -> Self {
        Self::default()
    }

    fn assert_live(&self) {
        assert!(
            !self.released,
            "memory access on a released block frame"
        );
    }

    /// Append a new location. Errors on shape mismatch or a second location
    /// for a single-valued tag.
    pub fn push(&mut self, tag: MemoryTag, value: MemoryValue) -> Result<(), MemoryError> {
        self.assert_live();
        if !value.matches_tag(tag) {
            return Err(MemoryError::ShapeMismatch { tag });
        }
        if tag.is_single_valued() && self.get(tag).is_some() {
            return Err(MemoryError::DuplicateSingleValued { tag });
        }
        self.locations.push(MemoryLocation::new(tag, value));
        Ok(())
    }

    /// Replace the payload of the first location with `tag` and notify its
    /// subscribers.
    pub fn update(&mut self, tag: MemoryTag, value: MemoryValue) -> Result<(), MemoryError> {
        self.assert_live();
        if !value.matches_tag(tag) {
            return Err(MemoryError::ShapeMismatch { tag });
        }
        let loc = self
            .locations
            .iter_mut()
            .find(|l| l.tag == tag)
            .ok_or(MemoryError::MissingLocation { tag })?;
        loc.replace(value);
        Ok(())
    }

    /// Update-or-push view used by the single-value `set_memory` API.
    pub fn set(&mut self, tag: MemoryTag, value: MemoryValue) -> Result<(), MemoryError> {
        if self.get(tag).is_some() {
            self.update(tag, value)
        } else {
            self.push(tag, value)
        }
    }

    pub fn get(&self, tag: MemoryTag) -> Option<&MemoryLocation> {
        self.locations.iter().find(|l| l.tag == tag)
    }

    pub fn get_mut(&mut self, tag: MemoryTag) -> Option<&mut MemoryLocation> {
        self.assert_live();
        self.locations.iter_mut().find(|l| l.tag == tag)
    }

    pub fn get_all(&self, tag: MemoryTag) -> impl Iterator<Item = &MemoryLocation> {
        self.locations.iter().filter(move |l| l.tag == tag)
    }

    /// Ordered view of every location (declaration order).
    pub fn locations(&self) -> &[MemoryLocation] {
        &self.locations
    }

    /// Seal the memory when the owning block is popped. Double release is a
    /// driver bug.
    pub fn release(&mut self) {
        assert!(!self.released, "block memory released twice");
        self.released = true;
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    // ---- typed accessors -------------------------------------------------

    /// Authoritative fragment of `kind` under `tag`, precedence-resolved.
    pub fn fragment(&self, tag: MemoryTag, kind: FragmentKind) -> Option<&Fragment> {
        self.get(tag)
            .and_then(|l| l.value().fragments())
            .and_then(|f| resolve_precedence(f, kind))
    }

    pub fn timer_state(&self) -> Option<&TimerState> {
        match &self.fragment(MemoryTag::Timer, FragmentKind::Timer)?.value {
            FragmentValue::Timer { state } => Some(state),
            _ => None,
        }
    }

    /// `(current, total)` from the round location.
    pub fn current_round(&self) -> Option<(u32, Option<u32>)> {
        match self
            .fragment(MemoryTag::Round, FragmentKind::CurrentRound)?
            .value
        {
            FragmentValue::CurrentRound { current, total } => Some((current, total)),
            _ => None,
        }
    }

    pub fn children_status(&self) -> Option<ChildrenStatus> {
        match self.get(MemoryTag::ChildrenStatus)?.value() {
            MemoryValue::Children(status) => Some(*status),
            _ => None,
        }
    }

    pub fn controls(&self) -> Option<&ControlsState> {
        match self.get(MemoryTag::Controls)?.value() {
            MemoryValue::Controls(c) => Some(c),
            _ => None,
        }
    }

    pub fn display_hints(&self) -> Option<&DisplayHints> {
        match self.get(MemoryTag::Display)?.value() {
            MemoryValue::Display(d) => Some(d),
            _ => None,
        }
    }

    pub fn label(&self) -> Option<&str> {
        match &self
            .fragment(MemoryTag::FragmentLabel, FragmentKind::Label)?
            .value
        {
            FragmentValue::Label { text } => Some(text),
            _ => None,
        }
    }
}

impl fmt::Debug for BlockMemory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockMemory")
            .field("locations", &self.locations)
            .field("released", &self.released)
            .finish()
    }
}
