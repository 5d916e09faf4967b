//! The behavior vocabulary: everything a block can be composed from.

pub mod children;
pub mod completion;
pub mod controls;
pub mod display;
pub mod history;
pub mod output;
pub mod rest;
pub mod rounds;
pub mod sound;
pub mod timer;

pub use children::{ChildSelectionBehavior, ChildSelectionConfig, LeafExitBehavior, LoopCondition};
pub use completion::{CancelOnEventBehavior, CompletionTimestampBehavior};
pub use controls::ControlsInitBehavior;
pub use display::{DisplayInitBehavior, RoundDisplayBehavior};
pub use history::HistoryRecordBehavior;
pub use output::{
    ReportOutputBehavior, RoundOutputBehavior, SegmentOutputBehavior, TimerOutputBehavior,
    compute_split_time_results,
};
pub use sound::{SoundCue, SoundCueBehavior, SoundTrigger};
pub use timer::{
    TimerCompletionBehavior, TimerConfig, TimerInitBehavior, TimerPauseBehavior, TimerTickBehavior,
};
pub use rounds::{ReEntryBehavior, RoundsEndBehavior};
