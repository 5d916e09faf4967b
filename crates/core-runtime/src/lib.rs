//! The execution engine: a push/pop stack of stateful frames driven by
//! external ticks and user events.
//!
//! A compiled block carries an ordered behavior list and tagged memory
//! locations. The driver mounts blocks as they are pushed, routes events
//! to scoped subscriptions, advances the top frame on `next`, and unwinds
//! completed frames through unmount/dispose, collecting segment,
//! milestone, and completion records on the output sink.

pub mod actions;
pub mod behavior;
pub mod behaviors;
pub mod block;
pub mod clock;
pub mod compiler;
pub mod context;
pub mod driver;
pub mod events;
pub mod outputs;
pub mod stack;

pub use actions::RuntimeAction;
pub use behavior::Behavior;
pub use block::{CompletionReason, KeyGenerator, Lifecycle, RuntimeBlock};
pub use clock::{Clock, ManualClock, WallClock};
pub use compiler::{BlockCompiler, CompileError, CompileRequest, CompileServices};
pub use context::{BehaviorContext, BehaviorError};
pub use driver::{Runtime, RuntimeError, RuntimeSettings};
pub use events::{EventHandler, EventScope, RuntimeEvent, Subscription};
pub use outputs::{HistoryRecord, OutputKind, OutputMetadata, OutputRecord, OutputSink};
pub use stack::{BlockStack, FrameSnapshot, StackSnapshot};
