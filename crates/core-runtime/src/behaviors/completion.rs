//! Completion plumbing: the terminal timestamp and event-driven
//! cancellation.

use core_fragments::{Fragment, FragmentKind, FragmentOrigin, FragmentValue, MetricRole};
use core_memory::{MemoryTag, MemoryValue};

use crate::behavior::Behavior;
use crate::block::CompletionReason;
use crate::context::{BehaviorContext, BehaviorError};
use crate::events::{EventHandler, EventScope, RuntimeEvent};

/// Stamps the completion wall timestamp into the tracked results. Added
/// by the builder to every block that does not already carry it; skips
/// the write when a timer output already recorded the instant.
pub struct CompletionTimestampBehavior;

impl Behavior for CompletionTimestampBehavior {
    fn name(&self) -> &'static str {
        "completion-timestamp"
    }

    fn on_unmount(&mut self, ctx: &mut BehaviorContext<'_>) -> Result<(), BehaviorError> {
        let already_stamped = ctx
            .collect_fragments(MemoryTag::FragmentTracked)
            .iter()
            .any(|f| f.kind() == FragmentKind::SystemTime);
        if already_stamped {
            return Ok(());
        }
        let fragment = Fragment::new(
            FragmentValue::SystemTime { at: ctx.now() },
            FragmentOrigin::Runtime,
        )
        .with_role(MetricRole::Recorded)
        .with_source(ctx.key().clone());
        ctx.push_memory(
            MemoryTag::FragmentTracked,
            MemoryValue::Fragments(vec![fragment]),
        )
    }
}

/// Marks the owning frame complete with `cancelled` when the host raises
/// `cancel`. Unwinding proceeds through the normal LIFO unmount path.
pub struct CancelOnEventBehavior;

impl Behavior for CancelOnEventBehavior {
    fn name(&self) -> &'static str {
        "cancel-on-event"
    }

    fn on_mount(&mut self, ctx: &mut BehaviorContext<'_>) -> Result<(), BehaviorError> {
        ctx.subscribe("cancel", EventScope::Global, Box::new(CancelHandler));
        Ok(())
    }
}

struct CancelHandler;

impl EventHandler for CancelHandler {
    fn on_event(
        &mut self,
        _event: &RuntimeEvent,
        ctx: &mut BehaviorContext<'_>,
    ) -> Result<(), BehaviorError> {
        ctx.mark_complete(CompletionReason::Cancelled);
        Ok(())
    }
}
