//! Iteration aspect: round counting and bounded-round completion.

use crate::behavior::Behavior;
use crate::block::CompletionReason;
use crate::context::{BehaviorContext, BehaviorError};

/// Seeds the round counter at mount and advances it on `next` whenever
/// the previous pass is finished. For leaf repeaters (no `children:status`
/// tag) every `next` is a finished pass; for containers the dispatcher
/// owns advancement at wrap time and this behavior stays out of the way.
pub struct ReEntryBehavior {
    start_round: u32,
    total: Option<u32>,
}

impl ReEntryBehavior {
    pub fn new(start_round: Option<u32>, total: Option<u32>) -> Self {
        Self {
            start_round: start_round.unwrap_or(1),
            total,
        }
    }
}

impl Behavior for ReEntryBehavior {
    fn name(&self) -> &'static str {
        "re-entry"
    }

    fn on_mount(&mut self, ctx: &mut BehaviorContext<'_>) -> Result<(), BehaviorError> {
        ctx.set_round(self.start_round, self.total)
    }

    fn on_next(&mut self, ctx: &mut BehaviorContext<'_>) -> Result<(), BehaviorError> {
        let pass_finished = ctx
            .children_status()
            .is_none_or(|status| status.all_completed);
        if !pass_finished {
            return Ok(());
        }
        let Some((current, total)) = ctx.current_round() else {
            return Ok(());
        };
        ctx.set_round(current + 1, total)
    }
}

/// Completes a bounded repeater once the counter passes its total.
/// Unbounded rounds (`total` absent) never exhaust.
pub struct RoundsEndBehavior;

impl Behavior for RoundsEndBehavior {
    fn name(&self) -> &'static str {
        "rounds-end"
    }

    fn on_next(&mut self, ctx: &mut BehaviorContext<'_>) -> Result<(), BehaviorError> {
        if let Some((current, Some(total))) = ctx.current_round()
            && current > total
        {
            ctx.mark_complete(CompletionReason::RoundsExhausted);
        }
        Ok(())
    }
}
