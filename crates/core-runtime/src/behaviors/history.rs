//! History aspect: one `history:record` event per unmounted frame.

use crate::behavior::Behavior;
use crate::context::{BehaviorContext, BehaviorError};
use crate::events::RuntimeEvent;
use crate::outputs::HistoryRecord;

/// Emits the frame's history record at unmount. Fires for error-completed
/// frames too, so persistence always sees a terminated block.
pub struct HistoryRecordBehavior;

impl Behavior for HistoryRecordBehavior {
    fn name(&self) -> &'static str {
        "history-record"
    }

    fn on_unmount(&mut self, ctx: &mut BehaviorContext<'_>) -> Result<(), BehaviorError> {
        let now = ctx.now();
        let timer = ctx.timer_state().map(|mut t| {
            t.pause(now);
            t
        });
        let rounds = ctx.current_round();
        let record = HistoryRecord {
            block_key: ctx.key().clone(),
            block_type: ctx.block_type().to_string(),
            label: ctx.label(),
            completed_at: now,
            completion_reason: ctx.completion_reason().cloned(),
            elapsed_ms: timer.as_ref().map(|t| t.elapsed(now)),
            timer_direction: timer.as_ref().map(|t| t.direction),
            timer_duration_ms: timer.as_ref().and_then(|t| t.duration_ms),
            completed_rounds: rounds.map(|(current, total)| {
                let finished = current.saturating_sub(1);
                total.map_or(finished, |t| finished.min(t))
            }),
            total_rounds: rounds.and_then(|(_, total)| total),
        };
        ctx.emit_event(RuntimeEvent::HistoryRecord { record });
        Ok(())
    }
}
