//! Effort fallback: a bare statement becomes a user-advanced exercise
//! leaf with an open stopwatch.

use core_memory::{DisplayHints, DisplayMode};
use core_runtime::behaviors::{
    DisplayInitBehavior, LeafExitBehavior, SegmentOutputBehavior, TimerOutputBehavior,
};
use core_runtime::{CompileError, CompileRequest, CompileServices};
use core_script::CodeStatement;
use core_timing::{TimerDirection, TimerRole};

use crate::builder::{BlockBuilder, TimerAspect};
use crate::strategies::{CompilationStrategy, PRIORITY_FALLBACK, label_of};

pub struct EffortStrategy;

impl CompilationStrategy for EffortStrategy {
    fn name(&self) -> &'static str {
        "effort"
    }

    fn priority(&self) -> i32 {
        PRIORITY_FALLBACK
    }

    fn matches(&self, statements: &[&CodeStatement], request: &CompileRequest) -> bool {
        !request.is_root && statements.len() == 1
    }

    fn apply(
        &self,
        builder: &mut BlockBuilder,
        statements: &[&CodeStatement],
        _request: &CompileRequest,
        _services: &mut CompileServices<'_>,
    ) -> Result<(), CompileError> {
        let label = label_of(statements[0]).unwrap_or_else(|| "Exercise".to_string());
        builder.set_label(&label);
        // A higher strategy already gave the block an exit or dispatch
        // path; only the label contribution applies then.
        let already_shaped = ["timer-init", "re-entry", "child-selection", "leaf-exit"]
            .iter()
            .any(|name| builder.has_behavior(name));
        if already_shaped {
            return Ok(());
        }
        builder.set_block_type("Effort");
        builder.as_timer(TimerAspect {
            direction: TimerDirection::Up,
            duration_ms: None,
            role: TimerRole::Primary,
            add_completion: false,
        });
        builder.add_behavior(Box::new(LeafExitBehavior::new()));
        builder.add_behavior_if_missing(Box::new(DisplayInitBehavior::new(DisplayHints::new(
            DisplayMode::Timer,
            label,
        ))));
        builder.add_behavior_if_missing(Box::new(TimerOutputBehavior::tracked()));
        builder.add_behavior_if_missing(Box::new(SegmentOutputBehavior::new(true, true)));
        Ok(())
    }
}
