//! Scripted rest: a countdown that completes by timer.

use core_memory::{DisplayHints, DisplayMode};
use core_runtime::behaviors::{DisplayInitBehavior, SegmentOutputBehavior, TimerOutputBehavior};
use core_runtime::{CompileError, CompileRequest, CompileServices};
use core_script::{CodeStatement, hints};
use core_timing::{TimerDirection, TimerRole, format_duration};

use crate::builder::{BlockBuilder, TimerAspect};
use crate::strategies::{CompilationStrategy, PRIORITY_COMPONENT, duration_of};

pub struct RestBlockStrategy;

impl CompilationStrategy for RestBlockStrategy {
    fn name(&self) -> &'static str {
        "rest-block"
    }

    fn priority(&self) -> i32 {
        PRIORITY_COMPONENT
    }

    fn matches(&self, statements: &[&CodeStatement], request: &CompileRequest) -> bool {
        !request.is_root && statements.len() == 1 && statements[0].has_hint(hints::REST)
    }

    fn apply(
        &self,
        builder: &mut BlockBuilder,
        statements: &[&CodeStatement],
        _request: &CompileRequest,
        _services: &mut CompileServices<'_>,
    ) -> Result<(), CompileError> {
        let duration_ms = duration_of(statements[0]).unwrap_or(0);
        let label = format!("Rest {}", format_duration(duration_ms));
        builder.set_block_type("Rest").set_label(&label);
        builder.as_timer(TimerAspect {
            direction: TimerDirection::Down,
            duration_ms: Some(duration_ms),
            role: TimerRole::Primary,
            add_completion: true,
        });
        builder.add_behavior_if_missing(Box::new(DisplayInitBehavior::new(DisplayHints::new(
            DisplayMode::Countdown,
            label,
        ))));
        builder.add_behavior_if_missing(Box::new(TimerOutputBehavior::tracked()));
        builder.add_behavior_if_missing(Box::new(SegmentOutputBehavior::new(true, true)));
        Ok(())
    }
}
