//! Generic timer: any statement carrying a duration gets countdown
//! machinery unless a logic strategy already shaped it.

use core_memory::{DisplayHints, DisplayMode};
use core_runtime::behaviors::{DisplayInitBehavior, SegmentOutputBehavior, TimerOutputBehavior};
use core_runtime::{CompileError, CompileRequest, CompileServices};
use core_script::{CodeStatement, hints};
use core_timing::{TimerDirection, TimerRole, format_duration};

use crate::builder::{BlockBuilder, TimerAspect};
use crate::strategies::{CompilationStrategy, PRIORITY_COMPONENT, duration_of, label_of};

pub struct GenericTimerStrategy;

impl CompilationStrategy for GenericTimerStrategy {
    fn name(&self) -> &'static str {
        "generic-timer"
    }

    fn priority(&self) -> i32 {
        PRIORITY_COMPONENT
    }

    fn matches(&self, statements: &[&CodeStatement], request: &CompileRequest) -> bool {
        !request.is_root
            && statements.len() == 1
            && (duration_of(statements[0]).is_some() || statements[0].has_hint(hints::TIMER))
    }

    fn apply(
        &self,
        builder: &mut BlockBuilder,
        statements: &[&CodeStatement],
        _request: &CompileRequest,
        _services: &mut CompileServices<'_>,
    ) -> Result<(), CompileError> {
        let statement = statements[0];
        let duration_ms = duration_of(statement);
        let label = label_of(statement).unwrap_or_else(|| {
            duration_ms.map_or_else(|| "Timer".to_string(), format_duration)
        });
        builder.set_block_type("Timer").set_label(&label);
        if !builder.has_behavior("timer-init") {
            builder.as_timer(TimerAspect {
                direction: if duration_ms.is_some() {
                    TimerDirection::Down
                } else {
                    TimerDirection::Up
                },
                duration_ms,
                role: TimerRole::Primary,
                add_completion: duration_ms.is_some(),
            });
        }
        let mode = if duration_ms.is_some() {
            DisplayMode::Countdown
        } else {
            DisplayMode::Timer
        };
        builder.add_behavior_if_missing(Box::new(DisplayInitBehavior::new(DisplayHints::new(
            mode, label,
        ))));
        builder.add_behavior_if_missing(Box::new(TimerOutputBehavior::tracked()));
        builder.add_behavior_if_missing(Box::new(SegmentOutputBehavior::new(true, true)));
        Ok(())
    }
}
