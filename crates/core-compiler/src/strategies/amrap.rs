//! AMRAP: a countdown container looping its children while time remains.

use core_memory::{DisplayHints, DisplayMode};
use core_runtime::behaviors::{
    DisplayInitBehavior, LoopCondition, RoundDisplayBehavior, RoundOutputBehavior,
    SegmentOutputBehavior, TimerOutputBehavior,
};
use core_runtime::{CompileError, CompileRequest, CompileServices};
use core_script::{CodeStatement, hints};
use core_timing::{TimerDirection, TimerRole, format_duration};

use crate::builder::{BlockBuilder, ContainerAspect, RepeaterAspect, TimerAspect};
use crate::strategies::{
    CompilationStrategy, PRIORITY_LOGIC, duration_of, has_children, label_of, rounds_of,
};

pub struct AmrapStrategy;

impl CompilationStrategy for AmrapStrategy {
    fn name(&self) -> &'static str {
        "amrap"
    }

    fn priority(&self) -> i32 {
        PRIORITY_LOGIC
    }

    fn matches(&self, statements: &[&CodeStatement], request: &CompileRequest) -> bool {
        if request.is_root || statements.len() != 1 {
            return false;
        }
        let statement = statements[0];
        statement.has_hint(hints::AMRAP)
            || (duration_of(statement).is_some()
                && has_children(statement)
                && rounds_of(statement).is_none())
    }

    fn apply(
        &self,
        builder: &mut BlockBuilder,
        statements: &[&CodeStatement],
        _request: &CompileRequest,
        _services: &mut CompileServices<'_>,
    ) -> Result<(), CompileError> {
        let statement = statements[0];
        let duration_ms = duration_of(statement).unwrap_or(0);
        let label = label_of(statement)
            .unwrap_or_else(|| format!("AMRAP {}", format_duration(duration_ms)));
        builder.set_block_type("Amrap").set_label(&label);
        builder.as_timer(TimerAspect {
            direction: TimerDirection::Down,
            duration_ms: Some(duration_ms),
            role: TimerRole::Primary,
            add_completion: true,
        });
        // Rounds are open-ended; the timer is the only exit.
        builder.as_repeater(RepeaterAspect {
            total_rounds: None,
            start_round: Some(1),
            add_completion: false,
        });
        builder.as_container(ContainerAspect {
            child_groups: statement.children.clone(),
            loop_condition: LoopCondition::TimerActive,
            inject_rest: true,
            skip_on_mount: false,
        });
        builder.add_behavior_if_missing(Box::new(DisplayInitBehavior::new(DisplayHints::new(
            DisplayMode::Countdown,
            label,
        ))));
        builder.add_behavior_if_missing(Box::new(RoundDisplayBehavior));
        builder.add_behavior_if_missing(Box::new(RoundOutputBehavior::new()));
        builder.add_behavior_if_missing(Box::new(TimerOutputBehavior::tracked()));
        builder.add_behavior_if_missing(Box::new(SegmentOutputBehavior::new(true, true)));
        Ok(())
    }
}
