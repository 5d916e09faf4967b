//! Generic loop: bounded rounds and rep schemes (`21-15-9`).

use core_fragments::{Fragment, FragmentOrigin, FragmentValue};
use core_memory::{DisplayHints, DisplayMode};
use core_runtime::behaviors::{
    DisplayInitBehavior, LoopCondition, ReportOutputBehavior, RoundDisplayBehavior,
    RoundOutputBehavior, TimerOutputBehavior,
};
use core_runtime::{CompileError, CompileRequest, CompileServices};
use core_script::CodeStatement;
use core_timing::{TimerDirection, TimerRole};

use crate::builder::{BlockBuilder, ContainerAspect, RepeaterAspect, TimerAspect};
use crate::strategies::{
    CompilationStrategy, PRIORITY_COMPONENT, effort_name, has_children, label_of, rep_scheme,
    rounds_of,
};

pub struct GenericLoopStrategy;

impl CompilationStrategy for GenericLoopStrategy {
    fn name(&self) -> &'static str {
        "generic-loop"
    }

    fn priority(&self) -> i32 {
        PRIORITY_COMPONENT
    }

    fn matches(&self, statements: &[&CodeStatement], request: &CompileRequest) -> bool {
        if request.is_root || statements.len() != 1 {
            return false;
        }
        rounds_of(statements[0]).is_some()
            || rep_scheme(statements[0]).is_some_and(|s| s.len() > 1)
    }

    fn apply(
        &self,
        builder: &mut BlockBuilder,
        statements: &[&CodeStatement],
        _request: &CompileRequest,
        _services: &mut CompileServices<'_>,
    ) -> Result<(), CompileError> {
        let statement = statements[0];
        let scheme = rep_scheme(statement);
        let total_rounds = rounds_of(statement)
            .or_else(|| scheme.as_ref().map(|s| s.len() as u32));
        let label = label_of(statement).unwrap_or_else(|| {
            scheme
                .as_ref()
                .map(|s| {
                    s.iter()
                        .map(u32::to_string)
                        .collect::<Vec<_>>()
                        .join("-")
                })
                .unwrap_or_else(|| "Rounds".to_string())
        });
        builder.set_block_type("Rounds").set_label(&label);
        // For-time loops run an open stopwatch unless a logic strategy
        // already installed a countdown.
        if !builder.has_behavior("timer-init") {
            builder.as_timer(TimerAspect {
                direction: TimerDirection::Up,
                duration_ms: None,
                role: TimerRole::Primary,
                add_completion: false,
            });
        }
        builder.as_repeater(RepeaterAspect {
            total_rounds,
            start_round: Some(1),
            add_completion: true,
        });
        if has_children(statement) {
            builder.as_container(ContainerAspect {
                child_groups: statement.children.clone(),
                loop_condition: LoopCondition::RoundsRemaining,
                inject_rest: false,
                skip_on_mount: false,
            });
        } else if let Some(scheme) = &scheme
            && scheme.len() > 1
            && builder.fragment_groups().is_empty()
        {
            // One display group per scheme entry; the report output splits
            // elapsed time across them by these rep weights.
            let effort = effort_name(statement);
            let groups = scheme
                .iter()
                .map(|&reps| {
                    let mut group = vec![Fragment::new(
                        FragmentValue::Rep {
                            scheme: vec![reps],
                        },
                        FragmentOrigin::Compiler,
                    )];
                    if let Some(name) = &effort {
                        group.push(Fragment::new(
                            FragmentValue::Effort { name: name.clone() },
                            FragmentOrigin::Parser,
                        ));
                    }
                    group
                })
                .collect();
            builder.set_fragment_groups(groups);
            builder.add_behavior_if_missing(Box::new(TimerOutputBehavior::result()));
            builder.add_behavior_if_missing(Box::new(ReportOutputBehavior::new(true)));
        }
        builder.add_behavior_if_missing(Box::new(DisplayInitBehavior::new(DisplayHints::new(
            DisplayMode::Timer,
            label,
        ))));
        builder.add_behavior_if_missing(Box::new(RoundDisplayBehavior));
        builder.add_behavior_if_missing(Box::new(RoundOutputBehavior::new()));
        Ok(())
    }
}
