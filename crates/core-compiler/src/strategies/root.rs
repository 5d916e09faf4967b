//! Session root: the container compiled for the script's root sequence.

use core_memory::{ButtonConfig, ControlsDisplayMode, ControlsState};
use core_runtime::behaviors::{
    CancelOnEventBehavior, ControlsInitBehavior, LoopCondition, SegmentOutputBehavior,
};
use core_runtime::{CompileError, CompileRequest, CompileServices};
use core_script::CodeStatement;

use crate::builder::{BlockBuilder, ContainerAspect};
use crate::strategies::{CompilationStrategy, PRIORITY_LOGIC};

/// Wraps the root statements in a session container: each root statement
/// becomes one dispatch group, executed once in order. Session-level
/// controls and cancellation live here.
pub struct SessionRootStrategy;

impl CompilationStrategy for SessionRootStrategy {
    fn name(&self) -> &'static str {
        "session-root"
    }

    fn priority(&self) -> i32 {
        PRIORITY_LOGIC
    }

    fn matches(&self, _statements: &[&CodeStatement], request: &CompileRequest) -> bool {
        request.is_root
    }

    fn apply(
        &self,
        builder: &mut BlockBuilder,
        _statements: &[&CodeStatement],
        request: &CompileRequest,
        _services: &mut CompileServices<'_>,
    ) -> Result<(), CompileError> {
        builder.set_block_type("Session").set_label("Session");
        builder.as_container(ContainerAspect {
            child_groups: request
                .statement_ids
                .iter()
                .map(|&id| vec![id])
                .collect(),
            loop_condition: LoopCondition::Never,
            inject_rest: false,
            skip_on_mount: false,
        });
        builder.add_behavior_if_missing(Box::new(ControlsInitBehavior::new(ControlsState {
            buttons: vec![
                ButtonConfig {
                    id: "next".to_string(),
                    label: "Next".to_string(),
                    event: "next".to_string(),
                },
                ButtonConfig {
                    id: "pause".to_string(),
                    label: "Pause".to_string(),
                    event: "timer:pause".to_string(),
                },
                ButtonConfig {
                    id: "resume".to_string(),
                    label: "Resume".to_string(),
                    event: "timer:resume".to_string(),
                },
            ],
            display_mode: ControlsDisplayMode::Timer,
        })));
        builder.add_behavior_if_missing(Box::new(CancelOnEventBehavior));
        builder.add_behavior_if_missing(Box::new(SegmentOutputBehavior::new(false, true)));
        Ok(())
    }
}
