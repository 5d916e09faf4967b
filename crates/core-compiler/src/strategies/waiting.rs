//! Waiting-to-start: an idle frame the athlete advances past to begin.

use core_memory::{DisplayHints, DisplayMode};
use core_runtime::behaviors::{DisplayInitBehavior, LeafExitBehavior, SegmentOutputBehavior};
use core_runtime::{CompileError, CompileRequest, CompileServices};
use core_script::{CodeStatement, hints};

use crate::builder::BlockBuilder;
use crate::strategies::{CompilationStrategy, PRIORITY_LOGIC, label_of};

pub struct WaitingToStartStrategy;

impl CompilationStrategy for WaitingToStartStrategy {
    fn name(&self) -> &'static str {
        "waiting-to-start"
    }

    fn priority(&self) -> i32 {
        PRIORITY_LOGIC
    }

    fn matches(&self, statements: &[&CodeStatement], request: &CompileRequest) -> bool {
        !request.is_root
            && statements.len() == 1
            && statements[0].has_hint(hints::WAITING_TO_START)
    }

    fn apply(
        &self,
        builder: &mut BlockBuilder,
        statements: &[&CodeStatement],
        _request: &CompileRequest,
        _services: &mut CompileServices<'_>,
    ) -> Result<(), CompileError> {
        let label = label_of(statements[0]).unwrap_or_else(|| "Waiting to start".to_string());
        builder.set_block_type("WaitingToStart").set_label(&label);
        builder.add_behavior_if_missing(Box::new(LeafExitBehavior::new()));
        builder.add_behavior_if_missing(Box::new(DisplayInitBehavior::new(DisplayHints::new(
            DisplayMode::Clock,
            label,
        ))));
        // Header only: the waiting frame reports no result of its own.
        builder.add_behavior_if_missing(Box::new(SegmentOutputBehavior::new(true, false)));
        Ok(())
    }
}
