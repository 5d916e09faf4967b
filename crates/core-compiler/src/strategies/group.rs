//! Generic group: multi-statement requests and plain child-bearing
//! statements become single-pass containers.

use core_runtime::behaviors::{LoopCondition, SegmentOutputBehavior};
use core_runtime::{CompileError, CompileRequest, CompileServices};
use core_script::CodeStatement;

use crate::builder::{BlockBuilder, ContainerAspect};
use crate::strategies::{CompilationStrategy, PRIORITY_COMPONENT, has_children, label_of};

pub struct GenericGroupStrategy;

impl CompilationStrategy for GenericGroupStrategy {
    fn name(&self) -> &'static str {
        "generic-group"
    }

    fn priority(&self) -> i32 {
        PRIORITY_COMPONENT
    }

    fn matches(&self, statements: &[&CodeStatement], request: &CompileRequest) -> bool {
        if request.is_root {
            return false;
        }
        statements.len() > 1 || (statements.len() == 1 && has_children(statements[0]))
    }

    fn apply(
        &self,
        builder: &mut BlockBuilder,
        statements: &[&CodeStatement],
        _request: &CompileRequest,
        _services: &mut CompileServices<'_>,
    ) -> Result<(), CompileError> {
        if !builder.has_behavior("child-selection") {
            let child_groups = if statements.len() > 1 {
                statements.iter().map(|s| vec![s.id]).collect()
            } else {
                statements[0].children.clone()
            };
            builder.as_container(ContainerAspect {
                child_groups,
                loop_condition: LoopCondition::Never,
                inject_rest: false,
                skip_on_mount: false,
            });
        }
        if let Some(label) = statements.first().and_then(|s| label_of(s)) {
            builder.set_label(label);
        }
        builder.set_block_type("Group");
        builder.add_behavior_if_missing(Box::new(SegmentOutputBehavior::new(false, true)));
        Ok(())
    }
}
