//! History enhancement: every block reports a history record at unmount.

use core_runtime::behaviors::HistoryRecordBehavior;
use core_runtime::{CompileError, CompileRequest, CompileServices};
use core_script::CodeStatement;

use crate::builder::BlockBuilder;
use crate::strategies::{CompilationStrategy, PRIORITY_ENHANCEMENT};

pub struct HistoryStrategy;

impl CompilationStrategy for HistoryStrategy {
    fn name(&self) -> &'static str {
        "history"
    }

    fn priority(&self) -> i32 {
        PRIORITY_ENHANCEMENT
    }

    fn matches(&self, _statements: &[&CodeStatement], _request: &CompileRequest) -> bool {
        true
    }

    fn apply(
        &self,
        builder: &mut BlockBuilder,
        _statements: &[&CodeStatement],
        _request: &CompileRequest,
        _services: &mut CompileServices<'_>,
    ) -> Result<(), CompileError> {
        builder.add_behavior_if_missing(Box::new(HistoryRecordBehavior));
        Ok(())
    }
}
