//! Per-pattern compilation recipes. Strategies run in priority order over
//! one shared builder: logic strategies (90) decide what the block *is*,
//! component strategies (50) fill in standard machinery, enhancements (20)
//! decorate, and the effort fallback (0) catches bare statements.

use core_fragments::{FragmentKind, FragmentValue, resolve_precedence};
use core_runtime::{CompileError, CompileRequest, CompileServices};
use core_script::CodeStatement;

use crate::builder::BlockBuilder;

mod amrap;
mod effort;
mod group;
mod history;
mod interval;
mod loops;
mod rest;
mod root;
mod sound;
mod timer;
mod waiting;

pub use amrap::AmrapStrategy;
pub use effort::EffortStrategy;
pub use group::GenericGroupStrategy;
pub use history::HistoryStrategy;
pub use interval::IntervalStrategy;
pub use loops::GenericLoopStrategy;
pub use rest::RestBlockStrategy;
pub use root::SessionRootStrategy;
pub use sound::SoundStrategy;
pub use timer::GenericTimerStrategy;
pub use waiting::WaitingToStartStrategy;

/// Priority bands.
pub const PRIORITY_LOGIC: i32 = 90;
pub const PRIORITY_COMPONENT: i32 = 50;
pub const PRIORITY_ENHANCEMENT: i32 = 20;
pub const PRIORITY_FALLBACK: i32 = 0;

pub trait CompilationStrategy {
    fn name(&self) -> &'static str;

    fn priority(&self) -> i32;

    fn matches(&self, statements: &[&CodeStatement], request: &CompileRequest) -> bool;

    fn apply(
        &self,
        builder: &mut BlockBuilder,
        statements: &[&CodeStatement],
        request: &CompileRequest,
        services: &mut CompileServices<'_>,
    ) -> Result<(), CompileError>;
}

// ---- statement shape helpers -----------------------------------------------

pub(crate) fn duration_of(statement: &CodeStatement) -> Option<u64> {
    match resolve_precedence(&statement.fragments, FragmentKind::Duration)?.value {
        FragmentValue::Duration { ms } => Some(ms),
        _ => None,
    }
}

pub(crate) fn rounds_of(statement: &CodeStatement) -> Option<u32> {
    match resolve_precedence(&statement.fragments, FragmentKind::Rounds)?.value {
        FragmentValue::Rounds { total } => Some(total),
        _ => None,
    }
}

/// Per-round rep scheme (`21-15-9`), when one is declared.
pub(crate) fn rep_scheme(statement: &CodeStatement) -> Option<Vec<u32>> {
    match &resolve_precedence(&statement.fragments, FragmentKind::Rep)?.value {
        FragmentValue::Rep { scheme } if !scheme.is_empty() => Some(scheme.clone()),
        _ => None,
    }
}

pub(crate) fn effort_name(statement: &CodeStatement) -> Option<String> {
    if let Some(name) = &statement.exercise_name {
        return Some(name.clone());
    }
    match &resolve_precedence(&statement.fragments, FragmentKind::Effort)?.value {
        FragmentValue::Effort { name } => Some(name.clone()),
        _ => None,
    }
}

/// Best display label a statement offers.
pub(crate) fn label_of(statement: &CodeStatement) -> Option<String> {
    effort_name(statement)
        .or_else(|| {
            match &resolve_precedence(&statement.fragments, FragmentKind::Label)?.value {
                FragmentValue::Label { text } => Some(text.clone()),
                _ => None,
            }
        })
        .or_else(|| {
            match &resolve_precedence(&statement.fragments, FragmentKind::Text)?.value {
                FragmentValue::Text { text } => Some(text.clone()),
                _ => None,
            }
        })
}

pub(crate) fn has_children(statement: &CodeStatement) -> bool {
    statement.children.iter().any(|group| !group.is_empty())
}
