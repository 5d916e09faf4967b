//! The behavior contract: composable units contributing lifecycle logic
//! to a block. Composition is by list, never inheritance; shared helper
//! code lives in free functions over [`BehaviorContext`].

use crate::context::{BehaviorContext, BehaviorError};

/// A pluggable unit owned by exactly one block. Hooks run in declared
/// order within a phase; earlier behaviors' memory writes are visible to
/// later ones. Stack mutations are queued on the context and execute
/// after the whole chain.
pub trait Behavior {
    /// Stable identifier used by the builder's `has`/`remove`/`get`
    /// operations and by phase-failure logs.
    fn name(&self) -> &'static str;

    fn on_mount(&mut self, _ctx: &mut BehaviorContext<'_>) -> Result<(), BehaviorError> {
        Ok(())
    }

    fn on_next(&mut self, _ctx: &mut BehaviorContext<'_>) -> Result<(), BehaviorError> {
        Ok(())
    }

    fn on_unmount(&mut self, _ctx: &mut BehaviorContext<'_>) -> Result<(), BehaviorError> {
        Ok(())
    }

    /// Final hook after unmount; must not fail.
    fn on_dispose(&mut self, _ctx: &mut BehaviorContext<'_>) {}
}
