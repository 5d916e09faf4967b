//! Display aspect: UI hints owned by the block.

use core_fragments::{Fragment, FragmentValue};
use core_memory::DisplayHints;

use crate::behavior::Behavior;
use crate::context::{BehaviorContext, BehaviorError};

/// Writes the block's display hints at mount.
pub struct DisplayInitBehavior {
    hints: DisplayHints,
}

impl DisplayInitBehavior {
    pub fn new(hints: DisplayHints) -> Self {
        Self { hints }
    }
}

impl Behavior for DisplayInitBehavior {
    fn name(&self) -> &'static str {
        "display-init"
    }

    fn on_mount(&mut self, ctx: &mut BehaviorContext<'_>) -> Result<(), BehaviorError> {
        ctx.set_display_hints(self.hints.clone())
    }
}

/// Mirrors the round counter into the display hints.
pub struct RoundDisplayBehavior;

impl RoundDisplayBehavior {
    fn refresh(ctx: &mut BehaviorContext<'_>) -> Result<(), BehaviorError> {
        let Some((current, total)) = ctx.current_round() else {
            return Ok(());
        };
        let image = Fragment::new(
            FragmentValue::CurrentRound { current, total },
            core_fragments::FragmentOrigin::Runtime,
        )
        .image;
        ctx.modify_display(|hints| hints.round_display = Some(image))
    }
}

impl Behavior for RoundDisplayBehavior {
    fn name(&self) -> &'static str {
        "round-display"
    }

    fn on_mount(&mut self, ctx: &mut BehaviorContext<'_>) -> Result<(), BehaviorError> {
        Self::refresh(ctx)
    }

    fn on_next(&mut self, ctx: &mut BehaviorContext<'_>) -> Result<(), BehaviorError> {
        Self::refresh(ctx)
    }
}
