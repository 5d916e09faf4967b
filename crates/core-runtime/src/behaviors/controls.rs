//! Runtime controls: the button/display state the host UI binds to.
//!
//! The owning behavior allocates the `controls` location; mutation goes
//! through the free functions below so there is a single writer and every
//! change raises `controls:changed`.

use core_memory::{ButtonConfig, ControlsDisplayMode, ControlsState, MemoryTag, MemoryValue};

use crate::behavior::Behavior;
use crate::context::{BehaviorContext, BehaviorError};
use crate::events::RuntimeEvent;

pub struct ControlsInitBehavior {
    initial: ControlsState,
}

impl ControlsInitBehavior {
    pub fn new(initial: ControlsState) -> Self {
        Self { initial }
    }
}

impl Behavior for ControlsInitBehavior {
    fn name(&self) -> &'static str {
        "controls-init"
    }

    fn on_mount(&mut self, ctx: &mut BehaviorContext<'_>) -> Result<(), BehaviorError> {
        ctx.push_memory(
            MemoryTag::Controls,
            MemoryValue::Controls(self.initial.clone()),
        )?;
        notify(ctx);
        Ok(())
    }
}

fn notify(ctx: &mut BehaviorContext<'_>) {
    let key = ctx.key().clone();
    ctx.emit_event(RuntimeEvent::ControlsChanged { key });
}

fn modify(
    ctx: &mut BehaviorContext<'_>,
    f: impl FnOnce(&mut ControlsState),
) -> Result<(), BehaviorError> {
    let Some(mut controls) = ctx.controls() else {
        return Ok(());
    };
    f(&mut controls);
    ctx.set_controls(controls)?;
    notify(ctx);
    Ok(())
}

pub fn register_button(
    ctx: &mut BehaviorContext<'_>,
    button: ButtonConfig,
) -> Result<(), BehaviorError> {
    modify(ctx, |controls| {
        controls.buttons.retain(|b| b.id != button.id);
        controls.buttons.push(button);
    })
}

pub fn unregister_button(ctx: &mut BehaviorContext<'_>, id: &str) -> Result<(), BehaviorError> {
    modify(ctx, |controls| controls.buttons.retain(|b| b.id != id))
}

pub fn clear_buttons(ctx: &mut BehaviorContext<'_>) -> Result<(), BehaviorError> {
    modify(ctx, |controls| controls.buttons.clear())
}

pub fn set_display_mode(
    ctx: &mut BehaviorContext<'_>,
    mode: ControlsDisplayMode,
) -> Result<(), BehaviorError> {
    modify(ctx, |controls| controls.display_mode = mode)
}
