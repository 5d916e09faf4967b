//! Control flow: child dispatch, looping, rest injection, and leaf exit.

use std::cell::RefCell;
use std::rc::Rc;

use core_fragments::{Fragment, FragmentOrigin, FragmentValue};
use core_memory::{ChildrenStatus, MemoryTag, MemoryValue};

use crate::actions::RuntimeAction;
use crate::behavior::Behavior;
use crate::block::CompletionReason;
use crate::context::{BehaviorContext, BehaviorError};
use crate::events::{EventHandler, EventScope, RuntimeEvent};

/// When a container that exhausted its groups starts another pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopCondition {
    Never,
    Always,
    /// Loop while the block's countdown still has time left.
    TimerActive,
    /// Loop while the round counter has not passed its total.
    RoundsRemaining,
}

#[derive(Debug, Clone)]
pub struct ChildSelectionConfig {
    /// Statement ids grouped per dispatch.
    pub child_groups: Vec<Vec<u32>>,
    pub loop_condition: LoopCondition,
    /// Fill the remaining countdown with a rest block between passes.
    pub inject_rest: bool,
    /// Defer the first dispatch to the first `next` instead of mount.
    pub skip_on_mount: bool,
}

/// Dispatch progress shared between the behavior and its pop handler.
#[derive(Debug, Default)]
struct ChildState {
    child_index: usize,
    awaiting_child: bool,
    rest_active: bool,
}

/// Owns the child-dispatch state machine. Children advance on two paths:
/// the pop of a direct child (so timer-completed children chain without a
/// user event) and `on_next` when the container itself is on top.
pub struct ChildSelectionBehavior {
    config: Rc<ChildSelectionConfig>,
    state: Rc<RefCell<ChildState>>,
}

impl ChildSelectionBehavior {
    pub fn new(config: ChildSelectionConfig) -> Self {
        Self {
            config: Rc::new(config),
            state: Rc::new(RefCell::new(ChildState::default())),
        }
    }
}

impl Behavior for ChildSelectionBehavior {
    fn name(&self) -> &'static str {
        "child-selection"
    }

    fn on_mount(&mut self, ctx: &mut BehaviorContext<'_>) -> Result<(), BehaviorError> {
        let total = self.config.child_groups.len();
        ctx.set_children_status(ChildrenStatus {
            child_index: 0,
            total_children: total,
            all_executed: total == 0,
            all_completed: false,
        })?;
        ctx.subscribe(
            "block:popped",
            EventScope::Local,
            Box::new(ChildPoppedHandler {
                config: self.config.clone(),
                state: self.state.clone(),
            }),
        );
        ctx.subscribe(
            "compile:skipped",
            EventScope::Local,
            Box::new(CompileSkippedHandler {
                config: self.config.clone(),
                state: self.state.clone(),
            }),
        );
        if !self.config.skip_on_mount && total > 0 {
            dispatch_group(&self.config, &mut self.state.borrow_mut(), ctx)?;
        }
        Ok(())
    }

    fn on_next(&mut self, ctx: &mut BehaviorContext<'_>) -> Result<(), BehaviorError> {
        let mut state = self.state.borrow_mut();
        if state.awaiting_child || state.rest_active {
            // A dispatched frame is still live; the event belongs to it.
            return Ok(());
        }
        if state.child_index < self.config.child_groups.len() {
            dispatch_group(&self.config, &mut state, ctx)
        } else {
            wrap_or_complete(&self.config, &mut state, ctx)
        }
    }
}

struct ChildPoppedHandler {
    config: Rc<ChildSelectionConfig>,
    state: Rc<RefCell<ChildState>>,
}

impl EventHandler for ChildPoppedHandler {
    fn on_event(
        &mut self,
        event: &RuntimeEvent,
        ctx: &mut BehaviorContext<'_>,
    ) -> Result<(), BehaviorError> {
        let RuntimeEvent::BlockPopped { depth, .. } = event else {
            return Ok(());
        };
        // Only pops of a direct child matter; grandchildren are the
        // dispatched child's business.
        if *depth != ctx.stack_level() + 1 {
            return Ok(());
        }
        let mut state = self.state.borrow_mut();
        if state.rest_active {
            state.rest_active = false;
            return dispatch_group(&self.config, &mut state, ctx);
        }
        if !state.awaiting_child {
            return Ok(());
        }
        state.awaiting_child = false;
        if state.child_index < self.config.child_groups.len() {
            dispatch_group(&self.config, &mut state, ctx)
        } else {
            wrap_or_complete(&self.config, &mut state, ctx)
        }
    }
}

struct CompileSkippedHandler {
    config: Rc<ChildSelectionConfig>,
    state: Rc<RefCell<ChildState>>,
}

impl EventHandler for CompileSkippedHandler {
    fn on_event(
        &mut self,
        event: &RuntimeEvent,
        ctx: &mut BehaviorContext<'_>,
    ) -> Result<(), BehaviorError> {
        let RuntimeEvent::CompileSkipped { key, .. } = event else {
            return Ok(());
        };
        if key != ctx.key() {
            return Ok(());
        }
        let mut state = self.state.borrow_mut();
        if state.rest_active {
            // The injected rest never mounted; carry on without it.
            state.rest_active = false;
            return dispatch_group(&self.config, &mut state, ctx);
        }
        if !state.awaiting_child {
            return Ok(());
        }
        state.awaiting_child = false;
        if state.child_index < self.config.child_groups.len() {
            dispatch_group(&self.config, &mut state, ctx)
        } else {
            wrap_or_complete(&self.config, &mut state, ctx)
        }
    }
}

fn write_status(
    config: &ChildSelectionConfig,
    state: &ChildState,
    ctx: &mut BehaviorContext<'_>,
    all_completed: bool,
) -> Result<(), BehaviorError> {
    let total = config.child_groups.len();
    ctx.set_children_status(ChildrenStatus {
        child_index: state.child_index,
        total_children: total,
        all_executed: state.child_index >= total,
        all_completed,
    })
}

fn dispatch_group(
    config: &ChildSelectionConfig,
    state: &mut ChildState,
    ctx: &mut BehaviorContext<'_>,
) -> Result<(), BehaviorError> {
    let index = state.child_index;
    let Some(group) = config.child_groups.get(index) else {
        return Err(BehaviorError::Contract(format!(
            "dispatch index {index} out of {} groups",
            config.child_groups.len()
        )));
    };
    tracing::debug!(
        target: "runtime.children",
        block = %ctx.key(),
        group = index,
        statements = ?group,
        "dispatch_child"
    );
    ctx.queue_action(RuntimeAction::CompileChild {
        statement_ids: group.clone(),
    });
    let preview = config
        .child_groups
        .get(index + 1)
        .or_else(|| {
            (config.loop_condition != LoopCondition::Never)
                .then(|| config.child_groups.first())
                .flatten()
        })
        .cloned()
        .unwrap_or_default();
    if !preview.is_empty() {
        ctx.queue_action(RuntimeAction::UpdateNextPreview {
            statement_ids: preview,
        });
    }
    state.child_index = index + 1;
    state.awaiting_child = true;
    write_status(config, state, ctx, false)
}

/// End of a pass: every group dispatched and the last child popped.
fn wrap_or_complete(
    config: &ChildSelectionConfig,
    state: &mut ChildState,
    ctx: &mut BehaviorContext<'_>,
) -> Result<(), BehaviorError> {
    write_status(config, state, ctx, true)?;
    if config.loop_condition != LoopCondition::Never
        && let Some((current, total)) = ctx.current_round()
    {
        let next_round = current + 1;
        ctx.set_round(next_round, total)?;
        refresh_promote(ctx, next_round, total)?;
    }
    if should_loop(config, ctx) {
        state.child_index = 0;
        if config.inject_rest {
            let remaining = ctx
                .timer_state()
                .and_then(|t| t.remaining(ctx.now()))
                .unwrap_or(0);
            if remaining > 0 {
                // Rest first; the pop handler restarts dispatch afterwards.
                state.rest_active = true;
                ctx.queue_action(RuntimeAction::InjectRest {
                    duration_ms: remaining,
                });
                return Ok(());
            }
        }
        dispatch_group(config, state, ctx)
    } else {
        let reason = match config.loop_condition {
            LoopCondition::RoundsRemaining => CompletionReason::RoundsExhausted,
            _ => CompletionReason::ChildrenComplete,
        };
        ctx.mark_complete(reason);
        Ok(())
    }
}

fn should_loop(config: &ChildSelectionConfig, ctx: &BehaviorContext<'_>) -> bool {
    match config.loop_condition {
        LoopCondition::Never => false,
        LoopCondition::Always => true,
        LoopCondition::TimerActive => ctx
            .timer_state()
            .and_then(|t| t.remaining(ctx.now()))
            .is_some_and(|remaining| remaining > 0),
        LoopCondition::RoundsRemaining => match ctx.current_round() {
            Some((current, Some(total))) => current <= total,
            Some((_, None)) => true,
            None => false,
        },
    }
}

/// Re-inject the new round into children compiled for the next pass.
fn refresh_promote(
    ctx: &mut BehaviorContext<'_>,
    round: u32,
    total: Option<u32>,
) -> Result<(), BehaviorError> {
    let fragment = Fragment::new(
        FragmentValue::CurrentRound {
            current: round,
            total,
        },
        FragmentOrigin::Runtime,
    )
    .with_source(ctx.key().clone());
    let value = MemoryValue::Fragments(vec![fragment]);
    if ctx.get_memory(MemoryTag::FragmentPromote).is_some() {
        ctx.update_memory(MemoryTag::FragmentPromote, value)
    } else {
        ctx.push_memory(MemoryTag::FragmentPromote, value)
    }
}

/// Completes a leaf on `next` (or on a configured completion event).
pub struct LeafExitBehavior {
    completion_events: Vec<String>,
}

impl LeafExitBehavior {
    pub fn new() -> Self {
        Self {
            completion_events: Vec::new(),
        }
    }

    pub fn with_completion_events(events: Vec<String>) -> Self {
        Self {
            completion_events: events,
        }
    }
}

impl Default for LeafExitBehavior {
    fn default() -> Self {
        Self::new()
    }
}

impl Behavior for LeafExitBehavior {
    fn name(&self) -> &'static str {
        "leaf-exit"
    }

    fn on_mount(&mut self, ctx: &mut BehaviorContext<'_>) -> Result<(), BehaviorError> {
        for event in &self.completion_events {
            ctx.subscribe(
                event.clone(),
                EventScope::Local,
                Box::new(CompleteOnEventHandler {
                    event: event.clone(),
                }),
            );
        }
        Ok(())
    }

    fn on_next(&mut self, ctx: &mut BehaviorContext<'_>) -> Result<(), BehaviorError> {
        ctx.mark_complete(CompletionReason::UserAdvance);
        Ok(())
    }
}

struct CompleteOnEventHandler {
    event: String,
}

impl EventHandler for CompleteOnEventHandler {
    fn on_event(
        &mut self,
        _event: &RuntimeEvent,
        ctx: &mut BehaviorContext<'_>,
    ) -> Result<(), BehaviorError> {
        ctx.mark_complete(CompletionReason::Event(self.event.clone()));
        Ok(())
    }
}
