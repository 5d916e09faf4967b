//! Time aspect: timer allocation, tick tracking, pause/resume, and
//! countdown completion.

use core_fragments::{Fragment, FragmentOrigin, FragmentValue};
use core_memory::{MemoryTag, MemoryValue};
use core_timing::{TimerDirection, TimerRole, TimerState};

use crate::behavior::Behavior;
use crate::block::CompletionReason;
use crate::context::{BehaviorContext, BehaviorError};
use crate::events::{EventHandler, EventScope, RuntimeEvent};

#[derive(Debug, Clone)]
pub struct TimerConfig {
    pub direction: TimerDirection,
    pub duration_ms: Option<u64>,
    pub label: String,
    pub role: TimerRole,
}

/// Writes the timer fragment with one open span at mount.
pub struct TimerInitBehavior {
    config: TimerConfig,
}

impl TimerInitBehavior {
    pub fn new(config: TimerConfig) -> Self {
        Self { config }
    }
}

impl Behavior for TimerInitBehavior {
    fn name(&self) -> &'static str {
        "timer-init"
    }

    fn on_mount(&mut self, ctx: &mut BehaviorContext<'_>) -> Result<(), BehaviorError> {
        let mut state = TimerState::new(
            self.config.direction,
            self.config.duration_ms,
            self.config.label.clone(),
            self.config.role,
        );
        state.start(ctx.now());
        let fragment = Fragment::new(FragmentValue::Timer { state }, FragmentOrigin::Runtime)
            .with_source(ctx.key().clone());
        ctx.push_memory(MemoryTag::Timer, MemoryValue::Fragments(vec![fragment]))
    }
}

/// Keeps the timer observable while ticks flow. Deliberately writes no
/// memory per tick: elapsed is derived from spans on read. Closes the open
/// span at unmount so results see a sealed timer.
pub struct TimerTickBehavior;

impl Behavior for TimerTickBehavior {
    fn name(&self) -> &'static str {
        "timer-tick"
    }

    fn on_mount(&mut self, ctx: &mut BehaviorContext<'_>) -> Result<(), BehaviorError> {
        ctx.subscribe("tick", EventScope::Bubble, Box::new(TickTraceHandler));
        Ok(())
    }

    fn on_unmount(&mut self, ctx: &mut BehaviorContext<'_>) -> Result<(), BehaviorError> {
        let now = ctx.now();
        ctx.modify_timer(|timer| timer.pause(now))
    }
}

struct TickTraceHandler;

impl EventHandler for TickTraceHandler {
    fn on_event(
        &mut self,
        _event: &RuntimeEvent,
        ctx: &mut BehaviorContext<'_>,
    ) -> Result<(), BehaviorError> {
        if let Some(timer) = ctx.timer_state() {
            tracing::trace!(
                target: "runtime.timer",
                block = %ctx.key(),
                elapsed_ms = timer.elapsed(ctx.now()),
                "tick"
            );
        }
        Ok(())
    }
}

/// Pause/resume plumbing. Both directions are idempotent: pausing a
/// paused timer or resuming a running one is a no-op.
pub struct TimerPauseBehavior;

impl Behavior for TimerPauseBehavior {
    fn name(&self) -> &'static str {
        "timer-pause"
    }

    fn on_mount(&mut self, ctx: &mut BehaviorContext<'_>) -> Result<(), BehaviorError> {
        ctx.subscribe("timer:pause", EventScope::Global, Box::new(PauseHandler));
        ctx.subscribe("timer:resume", EventScope::Global, Box::new(ResumeHandler));
        Ok(())
    }
}

struct PauseHandler;

impl EventHandler for PauseHandler {
    fn on_event(
        &mut self,
        _event: &RuntimeEvent,
        ctx: &mut BehaviorContext<'_>,
    ) -> Result<(), BehaviorError> {
        let now = ctx.now();
        ctx.modify_timer(|timer| timer.pause(now))
    }
}

struct ResumeHandler;

impl EventHandler for ResumeHandler {
    fn on_event(
        &mut self,
        _event: &RuntimeEvent,
        ctx: &mut BehaviorContext<'_>,
    ) -> Result<(), BehaviorError> {
        let now = ctx.now();
        ctx.modify_timer(|timer| timer.resume(now))
    }
}

/// Completes a countdown block when elapsed reaches the duration. A
/// non-positive duration completes at mount, before any tick.
pub struct TimerCompletionBehavior {
    duration_ms: u64,
}

impl TimerCompletionBehavior {
    pub fn new(duration_ms: u64) -> Self {
        Self { duration_ms }
    }
}

impl Behavior for TimerCompletionBehavior {
    fn name(&self) -> &'static str {
        "timer-completion"
    }

    fn on_mount(&mut self, ctx: &mut BehaviorContext<'_>) -> Result<(), BehaviorError> {
        if self.duration_ms == 0 {
            ctx.mark_complete(CompletionReason::TimerExpired);
            return Ok(());
        }
        ctx.subscribe("tick", EventScope::Bubble, Box::new(ExpiryHandler));
        Ok(())
    }
}

struct ExpiryHandler;

impl EventHandler for ExpiryHandler {
    fn on_event(
        &mut self,
        _event: &RuntimeEvent,
        ctx: &mut BehaviorContext<'_>,
    ) -> Result<(), BehaviorError> {
        if let Some(timer) = ctx.timer_state()
            && timer.is_expired(ctx.now())
        {
            ctx.mark_complete(CompletionReason::TimerExpired);
        }
        Ok(())
    }
}
