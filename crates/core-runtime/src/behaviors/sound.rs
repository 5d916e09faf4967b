//! Sound cues: milestones carrying a sound name, emitted at lifecycle
//! points or at countdown thresholds.

use std::collections::BTreeSet;

use core_fragments::{Fragment, FragmentOrigin, FragmentValue};

use crate::behavior::Behavior;
use crate::context::{BehaviorContext, BehaviorError};
use crate::events::{EventHandler, EventScope, RuntimeEvent};
use crate::outputs::{OutputKind, OutputMetadata};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SoundTrigger {
    Mount,
    Unmount,
    /// Unmount of a frame that actually completed (vs a plain pop).
    Complete,
    /// Remaining whole seconds of the countdown at which to play.
    Countdown { seconds: Vec<u32> },
}

#[derive(Debug, Clone)]
pub struct SoundCue {
    pub trigger: SoundTrigger,
    pub sound: String,
}

impl SoundCue {
    pub fn new(trigger: SoundTrigger, sound: impl Into<String>) -> Self {
        Self {
            trigger,
            sound: sound.into(),
        }
    }
}

fn play(ctx: &mut BehaviorContext<'_>, sound: &str, remaining_seconds: Option<u32>) {
    let key = ctx.key().clone();
    let fragment = Fragment::new(
        FragmentValue::Action {
            name: sound.to_string(),
        },
        FragmentOrigin::Runtime,
    )
    .with_source(key.clone())
    .with_timestamp(ctx.now());
    let mut metadata = OutputMetadata::labeled(sound).with("sound", sound);
    if let Some(seconds) = remaining_seconds {
        metadata = metadata.with("remaining_seconds", seconds.to_string());
    }
    ctx.emit_output(OutputKind::Milestone, vec![fragment], metadata);
    ctx.emit_event(RuntimeEvent::SoundPlay {
        sound: sound.to_string(),
        key,
        remaining_seconds,
    });
}

/// Plays configured cues. Countdown cues are deduplicated per frame
/// lifetime: each threshold fires at most once, and thresholds skipped by
/// a coarse tick never fire late.
pub struct SoundCueBehavior {
    cues: Vec<SoundCue>,
}

impl SoundCueBehavior {
    pub fn new(cues: Vec<SoundCue>) -> Self {
        Self { cues }
    }
}

impl Behavior for SoundCueBehavior {
    fn name(&self) -> &'static str {
        "sound-cue"
    }

    fn on_mount(&mut self, ctx: &mut BehaviorContext<'_>) -> Result<(), BehaviorError> {
        for cue in &self.cues {
            match &cue.trigger {
                SoundTrigger::Mount => play(ctx, &cue.sound, None),
                SoundTrigger::Countdown { seconds } => ctx.subscribe(
                    "tick",
                    EventScope::Local,
                    Box::new(CountdownCueHandler {
                        sound: cue.sound.clone(),
                        thresholds: seconds.iter().copied().collect(),
                        played: BTreeSet::new(),
                    }),
                ),
                SoundTrigger::Unmount | SoundTrigger::Complete => {}
            }
        }
        Ok(())
    }

    fn on_unmount(&mut self, ctx: &mut BehaviorContext<'_>) -> Result<(), BehaviorError> {
        let completed = ctx.is_complete();
        for cue in &self.cues {
            match cue.trigger {
                SoundTrigger::Unmount => play(ctx, &cue.sound, None),
                SoundTrigger::Complete if completed => play(ctx, &cue.sound, None),
                _ => {}
            }
        }
        Ok(())
    }
}

struct CountdownCueHandler {
    sound: String,
    thresholds: BTreeSet<u32>,
    played: BTreeSet<u32>,
}

impl EventHandler for CountdownCueHandler {
    fn on_event(
        &mut self,
        _event: &RuntimeEvent,
        ctx: &mut BehaviorContext<'_>,
    ) -> Result<(), BehaviorError> {
        let Some(remaining_ms) = ctx.timer_state().and_then(|t| t.remaining(ctx.now())) else {
            return Ok(());
        };
        if remaining_ms == 0 {
            return Ok(());
        }
        // Lowest crossed threshold wins; anything above it is marked played
        // so a coarse tick cannot replay cues it jumped over.
        let crossed: Vec<u32> = self
            .thresholds
            .iter()
            .copied()
            .filter(|s| !self.played.contains(s) && remaining_ms <= u64::from(*s) * 1_000)
            .collect();
        let Some(&lowest) = crossed.first() else {
            return Ok(());
        };
        self.played.extend(crossed);
        play(ctx, &self.sound, Some(lowest));
        Ok(())
    }
}
