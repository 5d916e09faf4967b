//! The synthetic rest block a container injects between passes. Compiled
//! rest statements go through the strategy chain; this composition covers
//! the runtime-sized variant where no statement exists.

use core_fragments::{BlockKey, Fragment, FragmentOrigin, FragmentValue};
use core_memory::{BlockMemory, DisplayHints, DisplayMode, MemoryTag, MemoryValue};
use core_timing::{TimerDirection, TimerRole, format_duration};

use crate::block::RuntimeBlock;

use super::{
    CompletionTimestampBehavior, DisplayInitBehavior, SegmentOutputBehavior, SoundCue,
    SoundCueBehavior, SoundTrigger, TimerCompletionBehavior, TimerConfig, TimerInitBehavior,
    TimerPauseBehavior, TimerTickBehavior, TimerOutputBehavior,
};

pub const REST_BLOCK_TYPE: &str = "Rest";

/// A countdown frame that completes by timer and reports its segment.
pub fn rest_block(key: BlockKey, duration_ms: u64) -> RuntimeBlock {
    let label = format!("Rest {}", format_duration(duration_ms));
    let mut memory = BlockMemory::new();
    let label_fragment = Fragment::new(
        FragmentValue::Label {
            text: label.clone(),
        },
        FragmentOrigin::Runtime,
    )
    .with_source(key.clone());
    memory
        .push(
            MemoryTag::FragmentLabel,
            MemoryValue::Fragments(vec![label_fragment]),
        )
        .expect("fresh memory accepts the label");
    RuntimeBlock::new(
        key,
        REST_BLOCK_TYPE,
        Vec::new(),
        memory,
        vec![
            Box::new(TimerInitBehavior::new(TimerConfig {
                direction: TimerDirection::Down,
                duration_ms: Some(duration_ms),
                label: label.clone(),
                role: TimerRole::Primary,
            })),
            Box::new(TimerTickBehavior),
            Box::new(TimerPauseBehavior),
            Box::new(TimerCompletionBehavior::new(duration_ms)),
            Box::new(DisplayInitBehavior::new(DisplayHints::new(
                DisplayMode::Countdown,
                label,
            ))),
            Box::new(TimerOutputBehavior::tracked()),
            Box::new(SoundCueBehavior::new(vec![SoundCue::new(
                SoundTrigger::Countdown {
                    seconds: vec![3, 2, 1],
                },
                "countdown-beep",
            )])),
            Box::new(SegmentOutputBehavior::new(true, true)),
            Box::new(CompletionTimestampBehavior),
        ],
    )
}
