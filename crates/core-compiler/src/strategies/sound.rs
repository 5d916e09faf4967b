//! Sound enhancement: cue placement decided by statement shape.

use core_runtime::behaviors::{SoundCue, SoundCueBehavior, SoundTrigger};
use core_runtime::{CompileError, CompileRequest, CompileServices};
use core_script::{CodeStatement, hints};

use crate::builder::BlockBuilder;
use crate::strategies::{CompilationStrategy, PRIORITY_ENHANCEMENT, duration_of};

/// Waiting frames beep the workout in, countdowns beep out their final
/// seconds and on expiry, and user-advanced leaves beep on completion.
/// The session root stays silent.
pub struct SoundStrategy;

impl CompilationStrategy for SoundStrategy {
    fn name(&self) -> &'static str {
        "sound"
    }

    fn priority(&self) -> i32 {
        PRIORITY_ENHANCEMENT
    }

    fn matches(&self, statements: &[&CodeStatement], request: &CompileRequest) -> bool {
        !request.is_root && statements.len() == 1
    }

    fn apply(
        &self,
        builder: &mut BlockBuilder,
        statements: &[&CodeStatement],
        _request: &CompileRequest,
        _services: &mut CompileServices<'_>,
    ) -> Result<(), CompileError> {
        if builder.has_behavior("sound-cue") {
            return Ok(());
        }
        let statement = statements[0];
        let cues = if statement.has_hint(hints::WAITING_TO_START) {
            vec![SoundCue::new(SoundTrigger::Unmount, "start-beep")]
        } else if duration_of(statement).is_some() {
            vec![
                SoundCue::new(
                    SoundTrigger::Countdown {
                        seconds: vec![3, 2, 1],
                    },
                    "countdown-beep",
                ),
                SoundCue::new(SoundTrigger::Complete, "timer-beep"),
            ]
        } else {
            vec![SoundCue::new(SoundTrigger::Complete, "completion-beep")]
        };
        // Ahead of the output emitters so cue milestones precede the
        // block's completion record in the log. When the emitters are not
        // composed yet (fallback recipes), they land after the cue anyway.
        let anchor = if builder.has_behavior("report-output") {
            "report-output"
        } else {
            "segment-output"
        };
        builder.insert_behavior_before(anchor, Box::new(SoundCueBehavior::new(cues)));
        Ok(())
    }
}
