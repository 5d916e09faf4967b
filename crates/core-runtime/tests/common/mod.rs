//! Shared harness for driver tests: a closure-backed compiler and manual
//! block factories, driven by a hand-advanced clock.
#![allow(dead_code)]

use std::rc::Rc;

use core_fragments::{BlockKey, Fragment, FragmentOrigin, FragmentValue};
use core_memory::{BlockMemory, MemoryTag, MemoryValue};
use core_runtime::behaviors::{
    ChildSelectionBehavior, ChildSelectionConfig, HistoryRecordBehavior, LeafExitBehavior,
    LoopCondition, ReEntryBehavior, RoundOutputBehavior, RoundsEndBehavior,
    SegmentOutputBehavior, TimerCompletionBehavior, TimerConfig, TimerInitBehavior,
    TimerOutputBehavior, TimerPauseBehavior, TimerTickBehavior,
};
use core_runtime::{
    Behavior, BlockCompiler, CompileError, CompileRequest, CompileServices, ManualClock, Runtime,
    RuntimeBlock, RuntimeEvent, RuntimeSettings,
};
use core_script::{CodeStatement, Script};
use core_timing::{TimerDirection, TimerRole};

type CompileFn =
    dyn Fn(&CompileRequest, &mut CompileServices<'_>) -> Result<RuntimeBlock, CompileError>;

/// Test compiler: delegates to a closure.
pub struct FnCompiler(Box<CompileFn>);

impl FnCompiler {
    pub fn new(
        f: impl Fn(&CompileRequest, &mut CompileServices<'_>) -> Result<RuntimeBlock, CompileError>
        + 'static,
    ) -> Box<Self> {
        Box::new(Self(Box::new(f)))
    }
}

impl BlockCompiler for FnCompiler {
    fn compile(
        &self,
        request: &CompileRequest,
        services: &mut CompileServices<'_>,
    ) -> Result<RuntimeBlock, CompileError> {
        (self.0)(request, services)
    }
}

/// Script with statements `1..=n`, rooted at statement 1.
pub fn flat_script(n: u32) -> Script {
    let statements = (1..=n).map(CodeStatement::new).collect();
    Script::new(statements, vec![1]).expect("valid script")
}

pub fn labeled_memory(key: &BlockKey, label: &str) -> BlockMemory {
    let mut memory = BlockMemory::new();
    let fragment = Fragment::new(
        FragmentValue::Label {
            text: label.to_string(),
        },
        FragmentOrigin::Compiler,
    )
    .with_source(key.clone());
    memory
        .push(MemoryTag::FragmentLabel, MemoryValue::Fragments(vec![fragment]))
        .expect("label fits fresh memory");
    memory
}

pub fn timer_behaviors(
    direction: TimerDirection,
    duration_ms: Option<u64>,
    label: &str,
    completion: bool,
) -> Vec<Box<dyn Behavior>> {
    let mut behaviors: Vec<Box<dyn Behavior>> = vec![
        Box::new(TimerInitBehavior::new(TimerConfig {
            direction,
            duration_ms,
            label: label.to_string(),
            role: TimerRole::Primary,
        })),
        Box::new(TimerTickBehavior),
        Box::new(TimerPauseBehavior),
    ];
    if completion {
        behaviors.push(Box::new(TimerCompletionBehavior::new(
            duration_ms.unwrap_or(0),
        )));
    }
    behaviors
}

/// AMRAP-shaped leaf: countdown with completion, unbounded rounds.
pub fn amrap_leaf(key: BlockKey, duration_ms: u64) -> RuntimeBlock {
    let memory = labeled_memory(&key, "AMRAP");
    let mut behaviors = timer_behaviors(TimerDirection::Down, Some(duration_ms), "AMRAP", true);
    behaviors.push(Box::new(ReEntryBehavior::new(Some(1), None)));
    behaviors.push(Box::new(RoundOutputBehavior::new()));
    behaviors.push(Box::new(TimerOutputBehavior::tracked()));
    behaviors.push(Box::new(SegmentOutputBehavior::new(false, true)));
    RuntimeBlock::new(key, "Amrap", vec![1], memory, behaviors)
}

/// EMOM-shaped leaf: countdown plus a bounded repeater.
pub fn emom_leaf(key: BlockKey, duration_ms: u64, rounds: u32) -> RuntimeBlock {
    let memory = labeled_memory(&key, "EMOM");
    let mut behaviors = timer_behaviors(TimerDirection::Down, Some(duration_ms), "EMOM", true);
    behaviors.push(Box::new(ReEntryBehavior::new(Some(1), Some(rounds))));
    behaviors.push(Box::new(RoundsEndBehavior));
    behaviors.push(Box::new(RoundOutputBehavior::new()));
    behaviors.push(Box::new(TimerOutputBehavior::tracked()));
    behaviors.push(Box::new(SegmentOutputBehavior::new(false, true)));
    behaviors.push(Box::new(HistoryRecordBehavior));
    RuntimeBlock::new(key, "Interval", vec![1], memory, behaviors)
}

/// User-advanced exercise leaf with an up-counting timer.
pub fn effort_leaf(key: BlockKey, label: &str) -> RuntimeBlock {
    let memory = labeled_memory(&key, label);
    let mut behaviors = timer_behaviors(TimerDirection::Up, None, label, false);
    behaviors.push(Box::new(LeafExitBehavior::new()));
    behaviors.push(Box::new(TimerOutputBehavior::tracked()));
    behaviors.push(Box::new(SegmentOutputBehavior::new(true, true)));
    behaviors.push(Box::new(HistoryRecordBehavior));
    RuntimeBlock::new(key, "Effort", vec![1], memory, behaviors)
}

/// Countdown container over `child_groups`, looping while its timer runs.
pub fn amrap_container(
    key: BlockKey,
    duration_ms: u64,
    child_groups: Vec<Vec<u32>>,
    inject_rest: bool,
) -> RuntimeBlock {
    let memory = labeled_memory(&key, "AMRAP");
    let mut behaviors = timer_behaviors(TimerDirection::Down, Some(duration_ms), "AMRAP", true);
    behaviors.push(Box::new(ReEntryBehavior::new(Some(1), None)));
    behaviors.push(Box::new(ChildSelectionBehavior::new(ChildSelectionConfig {
        child_groups,
        loop_condition: LoopCondition::TimerActive,
        inject_rest,
        skip_on_mount: false,
    })));
    behaviors.push(Box::new(RoundOutputBehavior::new()));
    behaviors.push(Box::new(TimerOutputBehavior::tracked()));
    behaviors.push(Box::new(SegmentOutputBehavior::new(false, true)));
    RuntimeBlock::new(key, "Amrap", vec![1], memory, behaviors)
}

pub struct Harness {
    pub runtime: Runtime,
    pub clock: Rc<ManualClock>,
}

impl Harness {
    pub fn start(
        script: Script,
        compiler: Box<dyn BlockCompiler>,
        start_ms: u64,
    ) -> Self {
        let clock = ManualClock::starting_at(start_ms);
        let mut runtime = Runtime::new(script, compiler, clock.clone(), RuntimeSettings::default());
        runtime.start().expect("root compiles");
        Self { runtime, clock }
    }

    pub fn next(&mut self) {
        self.runtime.handle(RuntimeEvent::Next);
    }

    /// Advance the clock and deliver one tick per `step_ms` until `ms` have
    /// passed.
    pub fn ticks(&mut self, ms: u64, step_ms: u64) {
        let mut remaining = ms;
        while remaining > 0 {
            let step = step_ms.min(remaining);
            let timestamp = self.clock.advance(step);
            self.runtime.handle(RuntimeEvent::Tick { timestamp });
            remaining -= step;
        }
    }
}
