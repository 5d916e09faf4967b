//! Tick dispatch throughput across a nested stack.

use criterion::{BatchSize, Criterion, criterion_group, criterion_main};

use core_fragments::{Fragment, FragmentOrigin, FragmentValue};
use core_memory::{BlockMemory, MemoryTag, MemoryValue};
use core_runtime::behaviors::{
    ChildSelectionBehavior, ChildSelectionConfig, LoopCondition, TimerCompletionBehavior,
    TimerConfig, TimerInitBehavior, TimerPauseBehavior, TimerTickBehavior,
};
use core_runtime::{
    BlockCompiler, CompileError, CompileRequest, CompileServices, ManualClock, Runtime,
    RuntimeBlock, RuntimeEvent, RuntimeSettings,
};
use core_script::{CodeStatement, Script};
use core_timing::{TimerDirection, TimerRole};

struct NestedCompiler {
    depth: usize,
}

impl BlockCompiler for NestedCompiler {
    fn compile(
        &self,
        request: &CompileRequest,
        services: &mut CompileServices<'_>,
    ) -> Result<RuntimeBlock, CompileError> {
        let level = if request.is_root {
            0
        } else {
            request.statement_ids[0] as usize
        };
        let key = services.keys.allocate(format!("level-{level}"));
        let mut memory = BlockMemory::new();
        memory
            .push(
                MemoryTag::FragmentLabel,
                MemoryValue::Fragments(vec![Fragment::new(
                    FragmentValue::Label {
                        text: format!("level-{level}"),
                    },
                    FragmentOrigin::Compiler,
                )]),
            )
            .expect("fresh memory");
        let mut behaviors: Vec<Box<dyn core_runtime::Behavior>> = vec![
            Box::new(TimerInitBehavior::new(TimerConfig {
                direction: TimerDirection::Down,
                duration_ms: Some(3_600_000),
                label: format!("level-{level}"),
                role: TimerRole::Auto,
            })),
            Box::new(TimerTickBehavior),
            Box::new(TimerPauseBehavior),
            Box::new(TimerCompletionBehavior::new(3_600_000)),
        ];
        if level + 1 < self.depth {
            behaviors.push(Box::new(ChildSelectionBehavior::new(ChildSelectionConfig {
                child_groups: vec![vec![level as u32 + 1]],
                loop_condition: LoopCondition::Never,
                inject_rest: false,
                skip_on_mount: false,
            })));
        }
        Ok(RuntimeBlock::new(key, "Timer", vec![], memory, behaviors))
    }
}

fn script(depth: usize) -> Script {
    let statements = (0..depth as u32).map(CodeStatement::new).collect();
    Script::new(statements, vec![0]).expect("valid script")
}

fn bench_ticks(c: &mut Criterion) {
    for depth in [1usize, 4, 8] {
        c.bench_function(&format!("tick_dispatch_depth_{depth}"), |b| {
            b.iter_batched(
                || {
                    let clock = ManualClock::starting_at(0);
                    let mut runtime = Runtime::new(
                        script(depth),
                        Box::new(NestedCompiler { depth }),
                        clock.clone(),
                        RuntimeSettings::default(),
                    );
                    runtime.start().expect("root compiles");
                    (runtime, clock)
                },
                |(mut runtime, clock)| {
                    for _ in 0..100 {
                        let timestamp = clock.advance(100);
                        runtime.handle(RuntimeEvent::Tick { timestamp });
                    }
                    runtime
                },
                BatchSize::SmallInput,
            );
        });
    }
}

criterion_group!(benches, bench_ticks);
criterion_main!(benches);
