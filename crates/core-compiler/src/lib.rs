//! JIT compilation: a priority-ordered strategy chain turns parsed
//! statements into composed runtime blocks.
//!
//! Every matching strategy gets a turn on the shared [`BlockBuilder`]:
//! higher priorities shape the block, lower priorities enhance it, and the
//! builder assembles memory and behaviors into the final frame.

use core_fragments::FragmentValue;
use core_runtime::{
    BlockCompiler, CompileError, CompileRequest, CompileServices, RuntimeBlock,
};

pub mod builder;
pub mod strategies;

pub use builder::{BlockBuilder, ContainerAspect, RepeaterAspect, TimerAspect};
pub use strategies::{
    AmrapStrategy, CompilationStrategy, EffortStrategy, GenericGroupStrategy,
    GenericLoopStrategy, GenericTimerStrategy, HistoryStrategy, IntervalStrategy,
    RestBlockStrategy, SessionRootStrategy, SoundStrategy, WaitingToStartStrategy,
};

pub struct JitCompiler {
    strategies: Vec<Box<dyn CompilationStrategy>>,
}

impl JitCompiler {
    /// Strategies are ordered by priority (descending, stable) once at
    /// construction.
    pub fn new(mut strategies: Vec<Box<dyn CompilationStrategy>>) -> Self {
        strategies.sort_by_key(|s| std::cmp::Reverse(s.priority()));
        Self { strategies }
    }

    /// The full pattern vocabulary: session root, AMRAP, EMOM,
    /// waiting-to-start, rest, timers, loops, groups, sound and history
    /// enhancements, and the effort fallback.
    pub fn with_default_strategies() -> Self {
        Self::new(vec![
            Box::new(SessionRootStrategy),
            Box::new(AmrapStrategy),
            Box::new(IntervalStrategy),
            Box::new(WaitingToStartStrategy),
            Box::new(RestBlockStrategy),
            Box::new(GenericLoopStrategy),
            Box::new(GenericTimerStrategy),
            Box::new(GenericGroupStrategy),
            Box::new(SoundStrategy),
            Box::new(HistoryStrategy),
            Box::new(EffortStrategy),
        ])
    }

    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }
}

impl BlockCompiler for JitCompiler {
    fn compile(
        &self,
        request: &CompileRequest,
        services: &mut CompileServices<'_>,
    ) -> Result<RuntimeBlock, CompileError> {
        let statements = services.script.resolve(&request.statement_ids)?;
        let mut builder = BlockBuilder::new();
        builder.set_source_ids(request.statement_ids.clone());
        let mut matched = false;
        for strategy in &self.strategies {
            if !strategy.matches(&statements, request) {
                continue;
            }
            tracing::trace!(
                target: "runtime.compile",
                strategy = strategy.name(),
                priority = strategy.priority(),
                statements = ?request.statement_ids,
                "strategy_applied"
            );
            strategy.apply(&mut builder, &statements, request, services)?;
            matched = true;
        }
        if !matched {
            return Err(CompileError::NoStrategy {
                statement_ids: request.statement_ids.clone(),
            });
        }
        // Promoted fragments ride along as an extra display group, and the
        // parent's round number lands in the key tag (`squats:2`).
        let round = request
            .promote
            .iter()
            .find_map(|f| match f.value {
                FragmentValue::CurrentRound { current, .. } => Some(current),
                _ => None,
            })
            .unwrap_or(1);
        if !request.promote.is_empty() {
            builder.add_fragment_group(request.promote.clone());
        }
        let tag = format!(
            "{}:{round}",
            builder::slug(builder.label().unwrap_or("block"))
        );
        builder.set_key(services.keys.allocate(tag));
        builder.build(services.keys)
    }
}
