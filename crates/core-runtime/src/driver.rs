//! The lifecycle driver: owns the clock, script, compiler, sink, and the
//! stack; routes host events; runs mount/next/unmount chains and executes
//! the actions they queue.
//!
//! The engine is single-threaded and advances only inside [`Runtime::handle`]
//! (or [`Runtime::advance`]/[`Runtime::pop`]). Given a fixed script, tick
//! trace, and user-event trace, the output log and final memory state are
//! identical across runs.

use std::collections::VecDeque;
use std::rc::Rc;

use thiserror::Error;

use crate::actions::RuntimeAction;
use crate::behaviors::rest::rest_block;
use crate::block::{CompletionReason, KeyGenerator, Lifecycle, RuntimeBlock};
use crate::clock::Clock;
use crate::compiler::{BlockCompiler, CompileError, CompileRequest, CompileServices};
use crate::context::BehaviorContext;
use crate::events::RuntimeEvent;
use crate::outputs::OutputSink;
use crate::stack::{BlockStack, StackSnapshot};
use core_memory::{MemoryChange, MemoryTag, SubscriptionId};
use core_script::Script;

/// Hard limits and tuning supplied by the host (see `core-config`).
#[derive(Debug, Clone, Copy)]
pub struct RuntimeSettings {
    /// Pushes beyond this depth fail and complete the current frame with
    /// `error:max-depth`.
    pub max_depth: usize,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self { max_depth: 30 }
    }
}

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("stack depth {depth} would exceed max {max}")]
    StackOverflow { depth: usize, max: usize },
    #[error(transparent)]
    Compile(#[from] CompileError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Mount,
    Next,
    Unmount,
}

pub struct Runtime {
    clock: Rc<dyn Clock>,
    script: Script,
    compiler: Box<dyn BlockCompiler>,
    settings: RuntimeSettings,
    keys: KeyGenerator,
    stack: BlockStack,
    sink: OutputSink,
    queue: VecDeque<RuntimeEvent>,
    started: bool,
}

impl Runtime {
    pub fn new(
        script: Script,
        compiler: Box<dyn BlockCompiler>,
        clock: Rc<dyn Clock>,
        settings: RuntimeSettings,
    ) -> Self {
        Self {
            clock,
            script,
            compiler,
            settings,
            keys: KeyGenerator::new(),
            stack: BlockStack::new(),
            sink: OutputSink::new(),
            queue: VecDeque::new(),
            started: false,
        }
    }

    /// Compile the script root and push it. The run is live afterwards.
    pub fn start(&mut self) -> Result<(), RuntimeError> {
        let request = CompileRequest::root(self.script.root().to_vec());
        let mut services = CompileServices {
            script: &self.script,
            keys: &mut self.keys,
            now: self.clock.now(),
        };
        let root = self.compiler.compile(&request, &mut services)?;
        tracing::info!(target: "runtime.driver", root = %root.key(), "run_start");
        self.started = true;
        self.push_block(root);
        self.settle();
        Ok(())
    }

    /// Route one host event through the engine and settle the stack.
    pub fn handle(&mut self, event: RuntimeEvent) {
        tracing::trace!(target: "runtime.events", event = event.name(), "handle");
        match event {
            RuntimeEvent::Next => self.advance_top(),
            other => self.dispatch(&other),
        }
        self.settle();
    }

    /// Run the next phase on the top frame (the `next` user event).
    pub fn advance(&mut self) {
        self.advance_top();
        self.settle();
    }

    /// Pop the top frame through unmount/dispose.
    pub fn pop(&mut self) {
        self.pop_top();
        self.settle();
    }

    pub fn snapshot(&self) -> StackSnapshot {
        self.stack.snapshot()
    }

    pub fn sink(&self) -> &OutputSink {
        &self.sink
    }

    pub fn stack(&self) -> &BlockStack {
        &self.stack
    }

    pub fn is_finished(&self) -> bool {
        self.started && self.stack.is_empty()
    }

    /// Attach a change subscriber to a live block's memory location. The
    /// subscriber receives notifications on the driver's thread and must
    /// re-read state through [`Runtime::snapshot`] rather than hold
    /// references. Returns `None` when the block or tag is gone.
    pub fn subscribe_memory(
        &mut self,
        block_id: u64,
        tag: MemoryTag,
        subscriber: Box<dyn FnMut(&MemoryChange<'_>)>,
    ) -> Option<SubscriptionId> {
        let index = self.stack.index_of(block_id)?;
        self.stack
            .get_mut(index)?
            .memory
            .get_mut(tag)
            .map(|location| location.subscribe(subscriber))
    }

    // ---- internals -------------------------------------------------------

    fn advance_top(&mut self) {
        let Some(top) = self.stack.top() else { return };
        // A complete frame takes no further behavior work; it is popped
        // immediately.
        if top.is_complete() {
            self.pop_top();
            return;
        }
        let id = top.key().id;
        let index = self.stack.len() - 1;
        let actions = self.run_phase(index, Phase::Next);
        self.execute_actions(id, actions);
    }

    /// Push and mount. On depth overflow the current top frame completes
    /// with `error:max-depth` and the push is dropped.
    fn push_block(&mut self, block: RuntimeBlock) -> bool {
        if self.stack.len() >= self.settings.max_depth {
            tracing::error!(
                target: "runtime.driver",
                block = %block.key(),
                depth = self.stack.len(),
                max = self.settings.max_depth,
                "stack_overflow"
            );
            if let Some(top) = self.stack.top_mut() {
                top.force_complete(CompletionReason::Error("max-depth".into()));
            }
            return false;
        }
        let id = block.key().id;
        self.stack.push(block);
        let index = self.stack.len() - 1;
        let actions = self.run_phase(index, Phase::Mount);
        self.execute_actions(id, actions);
        true
    }

    fn pop_top(&mut self) {
        let Some(top) = self.stack.top() else { return };
        let key = top.key().clone();
        let index = self.stack.len() - 1;
        let actions = self.run_phase(index, Phase::Unmount);
        self.run_dispose(index);
        let mut frame = self.stack.pop().expect("frame present");
        debug_assert_eq!(frame.key(), &key, "unmount raced the stack");
        frame.lifecycle = Lifecycle::Disposed;
        frame.memory.release();
        let event = RuntimeEvent::BlockPopped {
            key: key.clone(),
            block_type: frame.block_type().to_string(),
            reason: frame.completion_reason().cloned(),
            depth: index,
        };
        self.sink.push_event(event.clone());
        self.queue.push_back(event);
        // Terminal actions from the unmount chain run with the frame gone.
        self.execute_actions(key.id, actions);
    }

    /// Run one phase's behavior chain on the frame at `index`. Behaviors
    /// execute in declared order; a failure completes the frame with
    /// `error:<kind>` and stops the chain at the frame boundary.
    fn run_phase(&mut self, index: usize, phase: Phase) -> Vec<RuntimeAction> {
        let now = self.clock.now();
        let Runtime {
            stack, sink, queue, ..
        } = self;
        let Some(frame) = stack.get_mut(index) else {
            return Vec::new();
        };
        match phase {
            Phase::Mount => {
                debug_assert_eq!(frame.lifecycle, Lifecycle::Created);
                frame.lifecycle = Lifecycle::Mounted;
            }
            Phase::Next => debug_assert_eq!(frame.lifecycle, Lifecycle::Mounted),
            Phase::Unmount => {
                assert_eq!(
                    frame.lifecycle,
                    Lifecycle::Mounted,
                    "unmount must run exactly once, after mount"
                );
                frame.lifecycle = Lifecycle::Unmounted;
            }
        }
        let mut behaviors = std::mem::take(&mut frame.behaviors);
        let mut actions = Vec::new();
        for behavior in behaviors.iter_mut() {
            let mut ctx = BehaviorContext::new(frame, sink, now, index);
            let result = match phase {
                Phase::Mount => behavior.on_mount(&mut ctx),
                Phase::Next => behavior.on_next(&mut ctx),
                Phase::Unmount => behavior.on_unmount(&mut ctx),
            };
            actions.extend(ctx.take_actions());
            let emitted = ctx.take_emitted();
            let subscriptions = ctx.take_subscriptions();
            frame.subscriptions.extend(subscriptions);
            for event in emitted {
                sink.push_event(event.clone());
                queue.push_back(event);
            }
            if let Err(err) = result {
                tracing::error!(
                    target: "runtime.driver",
                    block = %frame.key(),
                    phase = ?phase,
                    behavior = behavior.name(),
                    error = %err,
                    "phase_error"
                );
                frame.request_completion(CompletionReason::Error(err.kind().into()));
                break;
            }
        }
        frame.behaviors = behaviors;
        frame.apply_pending_completion();
        actions
    }

    fn run_dispose(&mut self, index: usize) {
        let now = self.clock.now();
        let Runtime { stack, sink, .. } = self;
        let Some(frame) = stack.get_mut(index) else {
            return;
        };
        let mut behaviors = std::mem::take(&mut frame.behaviors);
        for behavior in behaviors.iter_mut() {
            let mut ctx = BehaviorContext::new(frame, sink, now, index);
            behavior.on_dispose(&mut ctx);
        }
        frame.behaviors = behaviors;
    }

    /// Deliver an event to matching subscriptions, bottom to top, skipping
    /// completed frames. Each frame's collected actions execute before the
    /// next frame is visited.
    fn dispatch(&mut self, event: &RuntimeEvent) {
        let ids: Vec<u64> = self.stack.frames().iter().map(|f| f.key().id).collect();
        for id in ids {
            let Some(index) = self.stack.index_of(id) else {
                continue;
            };
            if self.stack.get(index).is_none_or(RuntimeBlock::is_complete) {
                continue;
            }
            let top = self.stack.len() - 1;
            let now = self.clock.now();
            let mut emitted = Vec::new();
            let mut actions = Vec::new();
            {
                let Runtime { stack, sink, .. } = self;
                let frame = stack.get_mut(index).expect("index checked");
                let mut subscriptions = std::mem::take(&mut frame.subscriptions);
                let mut late_subscriptions = Vec::new();
                for subscription in subscriptions.iter_mut() {
                    if subscription.event != event.name()
                        || !subscription.scope.delivers(index, top)
                    {
                        continue;
                    }
                    let mut ctx = BehaviorContext::new(frame, sink, now, index);
                    let result = subscription.handler.on_event(event, &mut ctx);
                    actions.extend(ctx.take_actions());
                    emitted.extend(ctx.take_emitted());
                    late_subscriptions.extend(ctx.take_subscriptions());
                    if let Err(err) = result {
                        tracing::error!(
                            target: "runtime.driver",
                            block = %frame.key(),
                            event = event.name(),
                            error = %err,
                            "handler_error"
                        );
                        frame.request_completion(CompletionReason::Error(err.kind().into()));
                        break;
                    }
                }
                frame.subscriptions = subscriptions;
                frame.subscriptions.extend(late_subscriptions);
                frame.apply_pending_completion();
            }
            for event in emitted {
                self.sink.push_event(event.clone());
                self.queue.push_back(event);
            }
            self.execute_actions(id, actions);
        }
    }

    fn execute_actions(&mut self, origin_id: u64, actions: Vec<RuntimeAction>) {
        for action in actions {
            tracing::trace!(target: "runtime.driver", action = ?action, "execute_action");
            match action {
                RuntimeAction::PushBlock(block) => {
                    self.push_block(block);
                }
                RuntimeAction::PopBlock => self.pop_top(),
                RuntimeAction::CompileChild { statement_ids } => {
                    self.compile_and_push(origin_id, statement_ids);
                }
                RuntimeAction::UpdateNextPreview { statement_ids } => {
                    let Some(index) = self.stack.index_of(origin_id) else {
                        continue;
                    };
                    let key = self.stack.frames()[index].key().clone();
                    let event = RuntimeEvent::NextPreview { key, statement_ids };
                    self.sink.push_event(event);
                }
                RuntimeAction::InjectRest { duration_ms } => {
                    let key = self.keys.allocate("rest");
                    let block = rest_block(key, duration_ms);
                    self.push_block(block);
                }
            }
        }
    }

    /// `CompileChild`: a failed compilation is skipped silently so a
    /// malformed child cannot wedge its parent.
    fn compile_and_push(&mut self, origin_id: u64, statement_ids: Vec<u32>) {
        let promote = self
            .stack
            .index_of(origin_id)
            .map(|index| {
                let frame = &self.stack.frames()[index];
                frame
                    .memory
                    .get_all(MemoryTag::FragmentPromote)
                    .filter_map(|l| l.value().fragments())
                    .flatten()
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        let request = CompileRequest::child(statement_ids, promote);
        let result = {
            let mut services = CompileServices {
                script: &self.script,
                keys: &mut self.keys,
                now: self.clock.now(),
            };
            self.compiler.compile(&request, &mut services)
        };
        match result {
            Ok(block) => {
                self.push_block(block);
            }
            Err(err) => {
                tracing::warn!(
                    target: "runtime.compile",
                    statement_ids = ?request.statement_ids,
                    error = %err,
                    "compile_skipped"
                );
                // The requester continues; its dispatcher must not wait for
                // a child that never mounted.
                if let Some(index) = self.stack.index_of(origin_id) {
                    let event = RuntimeEvent::CompileSkipped {
                        key: self.stack.frames()[index].key().clone(),
                        statement_ids: request.statement_ids.clone(),
                    };
                    self.sink.push_event(event.clone());
                    self.queue.push_back(event);
                }
            }
        }
    }

    /// Drain completions and queued events until the stack is stable: pop
    /// completed frames (unwinding anything stacked above them), then
    /// deliver runtime-emitted events, repeating until neither applies.
    fn settle(&mut self) {
        let mut guard = 0;
        loop {
            guard += 1;
            if guard > 1024 {
                tracing::warn!(target: "runtime.driver", "settle_budget_exhausted");
                break;
            }
            if let Some(lowest) = self.stack.lowest_complete() {
                while self.stack.len() > lowest + 1 {
                    if let Some(top) = self.stack.top_mut()
                        && !top.is_complete()
                    {
                        top.force_complete(CompletionReason::Manual);
                    }
                    self.pop_top();
                }
                // Unmount actions can shrink the stack underneath us;
                // re-derive rather than pop an innocent frame.
                if self.stack.len() == lowest + 1 {
                    self.pop_top();
                }
                continue;
            }
            if let Some(event) = self.queue.pop_front() {
                self.dispatch(&event);
                continue;
            }
            break;
        }
    }
}
