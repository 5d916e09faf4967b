//! Statement builders and a scripted-run harness for compiler tests.
#![allow(dead_code)]

use std::collections::BTreeSet;
use std::rc::Rc;

use core_compiler::JitCompiler;
use core_fragments::{Fragment, FragmentOrigin, FragmentValue};
use core_runtime::{ManualClock, Runtime, RuntimeEvent, RuntimeSettings};
use core_script::{CodeStatement, Script};

pub fn parser_fragment(value: FragmentValue) -> Fragment {
    Fragment::new(value, FragmentOrigin::Parser)
}

pub fn duration(ms: u64) -> Fragment {
    parser_fragment(FragmentValue::Duration { ms })
}

pub fn rounds(total: u32) -> Fragment {
    parser_fragment(FragmentValue::Rounds { total })
}

pub fn reps(scheme: &[u32]) -> Fragment {
    parser_fragment(FragmentValue::Rep {
        scheme: scheme.to_vec(),
    })
}

pub struct StatementBuilder {
    statement: CodeStatement,
}

pub fn statement(id: u32) -> StatementBuilder {
    StatementBuilder {
        statement: CodeStatement::new(id),
    }
}

impl StatementBuilder {
    pub fn fragment(mut self, fragment: Fragment) -> Self {
        self.statement.fragments.push(fragment);
        self
    }

    pub fn hint(mut self, hint: &str) -> Self {
        self.statement.hints.insert(hint.to_string());
        self
    }

    pub fn hints(mut self, hints: &[&str]) -> Self {
        self.statement.hints = BTreeSet::from_iter(hints.iter().map(|h| h.to_string()));
        self
    }

    pub fn children(mut self, groups: Vec<Vec<u32>>) -> Self {
        self.statement.children = groups;
        self
    }

    pub fn exercise(mut self, name: &str) -> Self {
        self.statement.exercise_name = Some(name.to_string());
        self
    }

    pub fn build(self) -> CodeStatement {
        self.statement
    }
}

pub struct Harness {
    pub runtime: Runtime,
    pub clock: Rc<ManualClock>,
}

impl Harness {
    /// Full compiler chain over `script`, started at `start_ms`.
    pub fn start(script: Script, start_ms: u64) -> Self {
        let clock = ManualClock::starting_at(start_ms);
        let mut runtime = Runtime::new(
            script,
            Box::new(JitCompiler::with_default_strategies()),
            clock.clone(),
            RuntimeSettings::default(),
        );
        runtime.start().expect("root compiles");
        Self { runtime, clock }
    }

    pub fn next(&mut self) {
        self.runtime.handle(RuntimeEvent::Next);
    }

    pub fn ticks(&mut self, ms: u64, step_ms: u64) {
        let mut remaining = ms;
        while remaining > 0 {
            let step = step_ms.min(remaining);
            let timestamp = self.clock.advance(step);
            self.runtime.handle(RuntimeEvent::Tick { timestamp });
            remaining -= step;
        }
    }

    /// `(kind, label)` pairs of the output log in order.
    pub fn record_labels(&self) -> Vec<(core_runtime::OutputKind, String)> {
        self.runtime
            .sink()
            .records()
            .iter()
            .map(|r| (r.kind, r.metadata.label.clone()))
            .collect()
    }
}
