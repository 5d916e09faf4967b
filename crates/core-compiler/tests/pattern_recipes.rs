//! Compile-time shape of each workout pattern: which behaviors the
//! strategy chain composes for a given statement.

mod common;

use common::{duration, reps, rounds, statement};
use core_compiler::JitCompiler;
use core_memory::MemoryTag;
use core_runtime::{
    BlockCompiler, CompileError, CompileRequest, CompileServices, KeyGenerator, RuntimeBlock,
};
use core_script::{CodeStatement, Script, hints};

fn compile(statements: Vec<CodeStatement>, request: CompileRequest) -> RuntimeBlock {
    try_compile(statements, request).expect("compiles")
}

fn try_compile(
    statements: Vec<CodeStatement>,
    request: CompileRequest,
) -> Result<RuntimeBlock, CompileError> {
    let root: Vec<u32> = statements.iter().map(|s| s.id).collect();
    let script = Script::new(statements, root).expect("valid script");
    let mut keys = KeyGenerator::new();
    let mut services = CompileServices {
        script: &script,
        keys: &mut keys,
        now: 0,
    };
    JitCompiler::with_default_strategies().compile(&request, &mut services)
}

fn has_all(block: &RuntimeBlock, names: &[&str]) -> bool {
    let composed = block.behavior_names();
    names.iter().all(|n| composed.contains(n))
}

#[test]
fn amrap_composes_countdown_unbounded_loop_with_rest() {
    let stmt = statement(1)
        .fragment(duration(300_000))
        .children(vec![vec![2], vec![3]])
        .build();
    let block = compile(
        vec![stmt, statement(2).build(), statement(3).build()],
        CompileRequest::child(vec![1], vec![]),
    );
    assert_eq!(block.block_type(), "Amrap");
    assert!(has_all(
        &block,
        &[
            "timer-init",
            "timer-tick",
            "timer-pause",
            "timer-completion",
            "re-entry",
            "child-selection",
            "round-output",
            "sound-cue",
            "history-record",
            "completion-timestamp",
        ]
    ));
    // Unbounded: the timer is the only exit.
    assert!(!block.behavior_names().contains(&"rounds-end"));
    assert!(!block.behavior_names().contains(&"leaf-exit"));
}

#[test]
fn emom_composes_bounded_interval() {
    let stmt = statement(1)
        .fragment(duration(60_000))
        .fragment(rounds(10))
        .build();
    let block = compile(vec![stmt], CompileRequest::child(vec![1], vec![]));
    assert_eq!(block.block_type(), "Interval");
    assert!(has_all(
        &block,
        &["timer-completion", "re-entry", "rounds-end", "round-output"]
    ));
    assert!(!block.behavior_names().contains(&"child-selection"));
}

#[test]
fn repeating_interval_hint_compiles_without_fragments() {
    let stmt = statement(1).hint(hints::REPEATING_INTERVAL).build();
    let block = compile(vec![stmt], CompileRequest::child(vec![1], vec![]));
    assert_eq!(block.block_type(), "Interval");
    assert!(has_all(&block, &["timer-init", "timer-completion"]));
}

#[test]
fn bare_effort_falls_back_to_user_advanced_leaf() {
    let stmt = statement(1).exercise("Grace").build();
    let block = compile(vec![stmt], CompileRequest::child(vec![1], vec![]));
    assert_eq!(block.block_type(), "Effort");
    assert_eq!(block.label(), "Grace");
    assert!(has_all(&block, &["timer-init", "leaf-exit", "sound-cue"]));
    assert!(!block.behavior_names().contains(&"timer-completion"));
}

#[test]
fn rep_scheme_compiles_to_rounds_block_with_display_groups() {
    let stmt = statement(1)
        .fragment(rounds(3))
        .fragment(reps(&[21, 15, 9]))
        .exercise("Thrusters")
        .build();
    let block = compile(vec![stmt], CompileRequest::child(vec![1], vec![]));
    assert_eq!(block.block_type(), "Rounds");
    assert!(has_all(
        &block,
        &["re-entry", "rounds-end", "report-output", "round-output"]
    ));
    assert!(!block.behavior_names().contains(&"leaf-exit"));
    assert_eq!(block.memory.get_all(MemoryTag::FragmentDisplay).count(), 3);
}

#[test]
fn waiting_to_start_is_header_only() {
    let stmt = statement(1).hint(hints::WAITING_TO_START).build();
    let block = compile(vec![stmt], CompileRequest::child(vec![1], vec![]));
    assert_eq!(block.block_type(), "WaitingToStart");
    assert!(has_all(&block, &["leaf-exit", "segment-output", "sound-cue"]));
    assert!(!block.behavior_names().contains(&"timer-init"));
}

#[test]
fn rest_hint_compiles_to_expiring_countdown() {
    let stmt = statement(1)
        .hint(hints::REST)
        .fragment(duration(120_000))
        .build();
    let block = compile(vec![stmt], CompileRequest::child(vec![1], vec![]));
    assert_eq!(block.block_type(), "Rest");
    assert_eq!(block.label(), "Rest 2:00");
    assert!(has_all(&block, &["timer-completion", "sound-cue"]));
}

#[test]
fn root_request_compiles_to_session_container() {
    let block = compile(
        vec![statement(1).build(), statement(2).build()],
        CompileRequest::root(vec![1, 2]),
    );
    assert_eq!(block.block_type(), "Session");
    assert!(has_all(
        &block,
        &["child-selection", "controls-init", "cancel-on-event"]
    ));
    assert!(block.memory.controls().is_none(), "controls allocate at mount");
}

#[test]
fn multi_statement_group_becomes_single_pass_container() {
    let block = compile(
        vec![statement(1).exercise("row").build(), statement(2).exercise("run").build()],
        CompileRequest::child(vec![1, 2], vec![]),
    );
    assert_eq!(block.block_type(), "Group");
    assert!(has_all(&block, &["child-selection"]));
}

#[test]
fn empty_request_matches_no_strategy() {
    let err = try_compile(vec![statement(1).build()], CompileRequest::child(vec![], vec![]))
        .unwrap_err();
    assert!(matches!(err, CompileError::NoStrategy { .. }));
}

#[test]
fn promoted_round_lands_in_the_key_tag() {
    use core_fragments::{Fragment, FragmentOrigin, FragmentValue};
    let stmt = statement(1).exercise("burpees").build();
    let promote = vec![Fragment::new(
        FragmentValue::CurrentRound {
            current: 2,
            total: Some(3),
        },
        FragmentOrigin::Runtime,
    )];
    let block = compile(vec![stmt], CompileRequest::child(vec![1], promote));
    assert_eq!(block.key().tag, "burpees:2");
    // The promoted fragments ride along as an extra display group.
    assert_eq!(block.memory.get_all(MemoryTag::FragmentDisplay).count(), 1);
}
