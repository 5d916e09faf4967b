//! Timer-driven lifecycle scenarios: AMRAP expiry, EMOM round exhaustion,
//! pause accounting, and countdown boundaries.

mod common;

use common::{
    FnCompiler, Harness, amrap_leaf, emom_leaf, flat_script, labeled_memory, timer_behaviors,
};
use core_runtime::behaviors::{
    LeafExitBehavior, ReEntryBehavior, RoundsEndBehavior, SegmentOutputBehavior, SoundCue,
    SoundCueBehavior, SoundTrigger,
};
use core_runtime::{OutputKind, RuntimeBlock, RuntimeEvent};
use core_timing::TimerDirection;

#[test]
fn amrap_counts_rounds_until_timer_expires() {
    let compiler = FnCompiler::new(|req, services| {
        assert!(req.is_root);
        Ok(amrap_leaf(services.keys.allocate("amrap"), 60_000))
    });
    let mut h = Harness::start(flat_script(1), compiler, 10_000);

    for _ in 0..10 {
        h.next();
    }
    h.ticks(61_000, 1_000);

    assert!(h.runtime.is_finished());
    let sink = h.runtime.sink();
    let completions: Vec<_> = sink.records_of_kind(OutputKind::Completion).collect();
    assert_eq!(completions.len(), 1, "exactly one completion record");
    assert_eq!(
        completions[0].metadata.extra.get("reason").map(String::as_str),
        Some("timer-expired")
    );
    // Round 1 header plus one milestone per user advance.
    let milestones: Vec<_> = sink.records_of_kind(OutputKind::Milestone).collect();
    assert_eq!(milestones.len(), 11);
    assert_eq!(milestones[0].metadata.label, "Round 1");
    assert_eq!(milestones[10].metadata.label, "Round 11");
}

#[test]
fn emom_exhausts_after_three_rounds() {
    let compiler = FnCompiler::new(|_, services| {
        Ok(emom_leaf(services.keys.allocate("emom"), 60_000, 3))
    });
    let mut h = Harness::start(flat_script(1), compiler, 0);

    for _ in 0..3 {
        h.next();
    }

    assert!(h.runtime.is_finished());
    let sink = h.runtime.sink();
    let milestones: Vec<_> = sink
        .records_of_kind(OutputKind::Milestone)
        .map(|r| r.metadata.label.clone())
        .collect();
    assert_eq!(
        milestones,
        vec!["Round 1 of 3", "Round 2 of 3", "Round 3 of 3"]
    );
    let completion = sink
        .records_of_kind(OutputKind::Completion)
        .next()
        .expect("completion record");
    assert_eq!(
        completion.metadata.extra.get("reason").map(String::as_str),
        Some("rounds-exhausted")
    );
    // The counter moved past the bound before exhaustion was declared.
    let history = sink.history().next().expect("history record");
    assert_eq!(history.completed_rounds, Some(3));
    assert_eq!(history.total_rounds, Some(3));
}

#[test]
fn pause_is_excluded_from_elapsed_but_counted_in_total() {
    let compiler = FnCompiler::new(|_, services| {
        Ok(amrap_leaf(services.keys.allocate("countdown"), 10_000))
    });
    let mut h = Harness::start(flat_script(1), compiler, 0);

    h.ticks(3_000, 1_000);
    h.runtime.handle(RuntimeEvent::TimerPause);
    h.clock.advance(5_000);
    h.runtime.handle(RuntimeEvent::TimerResume);
    h.ticks(2_000, 1_000);

    let frames = h.runtime.stack().frames();
    assert_eq!(frames.len(), 1, "5s elapsed of 10s keeps the frame alive");
    let timer = frames[0].memory.timer_state().expect("timer present");
    let now = h.clock.advance(0);
    assert_eq!(timer.elapsed(now), 5_000);
    assert_eq!(timer.total(now), 10_000);
    assert_eq!(timer.spans.len(), 2);
}

#[test]
fn pause_and_resume_are_idempotent_through_events() {
    let compiler = FnCompiler::new(|_, services| {
        Ok(amrap_leaf(services.keys.allocate("countdown"), 60_000))
    });
    let mut h = Harness::start(flat_script(1), compiler, 0);

    h.ticks(1_000, 1_000);
    h.runtime.handle(RuntimeEvent::TimerPause);
    h.runtime.handle(RuntimeEvent::TimerPause);
    let timer = h.runtime.stack().frames()[0]
        .memory
        .timer_state()
        .expect("timer")
        .clone();
    assert_eq!(timer.spans.len(), 1);
    assert!(!timer.is_running());

    h.runtime.handle(RuntimeEvent::TimerResume);
    h.runtime.handle(RuntimeEvent::TimerResume);
    let timer = h.runtime.stack().frames()[0]
        .memory
        .timer_state()
        .expect("timer")
        .clone();
    assert_eq!(timer.spans.len(), 2);
    assert!(timer.is_running());
}

#[test]
fn zero_duration_countdown_completes_at_mount() {
    let compiler = FnCompiler::new(|_, services| {
        Ok(amrap_leaf(services.keys.allocate("instant"), 0))
    });
    let h = Harness::start(flat_script(1), compiler, 500);

    // No tick was ever delivered; mount alone finished the run.
    assert!(h.runtime.is_finished());
    let completion = h
        .runtime
        .sink()
        .records_of_kind(OutputKind::Completion)
        .next()
        .expect("completion record");
    assert_eq!(
        completion.metadata.extra.get("reason").map(String::as_str),
        Some("timer-expired")
    );
}

fn bounded_rounds_block(services: &mut core_runtime::CompileServices<'_>, total: Option<u32>) -> RuntimeBlock {
    let key = services.keys.allocate("rounds");
    let memory = labeled_memory(&key, "Rounds");
    RuntimeBlock::new(
        key,
        "Rounds",
        vec![1],
        memory,
        vec![
            Box::new(ReEntryBehavior::new(Some(1), total)),
            Box::new(RoundsEndBehavior),
            Box::new(SegmentOutputBehavior::new(false, true)),
        ],
    )
}

#[test]
fn single_round_completes_after_one_next() {
    let compiler = FnCompiler::new(|_, services| Ok(bounded_rounds_block(services, Some(1))));
    let mut h = Harness::start(flat_script(1), compiler, 0);
    h.next();
    assert!(h.runtime.is_finished());
}

#[test]
fn unbounded_rounds_never_exhaust() {
    let compiler = FnCompiler::new(|_, services| Ok(bounded_rounds_block(services, None)));
    let mut h = Harness::start(flat_script(1), compiler, 0);
    for _ in 0..50 {
        h.next();
    }
    assert!(!h.runtime.is_finished());
    let (current, total) = h.runtime.stack().frames()[0]
        .memory
        .current_round()
        .expect("round present");
    assert_eq!(current, 51);
    assert_eq!(total, None);
}

#[test]
fn user_advance_completes_an_effort_leaf_with_elapsed_time() {
    let compiler = FnCompiler::new(|_, services| {
        Ok(common::effort_leaf(services.keys.allocate("squats"), "squats"))
    });
    let mut h = Harness::start(flat_script(1), compiler, 0);
    h.ticks(45_000, 1_000);
    h.next();

    assert!(h.runtime.is_finished());
    let history = h.runtime.sink().history().next().expect("history record");
    assert_eq!(history.elapsed_ms, Some(45_000));
    let completion = h
        .runtime
        .sink()
        .records_of_kind(OutputKind::Completion)
        .next()
        .expect("completion");
    assert_eq!(
        completion.metadata.extra.get("reason").map(String::as_str),
        Some("user-advance")
    );
    // The sealed timer has exactly one closed span.
    let spans = completion
        .fragments
        .iter()
        .find_map(|f| match &f.value {
            core_fragments::FragmentValue::Spans { spans } => Some(spans.clone()),
            _ => None,
        })
        .expect("spans fragment in completion");
    assert_eq!(spans.len(), 1);
    assert!(spans[0].ended.is_some());
}

fn beeping_countdown(
    services: &mut core_runtime::CompileServices<'_>,
    duration_ms: u64,
) -> RuntimeBlock {
    let key = services.keys.allocate("countdown");
    let memory = labeled_memory(&key, "Countdown");
    let mut behaviors = timer_behaviors(TimerDirection::Down, Some(duration_ms), "Countdown", true);
    behaviors.push(Box::new(SoundCueBehavior::new(vec![SoundCue::new(
        SoundTrigger::Countdown {
            seconds: vec![3, 2, 1],
        },
        "countdown-beep",
    )])));
    behaviors.push(Box::new(SegmentOutputBehavior::new(false, true)));
    RuntimeBlock::new(key, "Timer", vec![1], memory, behaviors)
}

fn countdown_cue_seconds(h: &Harness) -> Vec<String> {
    h.runtime
        .sink()
        .records_of_kind(OutputKind::Milestone)
        .filter_map(|r| r.metadata.extra.get("remaining_seconds").cloned())
        .collect()
}

#[test]
fn ui_memory_subscription_sees_timer_writes_only() {
    use core_memory::MemoryTag;
    use std::cell::RefCell;
    use std::rc::Rc;

    let compiler = FnCompiler::new(|_, services| {
        Ok(amrap_leaf(services.keys.allocate("amrap"), 60_000))
    });
    let mut h = Harness::start(flat_script(1), compiler, 0);
    let block_id = h.runtime.stack().frames()[0].key().id;

    let notifications = Rc::new(RefCell::new(0u32));
    let counter = notifications.clone();
    let id = h
        .runtime
        .subscribe_memory(
            block_id,
            MemoryTag::Timer,
            Box::new(move |change| {
                assert_eq!(change.tag, MemoryTag::Timer);
                *counter.borrow_mut() += 1;
            }),
        )
        .expect("timer location live");
    assert_eq!(id, 0);

    // Ticks derive elapsed from spans without writing; only pause and
    // resume touch the location.
    h.ticks(3_000, 1_000);
    h.runtime.handle(RuntimeEvent::TimerPause);
    h.runtime.handle(RuntimeEvent::TimerResume);
    assert_eq!(*notifications.borrow(), 2);
}

#[test]
fn countdown_cues_play_each_threshold_once() {
    let compiler = FnCompiler::new(|_, services| Ok(beeping_countdown(services, 5_000)));
    let mut h = Harness::start(flat_script(1), compiler, 0);

    h.ticks(5_000, 500);

    assert!(h.runtime.is_finished());
    assert_eq!(countdown_cue_seconds(&h), vec!["3", "2", "1"]);
}

#[test]
fn coarse_ticks_never_replay_skipped_cues() {
    let compiler = FnCompiler::new(|_, services| Ok(beeping_countdown(services, 5_000)));
    let mut h = Harness::start(flat_script(1), compiler, 0);

    // One tick lands inside all three thresholds at once; only the lowest
    // crossed cue plays and the jumped-over ones stay silent.
    h.ticks(5_000, 4_000);

    assert!(h.runtime.is_finished());
    assert_eq!(countdown_cue_seconds(&h), vec!["1"]);
}

#[test]
fn leaf_completes_on_custom_event() {
    let compiler = FnCompiler::new(|_, services| {
        let key = services.keys.allocate("row");
        let memory = labeled_memory(&key, "row");
        Ok(RuntimeBlock::new(
            key,
            "Effort",
            vec![1],
            memory,
            vec![
                Box::new(LeafExitBehavior::with_completion_events(vec![
                    "complete:row".to_string(),
                ])),
                Box::new(SegmentOutputBehavior::new(false, true)),
            ],
        ))
    });
    let mut h = Harness::start(flat_script(1), compiler, 0);
    h.runtime.handle(RuntimeEvent::Completion {
        name: "complete:row".to_string(),
    });
    assert!(h.runtime.is_finished());
    let completion = h
        .runtime
        .sink()
        .records_of_kind(OutputKind::Completion)
        .next()
        .expect("completion");
    assert_eq!(
        completion.metadata.extra.get("reason").map(String::as_str),
        Some("event:complete:row")
    );
}
