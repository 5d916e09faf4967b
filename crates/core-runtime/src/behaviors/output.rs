//! Output aspect: round milestones, timer results, segment headers, and
//! completion records.

use std::cell::RefCell;
use std::rc::Rc;

use core_fragments::{Fragment, FragmentKind, FragmentOrigin, FragmentValue, MetricRole};
use core_memory::{MemoryTag, MemoryValue};
use core_timing::TimerState;

use crate::behavior::Behavior;
use crate::context::{BehaviorContext, BehaviorError};
use crate::events::{EventHandler, EventScope, RuntimeEvent};
use crate::outputs::{OutputKind, OutputMetadata};

/// Emits one milestone per distinct round value: a header at mount
/// (suppressed for single-round blocks) and another each time the counter
/// moves. Wrap-driven changes arrive via the pop handler so container
/// rounds are covered too.
pub struct RoundOutputBehavior {
    last_emitted: Rc<RefCell<Option<u32>>>,
}

impl RoundOutputBehavior {
    pub fn new() -> Self {
        Self {
            last_emitted: Rc::new(RefCell::new(None)),
        }
    }
}

impl Default for RoundOutputBehavior {
    fn default() -> Self {
        Self::new()
    }
}

fn emit_round_milestone(
    ctx: &mut BehaviorContext<'_>,
    last_emitted: &RefCell<Option<u32>>,
) -> Result<(), BehaviorError> {
    let Some((current, total)) = ctx.current_round() else {
        return Ok(());
    };
    if *last_emitted.borrow() == Some(current) {
        return Ok(());
    }
    // A counter past its bound is exhaustion bookkeeping, not a round.
    if let Some(total) = total
        && current > total
    {
        return Ok(());
    }
    let round = Fragment::new(
        FragmentValue::CurrentRound { current, total },
        FragmentOrigin::Runtime,
    )
    .with_source(ctx.key().clone())
    .with_timestamp(ctx.now());
    let label = round.image.clone();
    let mut fragments = vec![round];
    if let Some(timer) = ctx.timer_state() {
        let now = ctx.now();
        fragments.push(
            Fragment::new(
                FragmentValue::Elapsed {
                    ms: timer.elapsed(now),
                },
                FragmentOrigin::Runtime,
            )
            .with_role(MetricRole::Calculated)
            .with_source(ctx.key().clone()),
        );
        fragments.push(
            Fragment::new(
                FragmentValue::Spans {
                    spans: timer.spans.clone(),
                },
                FragmentOrigin::Runtime,
            )
            .with_role(MetricRole::Recorded)
            .with_source(ctx.key().clone()),
        );
    }
    ctx.emit_output(OutputKind::Milestone, fragments, OutputMetadata::labeled(label));
    *last_emitted.borrow_mut() = Some(current);
    Ok(())
}

impl Behavior for RoundOutputBehavior {
    fn name(&self) -> &'static str {
        "round-output"
    }

    fn on_mount(&mut self, ctx: &mut BehaviorContext<'_>) -> Result<(), BehaviorError> {
        ctx.subscribe(
            "block:popped",
            EventScope::Local,
            Box::new(RoundWrapHandler {
                last_emitted: self.last_emitted.clone(),
            }),
        );
        // No header for trivial single-round blocks.
        if let Some((_, Some(total))) = ctx.current_round()
            && total <= 1
        {
            return Ok(());
        }
        emit_round_milestone(ctx, &self.last_emitted)
    }

    fn on_next(&mut self, ctx: &mut BehaviorContext<'_>) -> Result<(), BehaviorError> {
        emit_round_milestone(ctx, &self.last_emitted)
    }
}

struct RoundWrapHandler {
    last_emitted: Rc<RefCell<Option<u32>>>,
}

impl EventHandler for RoundWrapHandler {
    fn on_event(
        &mut self,
        event: &RuntimeEvent,
        ctx: &mut BehaviorContext<'_>,
    ) -> Result<(), BehaviorError> {
        let RuntimeEvent::BlockPopped { depth, .. } = event else {
            return Ok(());
        };
        if *depth != ctx.stack_level() + 1 {
            return Ok(());
        }
        emit_round_milestone(ctx, &self.last_emitted)
    }
}

/// Seals the timer into result fragments at unmount: elapsed, total,
/// spans, and the wall timestamp.
pub struct TimerOutputBehavior {
    target: MemoryTag,
}

impl TimerOutputBehavior {
    /// Intermediate results merged into the completion output.
    pub fn tracked() -> Self {
        Self {
            target: MemoryTag::FragmentTracked,
        }
    }

    /// Report variant: terminal results for split computation.
    pub fn result() -> Self {
        Self {
            target: MemoryTag::FragmentResult,
        }
    }
}

/// The timer as it stands at unmount, with any open span sealed at `now`.
fn sealed_timer(ctx: &BehaviorContext<'_>) -> Option<TimerState> {
    let mut timer = ctx.timer_state()?;
    timer.pause(ctx.now());
    Some(timer)
}

impl Behavior for TimerOutputBehavior {
    fn name(&self) -> &'static str {
        "timer-output"
    }

    fn on_unmount(&mut self, ctx: &mut BehaviorContext<'_>) -> Result<(), BehaviorError> {
        let Some(timer) = sealed_timer(ctx) else {
            return Ok(());
        };
        let now = ctx.now();
        let key = ctx.key().clone();
        let stamp = |value, role| {
            Fragment::new(value, FragmentOrigin::Runtime)
                .with_role(role)
                .with_source(key.clone())
                .with_timestamp(now)
        };
        let fragments = vec![
            stamp(
                FragmentValue::Elapsed {
                    ms: timer.elapsed(now),
                },
                MetricRole::Calculated,
            ),
            stamp(
                FragmentValue::Total {
                    ms: timer.total(now),
                },
                MetricRole::Calculated,
            ),
            stamp(
                FragmentValue::Spans {
                    spans: timer.spans.clone(),
                },
                MetricRole::Recorded,
            ),
            stamp(FragmentValue::SystemTime { at: now }, MetricRole::Recorded),
        ];
        ctx.push_memory(self.target, MemoryValue::Fragments(fragments))
    }
}

/// Segment header at mount and a single completion record at unmount,
/// assembled from the display plan plus the tracked results.
pub struct SegmentOutputBehavior {
    emit_header: bool,
    emit_completion: bool,
    completion_emitted: bool,
}

impl SegmentOutputBehavior {
    pub fn new(emit_header: bool, emit_completion: bool) -> Self {
        Self {
            emit_header,
            emit_completion,
            completion_emitted: false,
        }
    }
}

impl Behavior for SegmentOutputBehavior {
    fn name(&self) -> &'static str {
        "segment-output"
    }

    fn on_mount(&mut self, ctx: &mut BehaviorContext<'_>) -> Result<(), BehaviorError> {
        if self.emit_header {
            let fragments = ctx.collect_fragments(MemoryTag::FragmentDisplay);
            let label = ctx.label();
            ctx.emit_output(OutputKind::Segment, fragments, OutputMetadata::labeled(label));
        }
        Ok(())
    }

    fn on_unmount(&mut self, ctx: &mut BehaviorContext<'_>) -> Result<(), BehaviorError> {
        if !self.emit_completion || self.completion_emitted {
            return Ok(());
        }
        self.completion_emitted = true;
        let mut fragments = ctx.collect_fragments(MemoryTag::FragmentDisplay);
        fragments.extend(ctx.collect_fragments(MemoryTag::FragmentTracked));
        let mut metadata = OutputMetadata::labeled(ctx.label());
        if let Some(reason) = ctx.completion_reason() {
            metadata = metadata.with("reason", reason.to_string());
        }
        ctx.emit_output(OutputKind::Completion, fragments, metadata);
        Ok(())
    }
}

/// Report variant of the completion record: when the plan has several
/// display groups, the block's elapsed time is attributed to the groups
/// in proportion to their rep weights.
pub struct ReportOutputBehavior {
    emit_header: bool,
    completion_emitted: bool,
}

impl ReportOutputBehavior {
    pub fn new(emit_header: bool) -> Self {
        Self {
            emit_header,
            completion_emitted: false,
        }
    }
}

/// Proportional attribution of `total_ms` over `weights`. The last share
/// absorbs the rounding remainder so the parts always sum to the whole.
pub fn compute_split_time_results(total_ms: u64, weights: &[u64]) -> Vec<u64> {
    if weights.is_empty() {
        return Vec::new();
    }
    let sum: u64 = weights.iter().sum();
    if sum == 0 {
        let even = total_ms / weights.len() as u64;
        let mut out = vec![even; weights.len()];
        *out.last_mut().expect("non-empty") = total_ms - even * (weights.len() as u64 - 1);
        return out;
    }
    let mut out = Vec::with_capacity(weights.len());
    let mut attributed = 0u64;
    for weight in &weights[..weights.len() - 1] {
        let share = ((total_ms as u128 * *weight as u128) / sum as u128) as u64;
        out.push(share);
        attributed += share;
    }
    out.push(total_ms - attributed);
    out
}

fn group_rep_weight(group: &[Fragment]) -> u64 {
    let weight: u64 = group
        .iter()
        .filter(|f| f.kind() == FragmentKind::Rep)
        .filter_map(|f| match &f.value {
            FragmentValue::Rep { scheme } => {
                Some(scheme.iter().map(|&r| u64::from(r)).sum::<u64>())
            }
            _ => None,
        })
        .sum();
    weight.max(1)
}

impl Behavior for ReportOutputBehavior {
    fn name(&self) -> &'static str {
        "report-output"
    }

    fn on_mount(&mut self, ctx: &mut BehaviorContext<'_>) -> Result<(), BehaviorError> {
        if self.emit_header {
            let fragments = ctx.collect_fragments(MemoryTag::FragmentDisplay);
            let label = ctx.label();
            ctx.emit_output(OutputKind::Segment, fragments, OutputMetadata::labeled(label));
        }
        Ok(())
    }

    fn on_unmount(&mut self, ctx: &mut BehaviorContext<'_>) -> Result<(), BehaviorError> {
        if self.completion_emitted {
            return Ok(());
        }
        self.completion_emitted = true;
        let groups = ctx.fragment_groups(MemoryTag::FragmentDisplay);
        let elapsed = sealed_timer(ctx).map(|t| t.elapsed(ctx.now()));
        let mut fragments = Vec::new();
        if groups.len() > 1
            && let Some(elapsed) = elapsed
        {
            let weights: Vec<u64> = groups.iter().map(|g| group_rep_weight(g)).collect();
            let splits = compute_split_time_results(elapsed, &weights);
            for (group, split) in groups.into_iter().zip(splits) {
                fragments.extend(group);
                fragments.push(
                    Fragment::new(FragmentValue::Elapsed { ms: split }, FragmentOrigin::Runtime)
                        .with_role(MetricRole::Calculated)
                        .with_source(ctx.key().clone())
                        .with_timestamp(ctx.now()),
                );
            }
        } else {
            fragments.extend(groups.into_iter().flatten());
        }
        fragments.extend(ctx.collect_fragments(MemoryTag::FragmentResult));
        let mut metadata = OutputMetadata::labeled(ctx.label());
        if let Some(reason) = ctx.completion_reason() {
            metadata = metadata.with("reason", reason.to_string());
        }
        ctx.emit_output(OutputKind::Completion, fragments, metadata);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_is_exact_for_rep_schemes() {
        assert_eq!(
            compute_split_time_results(45_000, &[21, 15, 9]),
            vec![21_000, 15_000, 9_000]
        );
    }

    #[test]
    fn split_remainder_lands_in_the_last_group() {
        let splits = compute_split_time_results(100, &[1, 1, 1]);
        assert_eq!(splits.iter().sum::<u64>(), 100);
        assert_eq!(splits, vec![33, 33, 34]);
    }

    #[test]
    fn zero_weights_split_evenly() {
        let splits = compute_split_time_results(90, &[0, 0, 0]);
        assert_eq!(splits.iter().sum::<u64>(), 90);
    }

    #[test]
    fn empty_weights_yield_nothing() {
        assert!(compute_split_time_results(1_000, &[]).is_empty());
    }
}
