//! Fluent block assembly shared by every strategy in the chain.

use core_fragments::{BlockKey, Fragment, FragmentOrigin, FragmentValue};
use core_memory::{BlockMemory, MemoryTag, MemoryValue};
use core_runtime::behaviors::{
    ChildSelectionBehavior, ChildSelectionConfig, CompletionTimestampBehavior, LoopCondition,
    ReEntryBehavior, RoundsEndBehavior, TimerCompletionBehavior, TimerConfig, TimerInitBehavior,
    TimerPauseBehavior, TimerTickBehavior,
};
use core_runtime::{Behavior, CompileError, KeyGenerator, RuntimeBlock};
use core_timing::{TimerDirection, TimerRole};

/// Timer composition: init + tick + pause, optionally completion.
#[derive(Debug, Clone)]
pub struct TimerAspect {
    pub direction: TimerDirection,
    pub duration_ms: Option<u64>,
    pub role: TimerRole,
    pub add_completion: bool,
}

/// Round composition: counter, optionally bounded exhaustion.
#[derive(Debug, Clone, Copy, Default)]
pub struct RepeaterAspect {
    pub total_rounds: Option<u32>,
    pub start_round: Option<u32>,
    pub add_completion: bool,
}

/// Child-dispatch composition.
#[derive(Debug, Clone)]
pub struct ContainerAspect {
    pub child_groups: Vec<Vec<u32>>,
    pub loop_condition: LoopCondition,
    pub inject_rest: bool,
    pub skip_on_mount: bool,
}

/// Accumulates type, label, fragments, and the ordered behavior list while
/// the strategy chain runs; `build` turns the result into a block.
///
/// First writer wins for label and block type, so higher-priority
/// strategies decide identity and later enhancements fill gaps.
#[derive(Default)]
pub struct BlockBuilder {
    key: Option<BlockKey>,
    label: Option<String>,
    block_type: Option<String>,
    source_ids: Vec<u32>,
    fragment_groups: Vec<Vec<Fragment>>,
    behaviors: Vec<Box<dyn Behavior>>,
}

impl BlockBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_key(&mut self, key: BlockKey) -> &mut Self {
        self.key = Some(key);
        self
    }

    /// First writer wins.
    pub fn set_label(&mut self, label: impl Into<String>) -> &mut Self {
        self.label.get_or_insert_with(|| label.into());
        self
    }

    /// First writer wins.
    pub fn set_block_type(&mut self, block_type: impl Into<String>) -> &mut Self {
        self.block_type.get_or_insert_with(|| block_type.into());
        self
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn block_type(&self) -> Option<&str> {
        self.block_type.as_deref()
    }

    pub fn set_source_ids(&mut self, ids: Vec<u32>) -> &mut Self {
        self.source_ids = ids;
        self
    }

    /// Each group becomes its own `fragment:display` location.
    pub fn add_fragment_group(&mut self, group: Vec<Fragment>) -> &mut Self {
        self.fragment_groups.push(group);
        self
    }

    pub fn set_fragment_groups(&mut self, groups: Vec<Vec<Fragment>>) -> &mut Self {
        self.fragment_groups = groups;
        self
    }

    pub fn fragment_groups(&self) -> &[Vec<Fragment>] {
        &self.fragment_groups
    }

    pub fn add_behavior(&mut self, behavior: Box<dyn Behavior>) -> &mut Self {
        self.behaviors.push(behavior);
        self
    }

    pub fn add_behavior_if_missing(&mut self, behavior: Box<dyn Behavior>) -> &mut Self {
        if !self.has_behavior(behavior.name()) {
            self.behaviors.push(behavior);
        }
        self
    }

    /// Insert before the named behavior, or append when it is absent.
    /// Enhancement strategies use this to land cues ahead of the output
    /// emitters they decorate.
    pub fn insert_behavior_before(
        &mut self,
        anchor: &str,
        behavior: Box<dyn Behavior>,
    ) -> &mut Self {
        let at = self
            .behaviors
            .iter()
            .position(|b| b.name() == anchor)
            .unwrap_or(self.behaviors.len());
        self.behaviors.insert(at, behavior);
        self
    }

    pub fn has_behavior(&self, name: &str) -> bool {
        self.behaviors.iter().any(|b| b.name() == name)
    }

    pub fn get_behavior(&self, name: &str) -> Option<&dyn Behavior> {
        self.behaviors
            .iter()
            .find(|b| b.name() == name)
            .map(AsRef::as_ref)
    }

    pub fn remove_behavior(&mut self, name: &str) -> bool {
        let before = self.behaviors.len();
        self.behaviors.retain(|b| b.name() != name);
        self.behaviors.len() != before
    }

    // ---- aspect composers ------------------------------------------------

    pub fn as_timer(&mut self, aspect: TimerAspect) -> &mut Self {
        let label = self.label.clone().unwrap_or_default();
        self.add_behavior_if_missing(Box::new(TimerInitBehavior::new(TimerConfig {
            direction: aspect.direction,
            duration_ms: aspect.duration_ms,
            label,
            role: aspect.role,
        })));
        self.add_behavior_if_missing(Box::new(TimerTickBehavior));
        self.add_behavior_if_missing(Box::new(TimerPauseBehavior));
        if aspect.add_completion
            && let Some(duration_ms) = aspect.duration_ms
        {
            self.add_behavior_if_missing(Box::new(TimerCompletionBehavior::new(duration_ms)));
        }
        self
    }

    pub fn as_repeater(&mut self, aspect: RepeaterAspect) -> &mut Self {
        self.add_behavior_if_missing(Box::new(ReEntryBehavior::new(
            aspect.start_round,
            aspect.total_rounds,
        )));
        if aspect.add_completion && aspect.total_rounds.is_some() {
            self.add_behavior_if_missing(Box::new(RoundsEndBehavior));
        }
        self
    }

    /// Round bookkeeping is already in place (repeater before container),
    /// so the dispatcher sees a reset counter before it re-dispatches.
    pub fn as_container(&mut self, aspect: ContainerAspect) -> &mut Self {
        self.add_behavior_if_missing(Box::new(ChildSelectionBehavior::new(
            ChildSelectionConfig {
                child_groups: aspect.child_groups,
                loop_condition: aspect.loop_condition,
                inject_rest: aspect.inject_rest,
                skip_on_mount: aspect.skip_on_mount,
            },
        )));
        self
    }

    // ---- assembly --------------------------------------------------------

    pub fn build(mut self, keys: &mut KeyGenerator) -> Result<RuntimeBlock, CompileError> {
        let label = self.label.clone().unwrap_or_else(|| {
            self.block_type.clone().unwrap_or_else(|| "Block".to_string())
        });
        let block_type = self.block_type.clone().unwrap_or_else(|| "Block".to_string());

        // Every block stamps its completion instant; keep the stamp ahead
        // of the output emitters that read it.
        if !self.has_behavior("completion-timestamp") {
            let anchor = if self.has_behavior("report-output") {
                "report-output"
            } else {
                "segment-output"
            };
            self.insert_behavior_before(anchor, Box::new(CompletionTimestampBehavior));
        }

        let key = match self.key {
            Some(key) => key,
            None => keys.allocate(slug(&label)),
        };

        let mut memory = BlockMemory::new();
        let label_fragment = Fragment::new(
            FragmentValue::Label {
                text: label.clone(),
            },
            FragmentOrigin::Compiler,
        )
        .with_source(key.clone());
        memory
            .push(
                MemoryTag::FragmentLabel,
                MemoryValue::Fragments(vec![label_fragment]),
            )
            .map_err(|e| CompileError::Contract(e.to_string()))?;
        for group in self.fragment_groups {
            memory
                .push(MemoryTag::FragmentDisplay, MemoryValue::Fragments(group))
                .map_err(|e| CompileError::Contract(e.to_string()))?;
        }

        tracing::debug!(
            target: "runtime.compile",
            block = %key,
            block_type = %block_type,
            behaviors = self.behaviors.len(),
            "block_built"
        );
        Ok(RuntimeBlock::new(
            key,
            block_type,
            self.source_ids,
            memory,
            self.behaviors,
        ))
    }
}

/// Short log tag: lowercase alphanumeric words joined by dashes.
pub(crate) fn slug(label: &str) -> String {
    let mut out = String::with_capacity(label.len());
    let mut dash = false;
    for c in label.chars() {
        if c.is_alphanumeric() {
            out.extend(c.to_lowercase());
            dash = false;
        } else if !dash && !out.is_empty() {
            out.push('-');
            dash = true;
        }
    }
    while out.ends_with('-') {
        out.pop();
    }
    if out.is_empty() {
        "block".to_string()
    } else {
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_label_wins() {
        let mut builder = BlockBuilder::new();
        builder.set_label("AMRAP").set_label("fallback");
        assert_eq!(builder.label(), Some("AMRAP"));
    }

    #[test]
    fn add_if_missing_is_idempotent() {
        let mut builder = BlockBuilder::new();
        builder.as_timer(TimerAspect {
            direction: TimerDirection::Down,
            duration_ms: Some(60_000),
            role: TimerRole::Primary,
            add_completion: true,
        });
        builder.as_timer(TimerAspect {
            direction: TimerDirection::Up,
            duration_ms: None,
            role: TimerRole::Auto,
            add_completion: false,
        });
        let count = ["timer-init", "timer-tick", "timer-pause", "timer-completion"]
            .iter()
            .filter(|n| builder.has_behavior(n))
            .count();
        assert_eq!(count, 4);
    }

    #[test]
    fn build_adds_completion_timestamp_and_display_groups() {
        let mut keys = KeyGenerator::new();
        let mut builder = BlockBuilder::new();
        builder.set_label("21-15-9 Thrusters");
        builder.add_fragment_group(vec![]);
        builder.add_fragment_group(vec![]);
        let block = builder.build(&mut keys).unwrap();
        assert!(block.behavior_names().contains(&"completion-timestamp"));
        assert_eq!(
            block
                .memory
                .get_all(MemoryTag::FragmentDisplay)
                .count(),
            2
        );
        assert_eq!(block.key().tag, "21-15-9-thrusters");
        assert_eq!(block.label(), "21-15-9 Thrusters");
    }

    #[test]
    fn slug_flattens_punctuation() {
        assert_eq!(slug("EMOM 1:00 x 10"), "emom-1-00-x-10");
        assert_eq!(slug("  "), "block");
    }
}
