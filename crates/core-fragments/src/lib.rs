//! Tagged value nodes flowing between parser, compiler, runtime, and output
//! log. A fragment couples a typed payload with a display image, an origin
//! (who wrote it), and a metric role (what it means for results).

use serde::{Deserialize, Serialize};

use core_timing::{
    EpochMs, TimeSpan, TimerState, format_duration, format_duration_opt, spans_image,
    system_time_image,
};

mod key;

pub use key::BlockKey;

/// Who produced a fragment. Later writers outrank earlier pipeline stages
/// when several fragments of one kind share a memory location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FragmentOrigin {
    Parser,
    Compiler,
    Runtime,
    User,
    /// User-supplied value gathered at runtime for a collectible slot.
    Collected,
}

impl FragmentOrigin {
    /// Precedence rank: `User`/`Collected` > `Runtime` > `Compiler` > `Parser`.
    pub fn rank(self) -> u8 {
        match self {
            Self::Parser => 0,
            Self::Compiler => 1,
            Self::Runtime => 2,
            Self::User | Self::Collected => 3,
        }
    }
}

/// Metric role of a fragment inside results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MetricRole {
    /// Planned value from the script.
    #[default]
    Defined,
    /// Measured at runtime.
    Recorded,
    /// Derived from other fragments.
    Calculated,
    /// Display-only suggestion.
    Hint,
}

/// Discriminant-only view of [`FragmentValue`], used for memory queries and
/// precedence grouping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FragmentKind {
    Duration,
    Rep,
    Rounds,
    Timer,
    Elapsed,
    Total,
    Spans,
    SystemTime,
    CurrentRound,
    Text,
    Label,
    Action,
    Effort,
    Resistance,
    Distance,
    Increment,
    Lap,
    Group,
}

/// Typed payload. `Rep` with an empty scheme is a collectible slot awaiting
/// user input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FragmentValue {
    Duration { ms: u64 },
    Rep { scheme: Vec<u32> },
    Rounds { total: u32 },
    Timer { state: TimerState },
    Elapsed { ms: u64 },
    Total { ms: u64 },
    Spans { spans: Vec<TimeSpan> },
    SystemTime { at: EpochMs },
    CurrentRound { current: u32, total: Option<u32> },
    Text { text: String },
    Label { text: String },
    Action { name: String },
    Effort { name: String },
    Resistance { amount: f64, units: String },
    Distance { amount: f64, units: String },
    Increment { delta: i32 },
    Lap { marker: String },
    Group { name: String },
}

impl FragmentValue {
    pub fn kind(&self) -> FragmentKind {
        match self {
            Self::Duration { .. } => FragmentKind::Duration,
            Self::Rep { .. } => FragmentKind::Rep,
            Self::Rounds { .. } => FragmentKind::Rounds,
            Self::Timer { .. } => FragmentKind::Timer,
            Self::Elapsed { .. } => FragmentKind::Elapsed,
            Self::Total { .. } => FragmentKind::Total,
            Self::Spans { .. } => FragmentKind::Spans,
            Self::SystemTime { .. } => FragmentKind::SystemTime,
            Self::CurrentRound { .. } => FragmentKind::CurrentRound,
            Self::Text { .. } => FragmentKind::Text,
            Self::Label { .. } => FragmentKind::Label,
            Self::Action { .. } => FragmentKind::Action,
            Self::Effort { .. } => FragmentKind::Effort,
            Self::Resistance { .. } => FragmentKind::Resistance,
            Self::Distance { .. } => FragmentKind::Distance,
            Self::Increment { .. } => FragmentKind::Increment,
            Self::Lap { .. } => FragmentKind::Lap,
            Self::Group { .. } => FragmentKind::Group,
        }
    }

    /// Display string derived from the payload. Constructors use this when
    /// the producer does not supply a custom image.
    pub fn default_image(&self) -> String {
        match self {
            Self::Duration { ms } | Self::Elapsed { ms } | Self::Total { ms } => {
                format_duration(*ms)
            }
            Self::Rep { scheme } if scheme.is_empty() => "?".to_string(),
            Self::Rep { scheme } => scheme
                .iter()
                .map(u32::to_string)
                .collect::<Vec<_>>()
                .join("-"),
            Self::Rounds { total } => format!("{total} rounds"),
            Self::Timer { state } => format_duration_opt(state.duration_ms),
            Self::Spans { spans } => spans_image(spans),
            Self::SystemTime { at } => system_time_image(*at),
            Self::CurrentRound {
                current,
                total: Some(total),
            } => format!("Round {current} of {total}"),
            Self::CurrentRound { current, total: None } => format!("Round {current}"),
            Self::Text { text } | Self::Label { text } => text.clone(),
            Self::Action { name } => name.clone(),
            Self::Effort { name } => name.clone(),
            Self::Resistance { amount, units } | Self::Distance { amount, units } => {
                format!("{amount}{units}")
            }
            Self::Increment { delta } => format!("{delta:+}"),
            Self::Lap { marker } => marker.clone(),
            Self::Group { name } => name.clone(),
        }
    }
}

/// A typed value node with provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fragment {
    pub value: FragmentValue,
    pub image: String,
    pub origin: FragmentOrigin,
    pub role: MetricRole,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_block: Option<BlockKey>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<EpochMs>,
}

impl Fragment {
    pub fn new(value: FragmentValue, origin: FragmentOrigin) -> Self {
        let image = value.default_image();
        Self {
            value,
            image,
            origin,
            role: MetricRole::default(),
            source_block: None,
            timestamp: None,
        }
    }

    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = image.into();
        self
    }

    pub fn with_role(mut self, role: MetricRole) -> Self {
        self.role = role;
        self
    }

    pub fn with_source(mut self, key: BlockKey) -> Self {
        self.source_block = Some(key);
        self
    }

    pub fn with_timestamp(mut self, at: EpochMs) -> Self {
        self.timestamp = Some(at);
        self
    }

    pub fn kind(&self) -> FragmentKind {
        self.value.kind()
    }
}

/// Pick the authoritative fragment of `kind` out of a mixed list: highest
/// origin rank wins, and among equals the most recently appended.
pub fn resolve_precedence<'a>(
    fragments: &'a [Fragment],
    kind: FragmentKind,
) -> Option<&'a Fragment> {
    fragments
        .iter()
        .filter(|f| f.kind() == kind)
        .max_by_key(|f| f.origin.rank())
}

/// All fragments of one kind, in list order.
pub fn fragments_of_kind<'a>(
    fragments: &'a [Fragment],
    kind: FragmentKind,
) -> impl Iterator<Item = &'a Fragment> {
    fragments.iter().filter(move |f| f.kind() == kind)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rep(scheme: &[u32], origin: FragmentOrigin) -> Fragment {
        Fragment::new(
            FragmentValue::Rep {
                scheme: scheme.to_vec(),
            },
            origin,
        )
    }

    #[test]
    fn user_outranks_runtime_outranks_parser() {
        let frags = vec![
            rep(&[21], FragmentOrigin::Parser),
            rep(&[15], FragmentOrigin::Runtime),
            rep(&[9], FragmentOrigin::User),
            rep(&[5], FragmentOrigin::Compiler),
        ];
        let winner = resolve_precedence(&frags, FragmentKind::Rep).unwrap();
        assert_eq!(winner.origin, FragmentOrigin::User);
    }

    #[test]
    fn later_write_wins_among_equal_ranks() {
        let frags = vec![rep(&[1], FragmentOrigin::Runtime), rep(&[2], FragmentOrigin::Runtime)];
        let winner = resolve_precedence(&frags, FragmentKind::Rep).unwrap();
        assert_eq!(
            winner.value,
            FragmentValue::Rep { scheme: vec![2] }
        );
    }

    #[test]
    fn collected_ranks_with_user() {
        assert_eq!(
            FragmentOrigin::Collected.rank(),
            FragmentOrigin::User.rank()
        );
    }

    #[test]
    fn precedence_ignores_other_kinds() {
        let frags = vec![
            Fragment::new(
                FragmentValue::Rounds { total: 3 },
                FragmentOrigin::User,
            ),
            rep(&[21, 15, 9], FragmentOrigin::Parser),
        ];
        let winner = resolve_precedence(&frags, FragmentKind::Rep).unwrap();
        assert_eq!(winner.origin, FragmentOrigin::Parser);
        assert!(resolve_precedence(&frags, FragmentKind::Duration).is_none());
    }

    #[test]
    fn default_images() {
        assert_eq!(rep(&[21, 15, 9], FragmentOrigin::Parser).image, "21-15-9");
        assert_eq!(rep(&[], FragmentOrigin::Parser).image, "?");
        let round = Fragment::new(
            FragmentValue::CurrentRound {
                current: 2,
                total: Some(3),
            },
            FragmentOrigin::Runtime,
        );
        assert_eq!(round.image, "Round 2 of 3");
        let unbounded = Fragment::new(
            FragmentValue::CurrentRound {
                current: 7,
                total: None,
            },
            FragmentOrigin::Runtime,
        );
        assert_eq!(unbounded.image, "Round 7");
        let elapsed = Fragment::new(FragmentValue::Elapsed { ms: 45_000 }, FragmentOrigin::Runtime);
        assert_eq!(elapsed.image, "0:45");
    }
}
