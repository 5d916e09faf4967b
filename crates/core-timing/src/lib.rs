//! Pause-aware interval arithmetic: spans, timer state, elapsed vs total.
//!
//! A timer is a list of `(started, ended?)` spans. Pausing closes the open
//! span; resuming opens a new one. `elapsed` sums span durations (ignores
//! paused gaps); `total` brackets first start to last end (includes them).
//! All timestamps are epoch milliseconds supplied by the caller; this crate
//! never reads a clock.

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod format;

pub use format::{format_duration, format_duration_opt, spans_image, system_time_image};

/// Epoch milliseconds. The runtime injects these; wall-clock reads never
/// happen below the driver.
pub type EpochMs = u64;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TimingError {
    #[error("span {index} is open but not last")]
    OpenSpanNotLast { index: usize },
    #[error("span {index} ends before it starts ({started} > {ended})")]
    NegativeSpan {
        index: usize,
        started: EpochMs,
        ended: EpochMs,
    },
    #[error("span {index} starts before span {} ended", index - 1)]
    OverlappingSpans { index: usize },
}

/// A `(started, ended?)` interval. Open while `ended` is `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSpan {
    pub started: EpochMs,
    pub ended: Option<EpochMs>,
}

impl TimeSpan {
    pub fn open(started: EpochMs) -> Self {
        Self {
            started,
            ended: None,
        }
    }

    pub fn closed(started: EpochMs, ended: EpochMs) -> Self {
        Self {
            started,
            ended: Some(ended),
        }
    }

    pub fn is_open(&self) -> bool {
        self.ended.is_none()
    }

    /// Duration up to `now` for an open span, or the recorded duration.
    pub fn duration(&self, now: EpochMs) -> u64 {
        self.ended.unwrap_or(now).saturating_sub(self.started)
    }
}

/// Counting direction for display and completion checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerDirection {
    #[default]
    Up,
    Down,
}

/// Which timer a multi-timer display should foreground.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerRole {
    Primary,
    Secondary,
    #[default]
    Auto,
}

/// Full timer value stored in a block's `timer` memory location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerState {
    pub spans: Vec<TimeSpan>,
    pub duration_ms: Option<u64>,
    pub direction: TimerDirection,
    pub label: String,
    pub role: TimerRole,
}

impl TimerState {
    pub fn new(
        direction: TimerDirection,
        duration_ms: Option<u64>,
        label: impl Into<String>,
        role: TimerRole,
    ) -> Self {
        Self {
            spans: Vec::new(),
            duration_ms,
            direction,
            label: label.into(),
            role,
        }
    }

    /// Open the first (or next) span at `now`. No-op when a span is already
    /// open — starting a running timer must not fork spans.
    pub fn start(&mut self, now: EpochMs) {
        if !self.is_running() {
            self.spans.push(TimeSpan::open(now));
        }
    }

    /// Close the open span at `now`. Pausing a paused timer is a no-op.
    pub fn pause(&mut self, now: EpochMs) {
        if let Some(last) = self.spans.last_mut()
            && last.is_open()
        {
            last.ended = Some(now);
        }
    }

    /// Append a fresh open span at `now`. Resuming a running timer is a
    /// no-op.
    pub fn resume(&mut self, now: EpochMs) {
        if !self.is_running() {
            self.spans.push(TimeSpan::open(now));
        }
    }

    pub fn is_running(&self) -> bool {
        self.spans.last().is_some_and(TimeSpan::is_open)
    }

    /// Sum of span durations; paused gaps do not count.
    pub fn elapsed(&self, now: EpochMs) -> u64 {
        self.spans.iter().map(|s| s.duration(now)).sum()
    }

    /// First start to last end (or `now` while running); paused gaps count.
    pub fn total(&self, now: EpochMs) -> u64 {
        let Some(first) = self.spans.first() else {
            return 0;
        };
        let last = self.spans.last().expect("non-empty");
        last.ended.unwrap_or(now).saturating_sub(first.started)
    }

    /// Countdown remainder; zero once expired. `None` for unbounded timers.
    pub fn remaining(&self, now: EpochMs) -> Option<u64> {
        self.duration_ms.map(|d| d.saturating_sub(self.elapsed(now)))
    }

    pub fn is_expired(&self, now: EpochMs) -> bool {
        self.duration_ms
            .is_some_and(|d| self.elapsed(now) >= d)
    }

    /// Check span ordering: closed-before-last, non-negative, non-overlapping.
    pub fn validate(&self) -> Result<(), TimingError> {
        for (i, span) in self.spans.iter().enumerate() {
            if span.ended.is_none() && i + 1 != self.spans.len() {
                return Err(TimingError::OpenSpanNotLast { index: i });
            }
            if let Some(ended) = span.ended
                && ended < span.started
            {
                return Err(TimingError::NegativeSpan {
                    index: i,
                    started: span.started,
                    ended,
                });
            }
            if i > 0 {
                let prev_end = self.spans[i - 1].ended.expect("checked above");
                if span.started < prev_end {
                    return Err(TimingError::OverlappingSpans { index: i });
                }
            }
        }
        Ok(())
    }
}

/// Free-function form used by behaviors that hold a timer fragment rather
/// than the state itself.
pub fn calculate_elapsed(timer: &TimerState, now: EpochMs) -> u64 {
    timer.elapsed(now)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn running_timer(started: EpochMs) -> TimerState {
        let mut t = TimerState::new(TimerDirection::Up, None, "work", TimerRole::Primary);
        t.start(started);
        t
    }

    #[test]
    fn elapsed_accumulates_while_running() {
        let t = running_timer(1_000);
        assert_eq!(t.elapsed(1_000), 0);
        assert_eq!(t.elapsed(4_500), 3_500);
    }

    #[test]
    fn pause_excludes_gap_total_includes_it() {
        let mut t = running_timer(0);
        t.pause(3_000);
        t.resume(8_000);
        let now = 10_000;
        assert_eq!(t.elapsed(now), 5_000);
        assert_eq!(t.total(now), 10_000);
        assert!(t.total(now) >= t.elapsed(now));
        assert_eq!(t.spans.len(), 2);
    }

    #[test]
    fn pause_twice_leaves_one_closed_span() {
        let mut t = running_timer(0);
        t.pause(1_000);
        t.pause(2_000);
        assert_eq!(t.spans.len(), 1);
        assert_eq!(t.spans[0].ended, Some(1_000));
    }

    #[test]
    fn resume_twice_leaves_one_open_span() {
        let mut t = running_timer(0);
        t.pause(1_000);
        t.resume(2_000);
        t.resume(3_000);
        assert_eq!(t.spans.len(), 2);
        assert!(t.spans[1].is_open());
        assert_eq!(t.spans[1].started, 2_000);
    }

    #[test]
    fn elapsed_monotonic_without_pause() {
        let t = running_timer(500);
        let mut prev = 0;
        for now in (500..5_000).step_by(250) {
            let e = t.elapsed(now);
            assert!(e >= prev);
            prev = e;
        }
    }

    #[test]
    fn remaining_saturates_at_zero() {
        let mut t = TimerState::new(
            TimerDirection::Down,
            Some(2_000),
            "rest",
            TimerRole::Primary,
        );
        t.start(0);
        assert_eq!(t.remaining(500), Some(1_500));
        assert_eq!(t.remaining(9_000), Some(0));
        assert!(t.is_expired(2_000));
        assert!(!t.is_expired(1_999));
    }

    #[test]
    fn validate_rejects_overlap_and_inner_open() {
        let mut t = running_timer(0);
        t.pause(2_000);
        t.spans.push(TimeSpan::open(1_500));
        assert_eq!(
            t.validate(),
            Err(TimingError::OverlappingSpans { index: 1 })
        );

        let mut t = TimerState::new(TimerDirection::Up, None, "t", TimerRole::Auto);
        t.spans.push(TimeSpan::open(0));
        t.spans.push(TimeSpan::closed(5, 6));
        assert_eq!(t.validate(), Err(TimingError::OpenSpanNotLast { index: 0 }));
    }

    #[test]
    fn empty_timer_reports_zero() {
        let t = TimerState::new(TimerDirection::Up, None, "idle", TimerRole::Auto);
        assert_eq!(t.elapsed(99), 0);
        assert_eq!(t.total(99), 0);
        assert!(!t.is_running());
    }
}
