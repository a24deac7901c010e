//! Sliding-window write-rate observer (spec.md §4.1, §9).
//!
//! Never gates — it only observes and logs. A real implementation uses a
//! double-ended queue, never a list with `pop(0)` (spec.md §9); pruning is
//! O(evicted) amortized, not O(n) per write.

use std::collections::VecDeque;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};

const WINDOW: Duration = Duration::seconds(60);
const BURST_WINDOW: Duration = Duration::seconds(10);
const BURST_THRESHOLD: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteKind {
    Read,
    BatchUpdate,
    Append,
}

pub struct RateMonitor {
    events: Mutex<VecDeque<(DateTime<Utc>, WriteKind)>>,
}

impl Default for RateMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl RateMonitor {
    pub fn new() -> Self {
        Self {
            events: Mutex::new(VecDeque::new()),
        }
    }

    pub fn record(&self, kind: WriteKind) {
        let now = Utc::now();
        let mut events = self.events.lock().expect("rate monitor mutex poisoned");
        events.push_back((now, kind));
        Self::prune(&mut events, now);
        if Self::count_since(&events, now, BURST_WINDOW) > BURST_THRESHOLD {
            tracing::warn!(
                count = Self::count_since(&events, now, BURST_WINDOW),
                "tabular store write burst detected (>20 in 10s)"
            );
        }
    }

    /// Writes observed in the trailing 60-second window.
    pub fn rpm(&self) -> usize {
        let now = Utc::now();
        let mut events = self.events.lock().expect("rate monitor mutex poisoned");
        Self::prune(&mut events, now);
        events.len()
    }

    /// `true` if more than [`BURST_THRESHOLD`] writes landed in the trailing
    /// [`BURST_WINDOW`].
    pub fn burst(&self) -> bool {
        let now = Utc::now();
        let events = self.events.lock().expect("rate monitor mutex poisoned");
        Self::count_since(&events, now, BURST_WINDOW) > BURST_THRESHOLD
    }

    fn prune(events: &mut VecDeque<(DateTime<Utc>, WriteKind)>, now: DateTime<Utc>) {
        while let Some((ts, _)) = events.front() {
            if now - *ts > WINDOW {
                events.pop_front();
            } else {
                break;
            }
        }
    }

    fn count_since(events: &VecDeque<(DateTime<Utc>, WriteKind)>, now: DateTime<Utc>, span: Duration) -> usize {
        events.iter().filter(|(ts, _)| now - *ts <= span).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rpm_counts_recent_events() {
        let mon = RateMonitor::new();
        for _ in 0..5 {
            mon.record(WriteKind::BatchUpdate);
        }
        assert_eq!(mon.rpm(), 5);
    }

    #[test]
    fn burst_flags_past_threshold() {
        let mon = RateMonitor::new();
        assert!(!mon.burst());
        for _ in 0..21 {
            mon.record(WriteKind::BatchUpdate);
        }
        assert!(mon.burst());
    }
}
