//! Timeline index for lyric lines and chord spans
//!
//! A [`Timeline`] keeps intervals sorted by start time and answers "which item
//! is active at time t" under one of two [`LookupPolicy`] rules. A [`Tracker`]
//! remembers the previous answer so callers only redraw on change.

use serde::{Deserialize, Serialize};

/// A payload tagged with a `[start, end)` span in seconds.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Interval<T> {
    pub payload: T,
    pub start_seconds: f64,
    pub end_seconds: f64,
}

impl<T> Interval<T> {
    pub fn new(payload: T, start_seconds: f64, end_seconds: f64) -> Self {
        Self {
            payload,
            start_seconds,
            end_seconds,
        }
    }

    pub fn contains(&self, t: f64) -> bool {
        self.start_seconds <= t && t < self.end_seconds
    }
}

/// How an interval qualifies as active at time `t`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LookupPolicy {
    /// Active iff `start <= t < end`
    Bounded,
    /// Active iff `start <= t`; the end is ignored
    Monotonic,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Timeline<T> {
    items: Vec<Interval<T>>,
}

impl<T> Default for Timeline<T> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

impl<T> Timeline<T> {
    /// Build a timeline. Items are stably sorted by start time, so entries
    /// sharing a start keep their input order.
    pub fn new(mut items: Vec<Interval<T>>) -> Self {
        items.sort_by(|a, b| a.start_seconds.total_cmp(&b.start_seconds));
        Self { items }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Interval<T>> {
        self.items.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Interval<T>> {
        self.items.iter()
    }

    /// Index of the last interval (in sorted order) active at `t`.
    ///
    /// # Example
    /// ```
    /// use kplay::timeline::{Interval, LookupPolicy, Timeline};
    ///
    /// let timeline = Timeline::new(vec![
    ///     Interval::new("C", 0.0, 4.0),
    ///     Interval::new("G", 4.0, 8.0),
    /// ]);
    /// assert_eq!(timeline.active_index(3.9, LookupPolicy::Bounded), Some(0));
    /// assert_eq!(timeline.active_index(4.0, LookupPolicy::Bounded), Some(1));
    /// assert_eq!(timeline.active_index(8.0, LookupPolicy::Bounded), None);
    /// assert_eq!(timeline.active_index(8.0, LookupPolicy::Monotonic), Some(1));
    /// ```
    pub fn active_index(&self, t: f64, policy: LookupPolicy) -> Option<usize> {
        // Number of intervals that have started by t
        let started = self.items.partition_point(|item| item.start_seconds <= t);
        if started == 0 {
            return None;
        }
        match policy {
            LookupPolicy::Monotonic => Some(started - 1),
            LookupPolicy::Bounded => (0..started).rev().find(|&i| t < self.items[i].end_seconds),
        }
    }

    pub fn active(&self, t: f64, policy: LookupPolicy) -> Option<&Interval<T>> {
        self.active_index(t, policy).map(|i| &self.items[i])
    }
}

/// A change of the active item, as reported by [`Tracker::update`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub previous: Option<usize>,
    pub current: Option<usize>,
}

/// Remembers the last active index and reports only changes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tracker {
    current: Option<usize>,
}

impl Tracker {
    pub fn current(&self) -> Option<usize> {
        self.current
    }

    pub fn update(&mut self, index: Option<usize>) -> Option<Transition> {
        if index == self.current {
            return None;
        }
        let previous = std::mem::replace(&mut self.current, index);
        Some(Transition {
            previous,
            current: index,
        })
    }

    pub fn reset(&mut self) -> Option<Transition> {
        self.update(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn two_bars() -> Timeline<&'static str> {
        Timeline::new(vec![Interval::new("a", 0.0, 4.0), Interval::new("b", 4.0, 8.0)])
    }

    #[test_case(3.9, Some(0) ; "inside first")]
    #[test_case(4.0, Some(1) ; "boundary belongs to second")]
    #[test_case(8.0, None ; "end is exclusive")]
    #[test_case(-0.5, None ; "before first")]
    fn test_bounded_lookup(t: f64, expected: Option<usize>) {
        assert_eq!(two_bars().active_index(t, LookupPolicy::Bounded), expected);
    }

    #[test]
    fn test_monotonic_ignores_end() {
        let timeline = two_bars();
        assert_eq!(timeline.active_index(100.0, LookupPolicy::Monotonic), Some(1));
        assert_eq!(timeline.active_index(-1.0, LookupPolicy::Monotonic), None);
        assert_eq!(timeline.active_index(0.0, LookupPolicy::Monotonic), Some(0));
    }

    #[test]
    fn test_gap_between_intervals() {
        let timeline = Timeline::new(vec![Interval::new("a", 0.0, 2.0), Interval::new("b", 4.0, 6.0)]);
        assert_eq!(timeline.active_index(3.0, LookupPolicy::Bounded), None);
        assert_eq!(timeline.active_index(3.0, LookupPolicy::Monotonic), Some(0));
    }

    #[test]
    fn test_overlap_takes_last_match() {
        let timeline = Timeline::new(vec![
            Interval::new("long", 0.0, 10.0),
            Interval::new("short", 2.0, 3.0),
        ]);
        assert_eq!(timeline.active_index(2.5, LookupPolicy::Bounded), Some(1));
        // Once the later interval ends, the earlier one is active again
        assert_eq!(timeline.active_index(5.0, LookupPolicy::Bounded), Some(0));
    }

    #[test]
    fn test_sorts_unordered_input() {
        let timeline = Timeline::new(vec![Interval::new("b", 4.0, 8.0), Interval::new("a", 0.0, 4.0)]);
        assert_eq!(timeline.get(0).map(|i| i.payload), Some("a"));
        assert_eq!(timeline.active(5.0, LookupPolicy::Bounded).map(|i| i.payload), Some("b"));
    }

    #[test]
    fn test_empty_timeline() {
        let timeline: Timeline<String> = Timeline::default();
        assert!(timeline.is_empty());
        assert_eq!(timeline.active_index(1.0, LookupPolicy::Monotonic), None);
    }

    #[test]
    fn test_tracker_reports_only_changes() {
        let timeline = two_bars();
        let mut tracker = Tracker::default();

        let first = tracker.update(timeline.active_index(0.5, LookupPolicy::Bounded));
        assert_eq!(first, Some(Transition { previous: None, current: Some(0) }));
        assert_eq!(tracker.update(timeline.active_index(1.5, LookupPolicy::Bounded)), None);

        let second = tracker.update(timeline.active_index(4.5, LookupPolicy::Bounded));
        assert_eq!(second, Some(Transition { previous: Some(0), current: Some(1) }));

        assert!(tracker.reset().is_some());
        assert_eq!(tracker.reset(), None);
        assert_eq!(tracker.current(), None);
    }
}
