use crate::domain::models::MINUTES_PER_DAY;
use serde::{Deserialize, Serialize};

/// Half-open minute range `[start, end)` inside one day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interval {
    pub start: u32,
    pub end: u32,
}

impl Interval {
    /// Clips both ends to the day and never lets `end` fall before `start`.
    pub fn new(start: u32, end: u32) -> Self {
        let start = start.min(MINUTES_PER_DAY);
        let end = end.min(MINUTES_PER_DAY).max(start);
        Self { start, end }
    }

    pub fn intersects(&self, other: &Interval) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// Coalesces touching or overlapping intervals into a sorted, disjoint list.
///
/// Zero-width intervals are kept: they still mark a point the slot search
/// must not straddle.
pub fn merge_intervals(mut intervals: Vec<Interval>) -> Vec<Interval> {
    intervals.sort_unstable_by(|left, right| {
        left.start
            .cmp(&right.start)
            .then_with(|| left.end.cmp(&right.end))
    });

    let mut merged: Vec<Interval> = Vec::with_capacity(intervals.len());
    for interval in intervals {
        match merged.last_mut() {
            Some(last) if interval.start <= last.end => {
                if interval.end > last.end {
                    last.end = interval.end;
                }
            }
            _ => merged.push(interval),
        }
    }
    merged
}

/// Earliest start inside `[window_start, window_end)` where `duration_min` fits.
///
/// A candidate placed before an occupied interval must leave `buffer_min` free
/// minutes ahead of it. No buffer is needed when nothing follows the candidate.
pub fn find_slot(
    occupied: &[Interval],
    duration_min: u32,
    window_start: u32,
    window_end: u32,
    buffer_min: u32,
) -> Option<u32> {
    let merged = merge_intervals(occupied.to_vec());
    let mut cursor = window_start;

    for interval in &merged {
        if interval.end <= cursor {
            continue;
        }
        let candidate_end = cursor.saturating_add(duration_min);
        if candidate_end.saturating_add(buffer_min) <= interval.start && candidate_end <= window_end
        {
            return Some(cursor);
        }
        cursor = cursor.max(interval.end);
    }

    (cursor.saturating_add(duration_min) <= window_end).then_some(cursor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const BUFFER: u32 = 10;

    fn iv(start: u32, end: u32) -> Interval {
        Interval::new(start, end)
    }

    fn covered_minutes(intervals: &[Interval]) -> Vec<bool> {
        let mut minutes = vec![false; MINUTES_PER_DAY as usize];
        for interval in intervals {
            for minute in interval.start..interval.end {
                minutes[minute as usize] = true;
            }
        }
        minutes
    }

    #[test]
    fn merge_of_empty_input_is_empty() {
        assert!(merge_intervals(Vec::new()).is_empty());
    }

    #[test]
    fn merge_coalesces_touching_and_overlapping_intervals() {
        let merged = merge_intervals(vec![iv(600, 660), iv(540, 600), iv(630, 700), iv(800, 810)]);
        assert_eq!(merged, vec![iv(540, 700), iv(800, 810)]);
    }

    #[test]
    fn merge_keeps_contained_interval_inside_outer_one() {
        let merged = merge_intervals(vec![iv(0, 1440), iv(540, 600)]);
        assert_eq!(merged, vec![iv(0, 1440)]);
    }

    #[test]
    fn merge_keeps_zero_width_intervals() {
        let merged = merge_intervals(vec![iv(700, 700), iv(570, 570), iv(600, 620), iv(620, 620)]);
        assert_eq!(merged, vec![iv(570, 570), iv(600, 620), iv(700, 700)]);
    }

    #[test]
    fn interval_new_clips_to_day() {
        assert_eq!(Interval::new(1400, 1500), iv(1400, 1440));
        assert_eq!(Interval::new(700, 600), iv(700, 700));
    }

    // 9:00-10:00 busy, 10:30-11:00 busy: the 10:00 gap is 30 minutes, too
    // short for 30 minutes plus the buffer, so the first fit is 11:00.
    #[test]
    fn find_slot_skips_gap_without_room_for_buffer() {
        let occupied = vec![iv(540, 600), iv(630, 660)];
        assert_eq!(find_slot(&occupied, 30, 540, 1080, BUFFER), Some(660));
    }

    #[test]
    fn find_slot_on_empty_day_returns_window_start() {
        assert_eq!(find_slot(&[], 45, 540, 1080, BUFFER), Some(540));
    }

    #[test]
    fn find_slot_accepts_gap_with_exact_buffer() {
        let occupied = vec![iv(580, 620)];
        assert_eq!(find_slot(&occupied, 30, 540, 1080, BUFFER), Some(540));
    }

    #[test]
    fn find_slot_needs_no_buffer_at_window_end() {
        let occupied = vec![iv(540, 1050)];
        assert_eq!(find_slot(&occupied, 30, 540, 1080, BUFFER), Some(1050));
    }

    #[test]
    fn find_slot_treats_zero_width_interval_as_a_boundary() {
        assert_eq!(find_slot(&[iv(570, 570)], 30, 540, 1080, BUFFER), Some(570));
        assert_eq!(find_slot(&[iv(1183, 1183)], 5, 1179, 1184, BUFFER), None);
    }

    #[test]
    fn find_slot_returns_none_when_window_is_full() {
        let occupied = vec![iv(540, 1060)];
        assert_eq!(find_slot(&occupied, 30, 540, 1080, BUFFER), None);
    }

    #[test]
    fn find_slot_ignores_intervals_before_window() {
        let occupied = vec![iv(0, 300), iv(500, 560)];
        assert_eq!(find_slot(&occupied, 30, 540, 1080, BUFFER), Some(560));
    }

    #[test]
    fn find_slot_is_independent_of_input_order() {
        let forward = vec![iv(540, 600), iv(630, 660), iv(700, 720)];
        let mut reversed = forward.clone();
        reversed.reverse();
        assert_eq!(
            find_slot(&forward, 30, 540, 1080, BUFFER),
            find_slot(&reversed, 30, 540, 1080, BUFFER)
        );
    }

    fn interval_strategy() -> impl Strategy<Value = Interval> {
        (0u32..MINUTES_PER_DAY, 0u32..300u32)
            .prop_map(|(start, length)| Interval::new(start, start + length))
    }

    proptest! {
        #[test]
        fn merge_is_sorted_disjoint_and_preserves_coverage(
            intervals in prop::collection::vec(interval_strategy(), 1..40)
        ) {
            let merged = merge_intervals(intervals.clone());

            for pair in merged.windows(2) {
                prop_assert!(pair[0].end < pair[1].start);
            }
            prop_assert_eq!(covered_minutes(&merged), covered_minutes(&intervals));
            prop_assert_eq!(merge_intervals(merged.clone()), merged);
        }

        #[test]
        fn found_slot_never_intersects_occupied_time(
            occupied in prop::collection::vec(interval_strategy(), 0..20),
            duration in 5u32..=600u32,
            window_start in 0u32..MINUTES_PER_DAY,
            extra in 0u32..600u32,
        ) {
            let window_end = (window_start + duration + extra).min(MINUTES_PER_DAY);
            prop_assume!(duration <= window_end - window_start);

            if let Some(slot) = find_slot(&occupied, duration, window_start, window_end, BUFFER) {
                let candidate = Interval::new(slot, slot + duration);
                prop_assert!(slot >= window_start);
                prop_assert!(slot + duration <= window_end);
                for interval in &occupied {
                    prop_assert!(!candidate.intersects(interval));
                }
            }
        }
    }
}
