use std::collections::BTreeMap;

use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::store::{slot_time, VoteTable};

/// The hourly marks a single vote covers: every hour in
/// `[start, start + span]` inclusive, so a 3-hour span yields 4 marks.
pub fn expand_slots(start: NaiveDateTime, span_hours: u32) -> Vec<NaiveDateTime> {
    (0..=i64::from(span_hours))
        .map(|h| start + Duration::hours(h))
        .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistogramBucket {
    #[serde(with = "slot_time")]
    pub slot: NaiveDateTime,
    pub weight: u32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Window {
    #[serde(with = "slot_time")]
    pub start: NaiveDateTime,
    #[serde(with = "slot_time")]
    pub end: NaiveDateTime,
}

/// Accumulated vote weight per hourly slot, summed over the expanded window
/// of every row in the table.
#[derive(Debug, Clone, Default)]
pub struct Tally {
    weights: BTreeMap<NaiveDateTime, u32>,
}

impl Tally {
    pub fn from_table(table: &VoteTable, span_hours: u32) -> Self {
        let mut weights: BTreeMap<NaiveDateTime, u32> = BTreeMap::new();
        for row in table.rows() {
            for mark in expand_slots(row.start_time, span_hours) {
                *weights.entry(mark).or_insert(0) += row.votes;
            }
        }
        Self { weights }
    }

    pub fn weight_at(&self, mark: NaiveDateTime) -> u32 {
        self.weights.get(&mark).copied().unwrap_or(0)
    }

    /// The span-wide window anchored at the heaviest hourly mark. Ties go to
    /// the earliest mark, which the ordered map makes deterministic. None for
    /// an empty poll.
    pub fn best_window(&self, span_hours: u32) -> Option<Window> {
        let mut best: Option<(NaiveDateTime, u32)> = None;
        for (&mark, &weight) in &self.weights {
            let beats_current = match best {
                Some((_, best_weight)) => weight > best_weight,
                None => true,
            };
            if beats_current {
                best = Some((mark, weight));
            }
        }
        best.map(|(start, _)| Window {
            start,
            end: start + Duration::hours(i64::from(span_hours)),
        })
    }

    /// Time-ordered (slot, weight) pairs for the frequency chart.
    pub fn buckets(&self) -> Vec<HistogramBucket> {
        self.weights
            .iter()
            .map(|(&slot, &weight)| HistogramBucket { slot, weight })
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn slot(hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 9, 1)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    fn table(entries: &[(u32, u32)]) -> VoteTable {
        let mut table = VoteTable::default();
        for &(hour, votes) in entries {
            for _ in 0..votes {
                table.upsert(slot(hour));
            }
        }
        table
    }

    #[test]
    fn three_hour_span_expands_to_four_marks() {
        let marks = expand_slots(slot(9), 3);
        assert_eq!(marks, vec![slot(9), slot(10), slot(11), slot(12)]);
    }

    #[test]
    fn single_row_weights_every_covered_hour() {
        let tally = Tally::from_table(&table(&[(9, 2)]), 3);
        for hour in 9..=12 {
            assert_eq!(tally.weight_at(slot(hour)), 2);
        }
        assert_eq!(tally.weight_at(slot(13)), 0);
    }

    #[test]
    fn overlapping_rows_accumulate() {
        // 10:00 vote covers 10-13, overlapping the 9:00 vote's 9-12.
        let tally = Tally::from_table(&table(&[(9, 1), (10, 1)]), 3);
        assert_eq!(tally.weight_at(slot(9)), 1);
        assert_eq!(tally.weight_at(slot(10)), 2);
        assert_eq!(tally.weight_at(slot(12)), 2);
        assert_eq!(tally.weight_at(slot(13)), 1);
    }

    #[test]
    fn best_window_picks_heaviest_slot() {
        let tally = Tally::from_table(&table(&[(9, 5), (14, 1)]), 3);
        let window = tally.best_window(3).expect("window");
        assert_eq!(window.start, slot(9));
        assert_eq!(window.end, slot(12));
    }

    #[test]
    fn best_window_tie_goes_to_earliest() {
        let tally = Tally::from_table(&table(&[(14, 2), (9, 2)]), 3);
        assert_eq!(tally.best_window(3).expect("window").start, slot(9));
    }

    #[test]
    fn empty_table_has_no_window() {
        let tally = Tally::from_table(&VoteTable::default(), 3);
        assert!(tally.best_window(3).is_none());
        assert!(tally.buckets().is_empty());
    }

    #[test]
    fn buckets_are_time_ordered() {
        let tally = Tally::from_table(&table(&[(14, 1), (9, 1)]), 3);
        let buckets = tally.buckets();
        assert_eq!(buckets.first().map(|b| b.slot), Some(slot(9)));
        assert!(buckets.windows(2).all(|pair| pair[0].slot < pair[1].slot));
    }
}
