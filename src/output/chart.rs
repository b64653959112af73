use std::fmt::Write as _;

use crate::tally::HistogramBucket;

/// Terminal bar chart of per-hour vote density. Bars scale to `width`
/// characters at the heaviest slot; any nonzero weight gets at least one
/// block so sparse hours stay visible.
pub fn render_chart(buckets: &[HistogramBucket], width: usize) -> String {
    if buckets.is_empty() {
        return "No votes recorded yet.".to_string();
    }
    let width = width.max(1);
    let max = buckets.iter().map(|b| b.weight).max().unwrap_or(1).max(1);

    let mut out = String::new();
    for bucket in buckets {
        let scaled = (bucket.weight as usize * width).div_ceil(max as usize);
        let _ = writeln!(
            out,
            "{}  {} {}",
            bucket.slot.format("%Y-%m-%d %H:%M"),
            "█".repeat(scaled),
            bucket.weight
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, NaiveDateTime};

    use super::*;

    fn bucket(hour: u32, weight: u32) -> HistogramBucket {
        let slot: NaiveDateTime = NaiveDate::from_ymd_opt(2024, 9, 1)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap();
        HistogramBucket { slot, weight }
    }

    #[test]
    fn empty_chart_has_placeholder() {
        assert_eq!(render_chart(&[], 40), "No votes recorded yet.");
    }

    #[test]
    fn heaviest_slot_fills_the_width() {
        let chart = render_chart(&[bucket(9, 4), bucket(10, 1)], 8);
        let lines: Vec<_> = chart.lines().collect();
        assert!(lines[0].contains(&"█".repeat(8)));
        // 1/4 of the width.
        assert!(lines[1].contains("██ 1"));
        assert!(!lines[1].contains("███"));
    }
}
