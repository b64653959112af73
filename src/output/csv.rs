use anyhow::Result;

use crate::store::{Ballot, VoteRow, TIME_FORMAT};
use crate::tally::{HistogramBucket, Window};

pub fn results_to_csv(rows: &[VoteRow]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(vec![]);
    writer.write_record(["start_time", "votes"])?;
    for row in rows {
        writer.write_record([
            row.start_time.format(TIME_FORMAT).to_string(),
            row.votes.to_string(),
        ])?;
    }
    let data = writer.into_inner()?;
    Ok(String::from_utf8_lossy(&data).to_string())
}

pub fn histogram_to_csv(buckets: &[HistogramBucket]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(vec![]);
    writer.write_record(["slot", "weight"])?;
    for bucket in buckets {
        writer.write_record([
            bucket.slot.format(TIME_FORMAT).to_string(),
            bucket.weight.to_string(),
        ])?;
    }
    let data = writer.into_inner()?;
    Ok(String::from_utf8_lossy(&data).to_string())
}

pub fn window_to_csv(window: &Window) -> Result<String> {
    let mut writer = csv::Writer::from_writer(vec![]);
    writer.write_record(["start", "end"])?;
    writer.write_record([
        window.start.format(TIME_FORMAT).to_string(),
        window.end.format(TIME_FORMAT).to_string(),
    ])?;
    let data = writer.into_inner()?;
    Ok(String::from_utf8_lossy(&data).to_string())
}

pub fn ballots_to_csv(entries: &[Ballot]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(vec![]);
    writer.write_record(["Voted At", "Player"])?;
    for entry in entries {
        writer.write_record([
            entry.voted_at.format(TIME_FORMAT).to_string(),
            entry.player.clone(),
        ])?;
    }
    let data = writer.into_inner()?;
    Ok(String::from_utf8_lossy(&data).to_string())
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    #[test]
    fn results_csv_has_header_and_formatted_timestamps() {
        let rows = vec![VoteRow {
            start_time: NaiveDate::from_ymd_opt(2024, 9, 1)
                .unwrap()
                .and_hms_opt(9, 0, 0)
                .unwrap(),
            votes: 2,
        }];
        let out = results_to_csv(&rows).expect("csv");
        assert_eq!(out, "start_time,votes\n2024-09-01 09:00:00,2\n");
    }

    #[test]
    fn window_csv_has_start_and_end_columns() {
        let start = NaiveDate::from_ymd_opt(2024, 9, 1)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap();
        let window = Window {
            start,
            end: start + chrono::Duration::hours(3),
        };
        let out = window_to_csv(&window).expect("csv");
        assert_eq!(out, "start,end\n2024-09-01 09:00:00,2024-09-01 12:00:00\n");
    }
}
