use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use thiserror::Error;

/// User-visible reasons a submission is rejected before it touches the store.
#[derive(Debug, Error, PartialEq)]
pub enum SlotError {
    #[error("{0} is not on the hour; pick a whole-hour slot")]
    NotHourAligned(NaiveDateTime),
    #[error("{date} is on or after the deadline ({deadline}), vote again with an earlier date")]
    PastDeadline {
        date: NaiveDate,
        deadline: NaiveDate,
    },
    #[error("cannot parse time of day from {0:?}, expected HH:MM")]
    BadTime(String),
}

/// Hour alignment always applies; the deadline check only when one is
/// configured.
pub fn validate_slot(slot: NaiveDateTime, deadline: Option<NaiveDate>) -> Result<(), SlotError> {
    if slot.minute() != 0 || slot.second() != 0 {
        return Err(SlotError::NotHourAligned(slot));
    }
    if let Some(deadline) = deadline {
        if slot.date() >= deadline {
            return Err(SlotError::PastDeadline {
                date: slot.date(),
                deadline,
            });
        }
    }
    Ok(())
}

/// The roster's "None" entry and a blank field both mean an anonymous vote;
/// no ballot is recorded for those.
pub fn named_player(raw: &str) -> Option<&str> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "None" {
        None
    } else {
        Some(trimmed)
    }
}

/// Parses the `HH:MM` value an HTML time input (or the CLI) submits.
/// Seconds are tolerated for hand-typed values.
pub fn parse_time(raw: &str) -> Result<NaiveTime, SlotError> {
    let raw = raw.trim();
    NaiveTime::parse_from_str(raw, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
        .map_err(|_| SlotError::BadTime(raw.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 9, day).unwrap()
    }

    #[test]
    fn whole_hour_slot_passes() {
        let slot = date(1).and_hms_opt(9, 0, 0).unwrap();
        assert_eq!(validate_slot(slot, None), Ok(()));
    }

    #[test]
    fn half_hour_slot_is_rejected() {
        let slot = date(1).and_hms_opt(9, 30, 0).unwrap();
        assert!(matches!(
            validate_slot(slot, None),
            Err(SlotError::NotHourAligned(_))
        ));
    }

    #[test]
    fn deadline_day_and_later_are_blocked() {
        let deadline = Some(date(5));
        let on_deadline = date(5).and_hms_opt(9, 0, 0).unwrap();
        let after = date(6).and_hms_opt(9, 0, 0).unwrap();
        let before = date(4).and_hms_opt(9, 0, 0).unwrap();

        assert!(matches!(
            validate_slot(on_deadline, deadline),
            Err(SlotError::PastDeadline { .. })
        ));
        assert!(matches!(
            validate_slot(after, deadline),
            Err(SlotError::PastDeadline { .. })
        ));
        assert_eq!(validate_slot(before, deadline), Ok(()));
    }

    #[test]
    fn no_deadline_means_no_date_check() {
        let far_future = NaiveDate::from_ymd_opt(2030, 1, 1)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap();
        assert_eq!(validate_slot(far_future, None), Ok(()));
    }

    #[test]
    fn none_and_blank_players_are_anonymous() {
        assert_eq!(named_player("None"), None);
        assert_eq!(named_player(" None "), None);
        assert_eq!(named_player(""), None);
        assert_eq!(named_player("   "), None);
        assert_eq!(named_player(" Nick "), Some("Nick"));
    }

    #[test]
    fn parses_html_time_input_values() {
        assert_eq!(
            parse_time("09:00"),
            Ok(NaiveTime::from_hms_opt(9, 0, 0).unwrap())
        );
        assert_eq!(
            parse_time("18:00:00"),
            Ok(NaiveTime::from_hms_opt(18, 0, 0).unwrap())
        );
        assert!(matches!(parse_time("late"), Err(SlotError::BadTime(_))));
    }
}
