use chrono_tz::Tz;

use crate::calendar::{CanonicalCalendar, parse_submission_calendar};

/// What the fetch collaborator hands over: the solved total and the
/// submission calendar still in its raw JSON-string form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawStats {
    pub total_solved: u64,
    pub submission_calendar: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Stats {
    pub total_solved: u64,
    pub calendar: CanonicalCalendar,
}

impl Stats {
    pub fn new(total_solved: u64, calendar: CanonicalCalendar) -> Self {
        Self {
            total_solved,
            calendar,
        }
    }

    /// Normalizes the raw calendar. A broken calendar still yields stats with
    /// the total intact.
    pub fn from_raw(raw: &RawStats, tz: &Tz) -> Self {
        Self {
            total_solved: raw.total_solved,
            calendar: parse_submission_calendar(&raw.submission_calendar, tz),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{RawStats, Stats};

    #[test]
    fn broken_calendar_keeps_total() {
        let raw = RawStats {
            total_solved: 321,
            submission_calendar: "{oops".to_string(),
        };
        let stats = Stats::from_raw(&raw, &chrono_tz::UTC);
        assert_eq!(stats.total_solved, 321);
        assert!(stats.calendar.is_empty());
    }
}
