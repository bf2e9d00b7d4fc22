use std::collections::BTreeMap;

use chrono::NaiveDate;
use chrono_tz::Tz;
use tracing::{debug, warn};

use crate::datetime::{day_key, local_date};

/// Submission counts keyed by canonical day-key (epoch seconds of local
/// midnight). Holds at most one entry per calendar day.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CanonicalCalendar {
    days: BTreeMap<i64, u64>,
}

impl CanonicalCalendar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a calendar from keys that are already canonical, e.g. a
    /// persisted record. Repeated keys are summed.
    pub fn from_day_keys<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (i64, u64)>,
    {
        let mut calendar = Self::new();
        for (key, count) in entries {
            calendar.add(key, count);
        }
        calendar
    }

    pub fn add(&mut self, day_key: i64, count: u64) {
        let slot = self.days.entry(day_key).or_insert(0);
        *slot = slot.saturating_add(count);
    }

    pub fn count_for_key(&self, day_key: i64) -> u64 {
        self.days.get(&day_key).copied().unwrap_or(0)
    }

    pub fn count_on(&self, date: NaiveDate, tz: &Tz) -> u64 {
        self.count_for_key(day_key(date, tz))
    }

    pub fn iter(&self) -> impl Iterator<Item = (i64, u64)> + '_ {
        self.days.iter().map(|(key, count)| (*key, *count))
    }

    pub fn len(&self) -> usize {
        self.days.len()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    pub fn total_submissions(&self) -> u64 {
        self.days.values().fold(0, |acc, count| acc.saturating_add(*count))
    }
}

/// Buckets raw `(epoch seconds, count)` entries by the local day they fall
/// on, summing entries that share a day.
pub fn normalize<I>(raw: I, tz: &Tz) -> CanonicalCalendar
where
    I: IntoIterator<Item = (i64, u64)>,
{
    let mut calendar = CanonicalCalendar::new();
    for (epoch_seconds, count) in raw {
        let Some(date) = local_date(epoch_seconds, tz) else {
            debug!(epoch_seconds, "timestamp outside representable range; skipping");
            continue;
        };
        calendar.add(day_key(date, tz), count);
    }
    calendar
}

/// Parses the JSON-encoded `submissionCalendar` string of a profile payload.
///
/// Anything that is not an object of non-negative integers yields an empty
/// calendar; keys that are not decimal integers are skipped.
#[tracing::instrument(skip(payload, tz), fields(bytes = payload.len()))]
pub fn parse_submission_calendar(payload: &str, tz: &Tz) -> CanonicalCalendar {
    let trimmed = payload.trim();
    if trimmed.is_empty() {
        debug!("submission calendar payload empty");
        return CanonicalCalendar::new();
    }

    let decoded: BTreeMap<String, u64> = match serde_json::from_str(trimmed) {
        Ok(decoded) => decoded,
        Err(err) => {
            warn!(error = %err, "malformed submission calendar; using empty calendar");
            return CanonicalCalendar::new();
        }
    };

    let mut raw = Vec::with_capacity(decoded.len());
    let mut skipped = 0_usize;
    for (key, count) in decoded {
        match key.trim().parse::<i64>() {
            Ok(epoch_seconds) => raw.push((epoch_seconds, count)),
            Err(_) => skipped += 1,
        }
    }

    let calendar = normalize(raw, tz);
    debug!(days = calendar.len(), skipped, "normalized submission calendar");
    calendar
}
