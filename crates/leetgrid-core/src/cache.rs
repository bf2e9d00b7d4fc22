use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::calendar::CanonicalCalendar;
use crate::freshness::is_stale;
use crate::stats::Stats;

pub const CACHE_FILE_NAME: &str = "leetcode_stats.json";

/// On-disk shape of the single cache record.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredRecord {
    #[serde(rename = "totalSolved")]
    total_solved: u64,
    #[serde(rename = "submissionCalendar")]
    submission_calendar: BTreeMap<String, u64>,
    #[serde(rename = "cache_date", alias = "cacheDate")]
    cache_date: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CacheRecord {
    pub stats: Stats,
    pub saved_at: DateTime<Utc>,
}

/// Durable home of the latest stats. Every save replaces the record whole;
/// anything unreadable on load counts as no record at all.
#[derive(Debug)]
pub struct CalendarCache {
    record_path: PathBuf,
}

impl CalendarCache {
    #[tracing::instrument(skip(data_dir))]
    pub fn open(data_dir: &Path) -> anyhow::Result<Self> {
        fs::create_dir_all(data_dir)
            .with_context(|| format!("failed to create {}", data_dir.display()))?;

        let record_path = data_dir.join(CACHE_FILE_NAME);
        info!(
            data_dir = %data_dir.display(),
            record = %record_path.display(),
            "opened calendar cache"
        );

        Ok(Self { record_path })
    }

    pub fn path(&self) -> &Path {
        &self.record_path
    }

    /// Persists `stats` stamped with `now`. A failed write is logged and
    /// leaves the previous record in place.
    #[tracing::instrument(skip(self, stats), fields(total_solved = stats.total_solved, days = stats.calendar.len()))]
    pub fn save(&self, stats: &Stats, now: DateTime<Utc>) {
        if let Err(err) = self.try_save(stats, now) {
            let reason = format!("{err:#}");
            warn!(error = %reason, "failed to save calendar cache; keeping previous record");
        }
    }

    #[tracing::instrument(skip(self, stats))]
    pub fn try_save(&self, stats: &Stats, now: DateTime<Utc>) -> anyhow::Result<()> {
        let record = StoredRecord {
            total_solved: stats.total_solved,
            submission_calendar: stats
                .calendar
                .iter()
                .map(|(key, count)| (key.to_string(), count))
                .collect(),
            cache_date: to_epoch_seconds(now),
        };
        save_json_atomic(&self.record_path, &record)
            .with_context(|| format!("failed to save {}", self.record_path.display()))
    }

    #[tracing::instrument(skip(self))]
    pub fn load(&self) -> Option<Stats> {
        self.load_record().map(|record| record.stats)
    }

    #[tracing::instrument(skip(self))]
    pub fn last_refresh(&self) -> Option<DateTime<Utc>> {
        self.load_record().map(|record| record.saved_at)
    }

    #[tracing::instrument(skip(self))]
    pub fn should_refresh(&self, now: DateTime<Utc>, interval: Duration) -> bool {
        let last_refresh = self.last_refresh();
        let stale = is_stale(last_refresh, now, interval);
        debug!(?last_refresh, interval_secs = interval.num_seconds(), stale, "evaluated cache freshness");
        stale
    }

    pub fn load_record(&self) -> Option<CacheRecord> {
        let bytes = match fs::read(&self.record_path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!(file = %self.record_path.display(), "no cache record");
                return None;
            }
            Err(err) => {
                warn!(file = %self.record_path.display(), error = %err, "cache record unreadable");
                return None;
            }
        };

        let stored: StoredRecord = match serde_json::from_slice(&bytes) {
            Ok(stored) => stored,
            Err(err) => {
                warn!(file = %self.record_path.display(), error = %err, "cache record corrupt; ignoring");
                return None;
            }
        };

        let Some(saved_at) = from_epoch_seconds(stored.cache_date) else {
            warn!(cache_date = stored.cache_date, "cache record has invalid timestamp; ignoring");
            return None;
        };

        let total_keys = stored.submission_calendar.len();
        let calendar = CanonicalCalendar::from_day_keys(
            stored
                .submission_calendar
                .into_iter()
                .filter_map(|(key, count)| key.parse::<i64>().ok().map(|key| (key, count))),
        );
        if calendar.len() < total_keys {
            debug!(dropped = total_keys - calendar.len(), "dropped cache keys that were not day-keys");
        }

        Some(CacheRecord {
            stats: Stats::new(stored.total_solved, calendar),
            saved_at,
        })
    }

    #[tracing::instrument(skip(self))]
    pub fn clear(&self) -> anyhow::Result<()> {
        match fs::remove_file(&self.record_path) {
            Ok(()) => {
                info!(file = %self.record_path.display(), "cleared calendar cache");
                Ok(())
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(anyhow!("failed to remove {}: {}", self.record_path.display(), err)),
        }
    }
}

fn to_epoch_seconds(instant: DateTime<Utc>) -> f64 {
    instant.timestamp() as f64 + f64::from(instant.timestamp_subsec_micros()) / 1_000_000.0
}

fn from_epoch_seconds(value: f64) -> Option<DateTime<Utc>> {
    if !value.is_finite() {
        return None;
    }
    let secs = value.floor();
    let micros = ((value - secs) * 1_000_000.0).round().min(999_999.0) as u32;
    DateTime::<Utc>::from_timestamp(secs as i64, micros * 1_000)
}

#[tracing::instrument(skip(path, record))]
fn save_json_atomic<T: Serialize>(path: &Path, record: &T) -> anyhow::Result<()> {
    debug!(file = %path.display(), "saving record atomically");

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut temp = NamedTempFile::new_in(dir)?;
    serde_json::to_writer(&mut temp, record)?;
    temp.flush()?;

    temp.persist(path)
        .map_err(|err| anyhow!("failed to persist {}: {}", path.display(), err))?;

    Ok(())
}
