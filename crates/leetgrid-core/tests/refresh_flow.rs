use std::collections::VecDeque;
use std::future::Future;
use std::sync::Mutex;

use chrono::{DateTime, Duration, TimeZone, Utc};
use leetgrid_core::cache::CalendarCache;
use leetgrid_core::calendar::CanonicalCalendar;
use leetgrid_core::config::Config;
use leetgrid_core::fetch::{FetchError, StatsFetcher};
use leetgrid_core::grid::{GridCell, rolling_grid};
use leetgrid_core::refresh::{EntrySource, Refresher};
use leetgrid_core::stats::{RawStats, Stats};
use tempfile::tempdir;

const UTC: chrono_tz::Tz = chrono_tz::UTC;

#[derive(Default)]
struct FakeFetcher {
    responses: Mutex<VecDeque<Result<RawStats, FetchError>>>,
    calls: Mutex<Vec<String>>,
}

impl FakeFetcher {
    fn replying(responses: Vec<Result<RawStats, FetchError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            calls: Mutex::default(),
        }
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("calls lock").clone()
    }
}

impl StatsFetcher for FakeFetcher {
    async fn fetch_stats(&self, username: &str) -> Result<RawStats, FetchError> {
        self.calls.lock().expect("calls lock").push(username.to_string());
        if username.is_empty() {
            return Err(FetchError::MissingUsername);
        }
        self.responses
            .lock()
            .expect("responses lock")
            .pop_front()
            .unwrap_or_else(|| Err(FetchError::Transport("no scripted response".to_string())))
    }
}

fn run_async<T>(future: impl Future<Output = T>) -> T {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("tokio runtime")
        .block_on(future)
}

fn config(username: &str, frequency: &str) -> Config {
    let mut cfg = Config::default();
    cfg.apply_overrides(vec![
        ("username".to_string(), username.to_string()),
        ("sync.frequency".to_string(), frequency.to_string()),
    ]);
    cfg
}

fn raw(total: u64) -> RawStats {
    RawStats {
        total_solved: total,
        submission_calendar: r#"{"1700000000": 2, "1700003600": 3}"#.to_string(),
    }
}

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2023, 11, 15, 8, 0, 0).single().expect("valid now")
}

#[test]
fn fetches_normalizes_and_saves_when_cache_is_empty() {
    let temp = tempdir().expect("tempdir");
    let cache = CalendarCache::open(temp.path()).expect("open cache");
    let refresher = Refresher::new(cache, config("alice", "hourly"), FakeFetcher::replying(vec![Ok(raw(10))]), UTC);

    let entry = run_async(refresher.refresh(now(), false));

    assert_eq!(entry.source, EntrySource::Network);
    assert_eq!(entry.error, None);
    assert_eq!(entry.next_refresh, now() + Duration::hours(1));
    let stats = entry.stats.expect("fresh stats");
    assert_eq!(stats.total_solved, 10);
    assert_eq!(stats.calendar.count_for_key(1_699_920_000), 5);
    assert_eq!(refresher.cache().load(), Some(stats.clone()));

    let grid = rolling_grid(&stats.calendar, now().date_naive(), &UTC);
    assert_eq!(grid.cell_at(6, 5), Some(GridCell::Active(5)));
}

#[test]
fn fresh_cache_skips_the_network() {
    let temp = tempdir().expect("tempdir");
    let cache = CalendarCache::open(temp.path()).expect("open cache");
    let cached = Stats::new(7, CanonicalCalendar::from_day_keys([(1_699_920_000, 1)]));
    cache.try_save(&cached, now() - Duration::minutes(10)).expect("seed cache");

    let refresher = Refresher::new(cache, config("alice", "hourly"), FakeFetcher::replying(vec![Ok(raw(99))]), UTC);
    let entry = run_async(refresher.refresh(now(), false));

    assert_eq!(entry.source, EntrySource::Cache);
    assert_eq!(entry.stats, Some(cached));
    assert!(refresher_calls(&refresher).is_empty());

    let forced = run_async(refresher.refresh(now(), true));
    assert_eq!(forced.source, EntrySource::Network);
    assert_eq!(forced.stats.map(|stats| stats.total_solved), Some(99));
}

#[test]
fn transient_failure_falls_back_to_cache_silently() {
    let temp = tempdir().expect("tempdir");
    let cache = CalendarCache::open(temp.path()).expect("open cache");
    let cached = Stats::new(7, CanonicalCalendar::new());
    cache.try_save(&cached, now() - Duration::days(2)).expect("seed cache");

    let refresher = Refresher::new(
        cache,
        config("alice", "daily"),
        FakeFetcher::replying(vec![Err(FetchError::Status(503))]),
        UTC,
    );
    let entry = run_async(refresher.refresh(now(), false));

    assert_eq!(entry.source, EntrySource::Cache);
    assert_eq!(entry.stats, Some(cached));
    assert_eq!(entry.error, None);
    assert!(refresher.needs_refresh(now()));
}

#[test]
fn transient_failure_without_cache_reports_error() {
    let temp = tempdir().expect("tempdir");
    let cache = CalendarCache::open(temp.path()).expect("open cache");
    let refresher = Refresher::new(
        cache,
        config("alice", "live"),
        FakeFetcher::replying(vec![Err(FetchError::Transport("connection reset".to_string()))]),
        UTC,
    );

    let entry = run_async(refresher.refresh(now(), false));

    assert_eq!(entry.source, EntrySource::Unavailable);
    assert!(entry.stats.is_none());
    assert_eq!(entry.error.as_deref(), Some("Failed to reach LeetCode: connection reset"));
    assert_eq!(entry.next_refresh, now() + Duration::seconds(60));
}

#[test]
fn missing_username_reports_setup_prompt_with_cache() {
    let temp = tempdir().expect("tempdir");
    let cache = CalendarCache::open(temp.path()).expect("open cache");
    let cached = Stats::new(3, CanonicalCalendar::new());
    cache.try_save(&cached, now() - Duration::days(3)).expect("seed cache");

    let refresher = Refresher::new(cache, config("", "daily"), FakeFetcher::default(), UTC);
    let entry = run_async(refresher.refresh(now(), false));

    assert_eq!(entry.stats, Some(cached));
    assert_eq!(entry.error, Some(FetchError::MissingUsername.to_string()));

    // Still stale, so the next tick asks again.
    let again = run_async(refresher.refresh(now(), false));
    assert_eq!(again.error, entry.error);
    assert_eq!(refresher_calls(&refresher).len(), 2);
}

#[test]
fn snapshot_never_fetches() {
    let temp = tempdir().expect("tempdir");
    let cache = CalendarCache::open(temp.path()).expect("open cache");
    let refresher = Refresher::new(cache, config("alice", "live"), FakeFetcher::default(), UTC);

    let entry = refresher.snapshot(now());
    assert_eq!(entry.source, EntrySource::Unavailable);
    assert!(entry.stats.is_none());
    assert!(refresher_calls(&refresher).is_empty());
}

fn refresher_calls(refresher: &Refresher<Config, FakeFetcher>) -> Vec<String> {
    refresher.fetcher().calls()
}
