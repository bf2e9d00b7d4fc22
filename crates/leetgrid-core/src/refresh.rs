use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use tracing::{debug, info, instrument, warn};

use crate::cache::CalendarCache;
use crate::config::ConfigurationProvider;
use crate::fetch::StatsFetcher;
use crate::stats::Stats;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntrySource {
    Network,
    Cache,
    Unavailable,
}

/// One tick's outcome, ready for rendering.
#[derive(Debug, Clone, PartialEq)]
pub struct WidgetEntry {
    pub date: DateTime<Utc>,
    pub stats: Option<Stats>,
    pub error: Option<String>,
    pub source: EntrySource,
    pub next_refresh: DateTime<Utc>,
}

/// Runs the fetch → normalize → save cycle against an explicit cache,
/// settings source and fetcher.
#[derive(Debug)]
pub struct Refresher<C, F> {
    cache: CalendarCache,
    config: C,
    fetcher: F,
    tz: Tz,
}

impl<C, F> Refresher<C, F>
where
    C: ConfigurationProvider,
    F: StatsFetcher,
{
    pub fn new(cache: CalendarCache, config: C, fetcher: F, tz: Tz) -> Self {
        Self {
            cache,
            config,
            fetcher,
            tz,
        }
    }

    pub fn cache(&self) -> &CalendarCache {
        &self.cache
    }

    pub fn config(&self) -> &C {
        &self.config
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    pub fn timezone(&self) -> &Tz {
        &self.tz
    }

    /// Interval of the frequency configured right now.
    pub fn interval(&self) -> Duration {
        self.config.sync_frequency().refresh_interval()
    }

    pub fn needs_refresh(&self, now: DateTime<Utc>) -> bool {
        self.cache.should_refresh(now, self.interval())
    }

    /// Cached data only; never touches the network.
    #[instrument(skip(self))]
    pub fn snapshot(&self, now: DateTime<Utc>) -> WidgetEntry {
        let stats = self.cache.load();
        let source = if stats.is_some() { EntrySource::Cache } else { EntrySource::Unavailable };
        self.entry(now, stats, None, source)
    }

    /// Refetches when forced or when the cache is stale, otherwise serves
    /// the cache.
    #[instrument(skip(self))]
    pub async fn refresh(&self, now: DateTime<Utc>, force: bool) -> WidgetEntry {
        if !force && !self.needs_refresh(now) {
            debug!("cache fresh; skipping fetch");
            return self.snapshot(now);
        }

        let username = self.config.username();
        match self.fetcher.fetch_stats(&username).await {
            Ok(raw) => {
                let stats = Stats::from_raw(&raw, &self.tz);
                self.cache.save(&stats, now);
                info!(
                    total_solved = stats.total_solved,
                    days = stats.calendar.len(),
                    "refreshed stats"
                );
                self.entry(now, Some(stats), None, EntrySource::Network)
            }
            Err(err) if err.is_configuration() => {
                warn!(error = %err, "fetch skipped: configuration incomplete");
                let stats = self.cache.load();
                let source = if stats.is_some() { EntrySource::Cache } else { EntrySource::Unavailable };
                self.entry(now, stats, Some(err.to_string()), source)
            }
            Err(err) => {
                warn!(error = %err, "fetch failed; falling back to cache");
                match self.cache.load() {
                    Some(stats) => self.entry(now, Some(stats), None, EntrySource::Cache),
                    None => self.entry(now, None, Some(err.to_string()), EntrySource::Unavailable),
                }
            }
        }
    }

    fn entry(
        &self,
        now: DateTime<Utc>,
        stats: Option<Stats>,
        error: Option<String>,
        source: EntrySource,
    ) -> WidgetEntry {
        WidgetEntry {
            date: now,
            stats,
            error,
            source,
            next_refresh: now + self.interval(),
        }
    }
}
