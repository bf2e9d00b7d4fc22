use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// How often cached stats may be reused before a refetch.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SyncFrequency {
    Live,
    Hourly,
    #[default]
    Daily,
}

impl SyncFrequency {
    pub const ALL: [SyncFrequency; 3] = [Self::Live, Self::Hourly, Self::Daily];

    pub fn refresh_interval(self) -> Duration {
        match self {
            Self::Live => Duration::seconds(60),
            Self::Hourly => Duration::seconds(3_600),
            Self::Daily => Duration::seconds(86_400),
        }
    }

    pub fn as_key(self) -> &'static str {
        match self {
            Self::Live => "live",
            Self::Hourly => "hourly",
            Self::Daily => "daily",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Self::Live => "Live",
            Self::Hourly => "Every Hour",
            Self::Daily => "Every Day",
        }
    }
}

impl fmt::Display for SyncFrequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_key())
    }
}

impl FromStr for SyncFrequency {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|freq| freq.as_key() == wanted)
            .ok_or_else(|| anyhow!("unknown sync frequency: {s} (expected live, hourly or daily)"))
    }
}

/// Stale when there was never a refresh, or when at least `interval` has
/// elapsed since the last one. The boundary itself counts as stale.
pub fn is_stale(last_refresh: Option<DateTime<Utc>>, now: DateTime<Utc>, interval: Duration) -> bool {
    match last_refresh {
        None => true,
        Some(last) => now.signed_duration_since(last) >= interval,
    }
}
