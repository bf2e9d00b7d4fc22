use std::fs;
use std::path::{
  Path,
  PathBuf
};

use chrono::{
  DateTime,
  Datelike,
  Duration,
  LocalResult,
  NaiveDate,
  NaiveDateTime,
  NaiveTime,
  TimeZone,
  Utc
};
use chrono_tz::Tz;
use serde::Deserialize;

const TIMEZONE_CONFIG_FILE: &str =
  "leetgrid-time.toml";
const TIMEZONE_ENV_VAR: &str =
  "LEETGRID_TIMEZONE";
const TIMEZONE_CONFIG_ENV_VAR: &str =
  "LEETGRID_TIME_CONFIG";

/// Longest DST gap we probe past when
/// local midnight does not exist.
const GAP_PROBE_MINUTES: i64 = 180;

#[derive(Debug, Deserialize)]
struct TimezoneConfig {
  timezone: Option<String>,
  time:     Option<TimezoneSection>
}

#[derive(Debug, Deserialize)]
struct TimezoneSection {
  timezone: Option<String>
}

/// Picks the zone that defines "local
/// midnight" for every day-key.
///
/// Order: `$LEETGRID_TIMEZONE`, the rc
/// `timezone` key, `leetgrid-time.toml`,
/// the system zone, then UTC.
#[tracing::instrument]
pub fn resolve_timezone(
  configured: Option<&str>
) -> Tz {
  if let Ok(raw) =
    std::env::var(TIMEZONE_ENV_VAR)
    && let Some(tz) =
      parse_timezone(&raw, TIMEZONE_ENV_VAR)
  {
    return tz;
  }

  if let Some(raw) = configured
    && let Some(tz) =
      parse_timezone(raw, "rc:timezone")
  {
    return tz;
  }

  if let Some(path) =
    timezone_config_path()
    && let Some(tz) =
      load_timezone_from_file(&path)
  {
    return tz;
  }

  if let Some(tz) = system_timezone() {
    return tz;
  }

  tracing::warn!(
    "no usable timezone found; using \
     UTC day boundaries"
  );
  chrono_tz::UTC
}

fn system_timezone() -> Option<Tz> {
  match iana_time_zone::get_timezone() {
    | Ok(name) => {
      parse_timezone(&name, "system")
    }
    | Err(err) => {
      tracing::info!(
        error = %err,
        "system timezone unavailable"
      );
      None
    }
  }
}

fn timezone_config_path()
-> Option<PathBuf> {
  if let Ok(raw) = std::env::var(
    TIMEZONE_CONFIG_ENV_VAR
  ) {
    let trimmed = raw.trim();
    if !trimmed.is_empty() {
      return Some(PathBuf::from(
        trimmed
      ));
    }
  }

  std::env::current_dir().ok().map(
    |dir| {
      dir.join(TIMEZONE_CONFIG_FILE)
    }
  )
}

fn load_timezone_from_file(
  path: &Path
) -> Option<Tz> {
  if !path.exists() {
    tracing::debug!(
      file = %path.display(),
      "timezone config file not found"
    );
    return None;
  }

  let raw = match fs::read_to_string(
    path
  ) {
    | Ok(raw) => raw,
    | Err(err) => {
      tracing::error!(
        file = %path.display(),
        error = %err,
        "failed reading timezone config file"
      );
      return None;
    }
  };

  let parsed = match toml::from_str::<
    TimezoneConfig
  >(&raw)
  {
    | Ok(parsed) => parsed,
    | Err(err) => {
      tracing::error!(
        file = %path.display(),
        error = %err,
        "failed parsing timezone config file"
      );
      return None;
    }
  };

  let timezone =
    parsed.timezone.or_else(|| {
      parsed.time.and_then(|section| {
        section.timezone
      })
    });
  let Some(timezone) = timezone else {
    tracing::warn!(
      file = %path.display(),
      "timezone config had no timezone field"
    );
    return None;
  };

  parse_timezone(
    timezone.as_str(),
    &format!("file:{}", path.display())
  )
}

pub fn parse_timezone(
  raw: &str,
  source: &str
) -> Option<Tz> {
  let trimmed = raw.trim();
  if trimmed.is_empty() {
    tracing::warn!(
      source,
      "timezone source was empty"
    );
    return None;
  }

  match trimmed.parse::<Tz>() {
    | Ok(tz) => {
      tracing::info!(
        source,
        timezone = %trimmed,
        "resolved day-boundary timezone"
      );
      Some(tz)
    }
    | Err(err) => {
      tracing::error!(
        source,
        timezone = %trimmed,
        error = %err,
        "failed to parse timezone id"
      );
      None
    }
  }
}

/// First instant of `date` in `tz`.
///
/// An ambiguous midnight resolves to the
/// earlier instant; a midnight swallowed
/// by a DST gap resolves to the first
/// local instant that exists.
#[must_use]
pub fn start_of_day(
  date: NaiveDate,
  tz: &Tz
) -> DateTime<Tz> {
  let midnight =
    date.and_time(NaiveTime::MIN);
  match tz.from_local_datetime(&midnight)
  {
    | LocalResult::Single(dt) => dt,
    | LocalResult::Ambiguous(
      first,
      second
    ) => {
      if first <= second {
        first
      } else {
        second
      }
    }
    | LocalResult::None => {
      first_instant_after_gap(
        midnight, tz
      )
    }
  }
}

fn first_instant_after_gap(
  midnight: NaiveDateTime,
  tz: &Tz
) -> DateTime<Tz> {
  for minutes in
    (15..=GAP_PROBE_MINUTES).step_by(15)
  {
    let candidate = midnight
      + Duration::minutes(minutes);
    if let Some(dt) = tz
      .from_local_datetime(&candidate)
      .earliest()
    {
      tracing::debug!(
        local = %candidate,
        "midnight skipped by DST; using first valid instant"
      );
      return dt;
    }
  }

  tracing::warn!(
    local = %midnight,
    "no valid local instant near midnight; treating as UTC"
  );
  tz.from_utc_datetime(&midnight)
}

/// Canonical day-key: epoch seconds of
/// the start of `date` in `tz`.
#[must_use]
pub fn day_key(
  date: NaiveDate,
  tz: &Tz
) -> i64 {
  start_of_day(date, tz).timestamp()
}

/// Local calendar date of an epoch
/// timestamp, `None` when out of range.
#[must_use]
pub fn local_date(
  epoch_seconds: i64,
  tz: &Tz
) -> Option<NaiveDate> {
  DateTime::<Utc>::from_timestamp(
    epoch_seconds,
    0
  )
  .map(|dt| {
    dt.with_timezone(tz).date_naive()
  })
}

#[must_use]
pub fn today_in(
  now: DateTime<Utc>,
  tz: &Tz
) -> NaiveDate {
  now.with_timezone(tz).date_naive()
}

/// Sunday = 0 … Saturday = 6.
#[must_use]
pub fn weekday_from_sunday(
  date: NaiveDate
) -> u32 {
  date.weekday().num_days_from_sunday()
}

#[must_use]
pub fn format_local(
  dt: DateTime<Utc>,
  tz: &Tz
) -> String {
  dt.with_timezone(tz)
    .format("%Y-%m-%d %H:%M %Z")
    .to_string()
}

pub fn add_days(
  date: NaiveDate,
  days: i64
) -> NaiveDate {
  date
    .checked_add_signed(Duration::days(
      days
    ))
    .unwrap_or(date)
}

/// Moves `date` by whole months, clamping
/// the day to the target month's length.
pub fn shift_months(
  date: NaiveDate,
  months: i32
) -> NaiveDate {
  let mut year = date.year();
  let mut month =
    date.month() as i32 + months;

  while month < 1 {
    month += 12;
    year = year.saturating_sub(1);
  }
  while month > 12 {
    month -= 12;
    year = year.saturating_add(1);
  }

  let month = month as u32;
  let day = date
    .day()
    .min(days_in_month(year, month));
  NaiveDate::from_ymd_opt(
    year, month, day
  )
  .unwrap_or(date)
}

pub fn first_day_of_month(
  year: i32,
  month: u32
) -> NaiveDate {
  NaiveDate::from_ymd_opt(
    year, month, 1
  )
  .unwrap_or(NaiveDate::MIN)
}

pub fn last_day_of_month(
  year: i32,
  month: u32
) -> NaiveDate {
  let (next_year, next_month) =
    if month >= 12 {
      (year.saturating_add(1), 1_u32)
    } else {
      (year, month + 1)
    };
  add_days(
    first_day_of_month(
      next_year, next_month
    ),
    -1
  )
}

pub fn days_in_month(
  year: i32,
  month: u32
) -> u32 {
  last_day_of_month(year, month).day()
}

#[cfg(test)]
mod tests {
  use chrono::{
    NaiveDate,
    TimeZone,
    Utc
  };

  use super::{
    day_key,
    days_in_month,
    load_timezone_from_file,
    local_date,
    parse_timezone,
    shift_months,
    start_of_day,
    weekday_from_sunday
  };

  fn date(
    y: i32,
    m: u32,
    d: u32
  ) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d)
      .expect("valid date")
  }

  #[test]
  fn utc_day_key_is_midnight() {
    let key = day_key(
      date(2023, 11, 14),
      &chrono_tz::UTC
    );
    assert_eq!(key, 1_699_920_000);
    assert_eq!(
      local_date(key, &chrono_tz::UTC),
      Some(date(2023, 11, 14))
    );
  }

  #[test]
  fn day_key_follows_zone_offset() {
    let tz = parse_timezone(
      "America/New_York",
      "test"
    )
    .expect("known zone");
    let key =
      day_key(date(2024, 1, 10), &tz);
    let expected = Utc
      .with_ymd_and_hms(
        2024, 1, 10, 5, 0, 0
      )
      .single()
      .expect("valid instant")
      .timestamp();
    assert_eq!(key, expected);
  }

  #[test]
  fn midnight_in_dst_gap_uses_first_valid_instant()
   {
    // Santiago skipped 00:00-01:00 on
    // 2022-09-11.
    let tz = parse_timezone(
      "America/Santiago",
      "test"
    )
    .expect("known zone");
    let start = start_of_day(
      date(2022, 9, 11),
      &tz
    );
    assert_eq!(
      start.date_naive(),
      date(2022, 9, 11)
    );
    assert_eq!(
      start
        .format("%H:%M")
        .to_string(),
      "01:00"
    );
  }

  #[test]
  fn shifting_months_clamps_day() {
    assert_eq!(
      shift_months(date(2024, 3, 31), -1),
      date(2024, 2, 29)
    );
    assert_eq!(
      shift_months(date(2026, 10, 18), -12),
      date(2025, 10, 18)
    );
    assert_eq!(
      shift_months(date(2025, 11, 5), 3),
      date(2026, 2, 5)
    );
  }

  #[test]
  fn month_lengths_and_weekdays() {
    assert_eq!(days_in_month(2024, 2), 29);
    assert_eq!(days_in_month(2025, 2), 28);
    assert_eq!(days_in_month(2025, 12), 31);
    // 2026-03-01 is a Sunday.
    assert_eq!(
      weekday_from_sunday(date(2026, 3, 1)),
      0
    );
    assert_eq!(
      weekday_from_sunday(date(2026, 3, 7)),
      6
    );
  }

  #[test]
  fn timezone_file_accepts_both_layouts() {
    let temp = tempfile::tempdir()
      .expect("tempdir");

    let flat =
      temp.path().join("flat.toml");
    std::fs::write(
      &flat,
      "timezone = \"Asia/Tokyo\"\n"
    )
    .expect("write flat");
    assert_eq!(
      load_timezone_from_file(&flat),
      Some(chrono_tz::Asia::Tokyo)
    );

    let nested =
      temp.path().join("nested.toml");
    std::fs::write(
      &nested,
      "[time]\ntimezone = \"Europe/Berlin\"\n"
    )
    .expect("write nested");
    assert_eq!(
      load_timezone_from_file(&nested),
      Some(chrono_tz::Europe::Berlin)
    );

    let bogus =
      temp.path().join("bogus.toml");
    std::fs::write(
      &bogus,
      "timezone = \"Mars/Olympus\"\n"
    )
    .expect("write bogus");
    assert_eq!(
      load_timezone_from_file(&bogus),
      None
    );
    assert_eq!(
      load_timezone_from_file(
        &temp.path().join("missing.toml")
      ),
      None
    );
    assert_eq!(
      parse_timezone("  ", "test"),
      None
    );
  }
}
