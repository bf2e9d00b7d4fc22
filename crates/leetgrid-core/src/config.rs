use std::collections::HashMap;
use std::fs;
use std::path::{
  Path,
  PathBuf
};

use anyhow::{
  Context,
  anyhow,
  bail
};
use tracing::{
  debug,
  info,
  trace,
  warn
};

use crate::freshness::SyncFrequency;

pub const USERNAME_KEY: &str =
  "username";
pub const SYNC_FREQUENCY_KEY: &str =
  "sync.frequency";
pub const DATA_LOCATION_KEY: &str =
  "data.location";
pub const TIMEZONE_KEY: &str =
  "timezone";
pub const ENDPOINT_KEY: &str =
  "api.endpoint";
pub const COLOR_KEY: &str = "color";

const RC_ENV_VAR: &str = "LEETGRIDRC";

/// Read side of the user's settings,
/// consulted on every refresh so edits
/// take effect immediately.
pub trait ConfigurationProvider {
  fn username(&self) -> String;

  fn sync_frequency(
    &self
  ) -> SyncFrequency;
}

#[derive(Debug, Clone)]
pub struct Config {
  map: HashMap<String, String>,
  pub source: Option<PathBuf>
}

impl Default for Config {
  fn default() -> Self {
    let map = [
      (
        DATA_LOCATION_KEY,
        "~/.leetgrid"
      ),
      (
        SYNC_FREQUENCY_KEY,
        SyncFrequency::default()
          .as_key()
      ),
      (COLOR_KEY, "on")
    ]
    .into_iter()
    .map(|(k, v)| {
      (k.to_string(), v.to_string())
    })
    .collect();

    Self { map, source: None }
  }
}

impl Config {
  /// Defaults overlaid with the rc
  /// file, if one is found.
  #[tracing::instrument(skip(
    rc_override
  ))]
  pub fn load(
    rc_override: Option<&Path>
  ) -> anyhow::Result<Self> {
    let mut cfg = Config::default();

    match resolve_rc_path(rc_override)? {
      | Some(path) => {
        info!(rc = %path.display(), "loading leetgridrc");
        let text = fs::read_to_string(
          &path
        )
        .with_context(|| {
          format!(
            "failed to read {}",
            path.display()
          )
        })?;
        cfg.merge_rc(&text, &path)?;
        cfg.source = Some(path);
      }
      | None => {
        debug!(
          "no leetgridrc; using defaults"
        );
      }
    }

    Ok(cfg)
  }

  #[tracing::instrument(skip(
    self, overrides
  ))]
  pub fn apply_overrides<I>(
    &mut self,
    overrides: I
  ) where
    I: IntoIterator<
      Item = (String, String)
    >
  {
    for (k, v) in overrides {
      let key = k
        .strip_prefix("rc.")
        .unwrap_or(&k)
        .to_string();
      debug!(key = %key, value = %v, "applying override");
      self.map.insert(key, v);
    }
  }

  pub fn get(
    &self,
    key: &str
  ) -> Option<String> {
    self.map.get(key).cloned()
  }

  pub fn get_bool(
    &self,
    key: &str
  ) -> Option<bool> {
    self
      .map
      .get(key)
      .map(|v| parse_bool(v))
  }

  /// `key = value` per line; `#`
  /// starts a comment.
  fn merge_rc(
    &mut self,
    text: &str,
    origin: &Path
  ) -> anyhow::Result<()> {
    for (idx, raw_line) in
      text.lines().enumerate()
    {
      let line = raw_line
        .split('#')
        .next()
        .unwrap_or_default()
        .trim();
      if line.is_empty() {
        continue;
      }

      let Some((k, v)) =
        line.split_once('=')
      else {
        bail!(
          "{}:{}: expected key = value, \
           got `{}`",
          origin.display(),
          idx + 1,
          raw_line.trim()
        );
      };

      let key = k.trim();
      if key.is_empty() {
        bail!(
          "{}:{}: empty key",
          origin.display(),
          idx + 1
        );
      }
      trace!(key, value = v.trim(), "rc setting");
      self.map.insert(
        key.to_string(),
        v.trim().to_string()
      );
    }
    Ok(())
  }
}

impl ConfigurationProvider for Config {
  fn username(&self) -> String {
    self
      .get(USERNAME_KEY)
      .map(|name| name.trim().to_string())
      .unwrap_or_default()
  }

  fn sync_frequency(
    &self
  ) -> SyncFrequency {
    let Some(raw) =
      self.get(SYNC_FREQUENCY_KEY)
    else {
      return SyncFrequency::default();
    };

    match raw.parse::<SyncFrequency>() {
      | Ok(freq) => freq,
      | Err(err) => {
        warn!(
          value = %raw,
          error = %err,
          "unrecognized sync frequency; using default"
        );
        SyncFrequency::default()
      }
    }
  }
}

/// `--data`, else `data.location`,
/// else `~/.leetgrid`; created when
/// missing.
#[tracing::instrument(skip(
  cfg,
  override_dir
))]
pub fn resolve_data_dir(
  cfg: &Config,
  override_dir: Option<&Path>
) -> anyhow::Result<PathBuf> {
  let dir = match (
    override_dir,
    cfg.get(DATA_LOCATION_KEY)
  ) {
    | (Some(path), _) => {
      path.to_path_buf()
    }
    | (None, Some(location)) => {
      expand_tilde(&location)?
    }
    | (None, None) => {
      home_dir()?.join(".leetgrid")
    }
  };

  fs::create_dir_all(&dir)
    .with_context(|| {
      format!(
        "failed to create {}",
        dir.display()
      )
    })?;
  Ok(dir)
}

fn resolve_rc_path(
  override_path: Option<&Path>
) -> anyhow::Result<Option<PathBuf>> {
  if let Some(path) = override_path {
    return Ok(Some(path.to_path_buf()));
  }

  if let Ok(rc_env) =
    std::env::var(RC_ENV_VAR)
  {
    return Ok(
      (rc_env != "/dev/null")
        .then(|| PathBuf::from(rc_env))
    );
  }

  let candidate =
    home_dir()?.join(".leetgridrc");
  Ok(candidate.exists().then_some(candidate))
}

fn home_dir() -> anyhow::Result<PathBuf> {
  dirs::home_dir().ok_or_else(|| {
    anyhow!(
      "cannot determine home directory"
    )
  })
}

fn expand_tilde(
  raw: &str
) -> anyhow::Result<PathBuf> {
  match raw.strip_prefix("~/") {
    | Some(rest) => {
      Ok(home_dir()?.join(rest))
    }
    | None => Ok(PathBuf::from(raw))
  }
}

fn parse_bool(s: &str) -> bool {
  matches!(
    s.trim()
      .to_ascii_lowercase()
      .as_str(),
    "1" | "y" | "yes" | "on" | "true"
  )
}
