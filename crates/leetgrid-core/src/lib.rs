pub mod cache;
pub mod calendar;
pub mod cli;
pub mod commands;
pub mod config;
pub mod datetime;
pub mod fetch;
pub mod freshness;
pub mod grid;
pub mod refresh;
pub mod render;
pub mod stats;

use std::ffi::OsString;

use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use tracing::{
  debug,
  info
};

use crate::config::{
  ENDPOINT_KEY,
  TIMEZONE_KEY
};

#[tracing::instrument(skip_all)]
pub fn run(
  raw_args: Vec<OsString>
) -> anyhow::Result<()> {
  let pre =
    cli::preprocess_args(&raw_args);
  let cli = cli::GlobalCli::parse_from(
    pre.cleaned_args
  );

  cli::init_tracing(
    cli.verbose,
    cli.quiet
  )?;

  info!(
    verbose = cli.verbose,
    quiet = cli.quiet,
    "starting leetgrid"
  );
  debug!(?pre.rc_overrides, "preprocessed rc overrides");

  let mut cfg = config::Config::load(
    cli.leetgridrc.as_deref()
  )?;
  cfg.apply_overrides(
    pre.rc_overrides.into_iter().chain(
      cli
        .rc_overrides
        .into_iter()
        .map(|kv| (kv.key, kv.value))
    )
  );

  debug!(rc = ?cfg.source, "settings loaded");

  let tz = datetime::resolve_timezone(
    cfg.get(TIMEZONE_KEY).as_deref()
  );

  let data_dir =
    config::resolve_data_dir(
      &cfg,
      cli.data.as_deref()
    )
    .context(
      "failed to resolve data \
       directory"
    )?;

  let cache =
    cache::CalendarCache::open(
      &data_dir
    )
    .with_context(|| {
      format!(
        "failed to open cache at {}",
        data_dir.display()
      )
    })?;

  let fetcher =
    fetch::LeetCodeClient::new(
      cfg.get(ENDPOINT_KEY).as_deref()
    )?;
  debug!(endpoint = %fetcher.endpoint(), timezone = %tz.name(), "collaborators ready");

  let mut renderer =
    render::Renderer::new(&cfg);
  let refresher =
    refresh::Refresher::new(
      cache, cfg, fetcher, tz
    );

  commands::dispatch(
    &refresher,
    &mut renderer,
    cli.command.unwrap_or_default(),
    Utc::now()
  )?;

  info!("done");
  Ok(())
}
