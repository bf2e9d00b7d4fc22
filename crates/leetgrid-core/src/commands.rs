use std::future::Future;

use anyhow::Context;
use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument};

use crate::cli::Command;
use crate::config::ConfigurationProvider;
use crate::datetime::{format_local, today_in};
use crate::fetch::StatsFetcher;
use crate::grid::{rolling_grid, year_grid};
use crate::refresh::{Refresher, WidgetEntry};
use crate::render::{Renderer, entry_json, format_refresh};

#[instrument(skip(refresher, renderer))]
pub fn dispatch<C, F>(
    refresher: &Refresher<C, F>,
    renderer: &mut Renderer,
    command: Command,
    now: DateTime<Utc>,
) -> anyhow::Result<()>
where
    C: ConfigurationProvider,
    F: StatsFetcher,
{
    debug!(?command, "dispatching command");
    match command {
        Command::Show { json } => {
            let entry = block_on(refresher.refresh(now, false))?;
            show_rolling(refresher, renderer, &entry, json)
        }
        Command::Year { json } => {
            let entry = block_on(refresher.refresh(now, false))?;
            show_year(refresher, renderer, &entry, json)
        }
        Command::Refresh => {
            let entry = block_on(refresher.refresh(now, true))?;
            show_rolling(refresher, renderer, &entry, false)
        }
        Command::Status => cmd_status(refresher, renderer, now),
        Command::ClearCache => {
            refresher.cache().clear()?;
            info!(file = %refresher.cache().path().display(), "cache cleared");
            println!("Cleared {}", refresher.cache().path().display());
            Ok(())
        }
    }
}

fn show_rolling<C, F>(
    refresher: &Refresher<C, F>,
    renderer: &mut Renderer,
    entry: &WidgetEntry,
    json: bool,
) -> anyhow::Result<()>
where
    C: ConfigurationProvider,
    F: StatsFetcher,
{
    let tz = refresher.timezone();
    let today = today_in(entry.date, tz);
    let grid = entry
        .stats
        .as_ref()
        .map(|stats| rolling_grid(&stats.calendar, today, tz));

    if json {
        return renderer.print_json(&entry_json(entry, grid.as_ref(), None, tz));
    }
    renderer.print_rolling(entry, grid.as_ref())?;
    debug!("{}", format_refresh(entry, tz));
    Ok(())
}

fn show_year<C, F>(
    refresher: &Refresher<C, F>,
    renderer: &mut Renderer,
    entry: &WidgetEntry,
    json: bool,
) -> anyhow::Result<()>
where
    C: ConfigurationProvider,
    F: StatsFetcher,
{
    let tz = refresher.timezone();
    let today = today_in(entry.date, tz);
    let grid = entry
        .stats
        .as_ref()
        .map(|stats| year_grid(&stats.calendar, today, tz));

    if json {
        return renderer.print_json(&entry_json(entry, None, grid.as_ref(), tz));
    }
    renderer.print_year(entry, grid.as_ref())?;
    debug!("{}", format_refresh(entry, tz));
    Ok(())
}

fn cmd_status<C, F>(
    refresher: &Refresher<C, F>,
    renderer: &mut Renderer,
    now: DateTime<Utc>,
) -> anyhow::Result<()>
where
    C: ConfigurationProvider,
    F: StatsFetcher,
{
    let tz = refresher.timezone();
    let username = refresher.config().username();
    let frequency = refresher.config().sync_frequency();
    let last_refresh = refresher.cache().last_refresh();

    let next_refresh = match last_refresh {
        Some(last) if !refresher.needs_refresh(now) => format_local(last + refresher.interval(), tz),
        _ => "next run".to_string(),
    };

    let rows = vec![
        (
            "username".to_string(),
            if username.is_empty() { "(not set)".to_string() } else { username },
        ),
        ("sync.frequency".to_string(), frequency.display_name().to_string()),
        ("timezone".to_string(), tz.name().to_string()),
        ("cache".to_string(), refresher.cache().path().display().to_string()),
        (
            "last refresh".to_string(),
            last_refresh
                .map(|last| format_local(last, tz))
                .unwrap_or_else(|| "never".to_string()),
        ),
        ("stale".to_string(), refresher.needs_refresh(now).to_string()),
        ("next refresh".to_string(), next_refresh),
    ];

    renderer.print_status(rows)
}

fn block_on<T>(future: impl Future<Output = T>) -> anyhow::Result<T> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;
    Ok(runtime.block_on(future))
}
