use std::io::{self, IsTerminal, Write};

use chrono_tz::Tz;
use serde_json::json;
use unicode_width::UnicodeWidthStr;

use crate::config::{COLOR_KEY, Config};
use crate::datetime::format_local;
use crate::grid::{DAYS_PER_WEEK, GridCell, MonthGrid, RollingGrid, YearGrid};
use crate::refresh::{EntrySource, WidgetEntry};

const MONTHS_PER_BAND: usize = 3;
const CELL_WIDTH: usize = 2;
const MONTH_GAP: &str = "   ";

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    pub fn new(cfg: &Config) -> Self {
        Self {
            color: cfg.get_bool(COLOR_KEY).unwrap_or(true),
        }
    }

    pub fn plain() -> Self {
        Self { color: false }
    }

    #[tracing::instrument(skip(self, entry, grid))]
    pub fn print_rolling(&mut self, entry: &WidgetEntry, grid: Option<&RollingGrid>) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        self.write_header(&mut out, entry)?;
        if let Some(grid) = grid {
            self.write_rolling(&mut out, grid)?;
        }
        Ok(())
    }

    #[tracing::instrument(skip(self, entry, grid))]
    pub fn print_year(&mut self, entry: &WidgetEntry, grid: Option<&YearGrid>) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        self.write_header(&mut out, entry)?;
        if let Some(grid) = grid {
            self.write_year(&mut out, grid)?;
        }
        Ok(())
    }

    pub fn print_json(&mut self, value: &serde_json::Value) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        serde_json::to_writer_pretty(&mut out, value)?;
        writeln!(out)?;
        Ok(())
    }

    pub fn print_status(&mut self, rows: Vec<(String, String)>) -> anyhow::Result<()> {
        let out = io::stdout().lock();
        let rows = rows
            .into_iter()
            .map(|(key, value)| vec![self.paint(&key, "33"), value])
            .collect();
        write_table(out, vec!["Setting".to_string(), "Value".to_string()], rows)
    }

    pub fn write_header<W: Write>(&self, out: &mut W, entry: &WidgetEntry) -> anyhow::Result<()> {
        writeln!(out, "{}", self.paint("LeetCode Progress", "1"))?;
        match (&entry.stats, &entry.error) {
            (Some(stats), error) => {
                let suffix = if entry.source == EntrySource::Cache { " (cached)" } else { "" };
                writeln!(out, "Solved {} problems{suffix}", stats.total_solved)?;
                if let Some(error) = error {
                    writeln!(out, "{}", self.paint(&format!("! {error}"), "31"))?;
                }
            }
            (None, Some(error)) => writeln!(out, "{}", self.paint(&format!("! {error}"), "31"))?,
            (None, None) => writeln!(out, "No data yet")?,
        }
        Ok(())
    }

    pub fn write_rolling<W: Write>(&self, out: &mut W, grid: &RollingGrid) -> anyhow::Result<()> {
        writeln!(out)?;
        for row in grid.rows() {
            let line: String = row.iter().map(|cell| self.glyph(*cell)).collect();
            writeln!(out, "{}", line.trim_end())?;
        }
        writeln!(
            out,
            "{} .. {}  ({} active days)",
            grid.first_day.format("%b %d"),
            grid.last_day().format("%b %d"),
            grid.active_days()
        )?;
        Ok(())
    }

    pub fn write_year<W: Write>(&self, out: &mut W, grid: &YearGrid) -> anyhow::Result<()> {
        let month_width = DAYS_PER_WEEK * CELL_WIDTH;
        for band in grid.months.chunks(MONTHS_PER_BAND) {
            writeln!(out)?;

            let titles: Vec<String> = band.iter().map(|month| pad(&month.title(), month_width)).collect();
            writeln!(out, "{}", titles.join(MONTH_GAP).trim_end())?;

            let weekdays = pad("S M T W T F S", month_width);
            writeln!(out, "{}", vec![weekdays; band.len()].join(MONTH_GAP).trim_end())?;

            let rows = band.iter().map(MonthGrid::row_count).max().unwrap_or(0);
            for row in 0..rows {
                let line = band
                    .iter()
                    .map(|month| self.month_row(month, row))
                    .collect::<Vec<_>>()
                    .join(MONTH_GAP);
                writeln!(out, "{}", line.trim_end())?;
            }
        }
        Ok(())
    }

    fn month_row(&self, month: &MonthGrid, row: usize) -> String {
        match month.weeks.get(row) {
            Some(week) => week.iter().map(|cell| self.glyph(*cell)).collect(),
            None => " ".repeat(DAYS_PER_WEEK * CELL_WIDTH),
        }
    }

    fn glyph(&self, cell: GridCell) -> String {
        match cell {
            GridCell::Active(_) => self.paint("■", "32") + " ",
            GridCell::Empty => self.paint("□", "90") + " ",
            GridCell::OutOfRange => "  ".to_string(),
        }
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color || !io::stdout().is_terminal() {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

/// JSON document handed to external renderers.
pub fn entry_json(
    entry: &WidgetEntry,
    rolling: Option<&RollingGrid>,
    year: Option<&YearGrid>,
    tz: &Tz,
) -> serde_json::Value {
    let source = match entry.source {
        EntrySource::Network => "network",
        EntrySource::Cache => "cache",
        EntrySource::Unavailable => "unavailable",
    };

    let mut doc = json!({
        "generatedAt": entry.date.to_rfc3339(),
        "nextRefresh": entry.next_refresh.to_rfc3339(),
        "timezone": tz.name(),
        "source": source,
        "totalSolved": entry.stats.as_ref().map(|stats| stats.total_solved),
        "error": entry.error,
    });

    if let Some(grid) = rolling {
        doc["rolling"] = json!({
            "firstDay": grid.first_day.to_string(),
            "lastDay": grid.last_day().to_string(),
            "columns": grid.columns().map(<[GridCell]>::to_vec).collect::<Vec<_>>(),
        });
    }
    if let Some(grid) = year {
        doc["year"] = json!(grid.months);
    }
    doc
}

pub fn format_refresh(entry: &WidgetEntry, tz: &Tz) -> String {
    format!("next refresh after {}", format_local(entry.next_refresh, tz))
}

fn pad(text: &str, width: usize) -> String {
    let visible = UnicodeWidthStr::width(text);
    format!("{text}{}", " ".repeat(width.saturating_sub(visible)))
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(header.as_str()));
    }

    for row in &rows {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    for idx in 0..column_count {
        write!(writer, "{:width$} ", headers[idx], width = widths[idx])?;
    }
    writeln!(writer)?;

    for idx in 0..column_count {
        write!(writer, "{:-<width$} ", "", width = widths[idx])?;
    }
    writeln!(writer)?;

    for row in rows {
        for idx in 0..column_count {
            let cell = &row[idx];
            let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
            let padding = widths[idx].saturating_sub(visible_width);
            write!(writer, "{}{} ", cell, " ".repeat(padding))?;
        }
        writeln!(writer)?;
    }

    Ok(())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, TimeZone, Utc};

    use super::{Renderer, entry_json, strip_ansi, write_table};
    use crate::calendar::CanonicalCalendar;
    use crate::config::Config;
    use crate::datetime::day_key;
    use crate::grid::{rolling_grid, year_grid};
    use crate::refresh::{EntrySource, WidgetEntry};
    use crate::stats::Stats;

    const UTC: chrono_tz::Tz = chrono_tz::UTC;

    fn entry(stats: Option<Stats>, error: Option<&str>) -> WidgetEntry {
        let now = Utc.with_ymd_and_hms(2026, 10, 18, 9, 0, 0).single().expect("valid now");
        WidgetEntry {
            date: now,
            stats,
            error: error.map(str::to_string),
            source: EntrySource::Network,
            next_refresh: now + chrono::Duration::hours(1),
        }
    }

    #[test]
    fn rolling_grid_draws_seven_rows() {
        let today = NaiveDate::from_ymd_opt(2026, 10, 18).expect("valid date");
        let calendar = CanonicalCalendar::from_day_keys([(day_key(today, &UTC), 3)]);
        let grid = rolling_grid(&calendar, today, &UTC);

        let mut out = Vec::new();
        let renderer = Renderer::plain();
        renderer
            .write_header(&mut out, &entry(Some(Stats::new(42, calendar)), None))
            .expect("header");
        renderer.write_rolling(&mut out, &grid).expect("grid");
        let text = String::from_utf8(out).expect("utf8");

        assert!(text.contains("Solved 42 problems"));
        let grid_lines: Vec<&str> = text.lines().filter(|line| line.contains('□') || line.contains('■')).collect();
        assert_eq!(grid_lines.len(), 7);
        assert!(grid_lines[6].ends_with('■'));
        assert!(text.contains("(1 active days)"));
    }

    #[test]
    fn color_setting_comes_from_config() {
        assert!(Renderer::new(&Config::default()).color);

        let mut cfg = Config::default();
        cfg.apply_overrides(vec![("rc.color".to_string(), "off".to_string())]);
        assert!(!Renderer::new(&cfg).color);

        cfg.apply_overrides(vec![("color".to_string(), "Yes".to_string())]);
        assert!(Renderer::new(&cfg).color);
    }

    #[test]
    fn header_shows_error_without_stats() {
        let mut out = Vec::new();
        Renderer::plain()
            .write_header(&mut out, &entry(None, Some("network down")))
            .expect("header");
        let text = String::from_utf8(out).expect("utf8");
        assert!(text.contains("! network down"));
        assert!(!text.contains("Solved"));
    }

    #[test]
    fn year_grid_draws_four_bands() {
        let today = NaiveDate::from_ymd_opt(2026, 10, 18).expect("valid date");
        let grid = year_grid(&CanonicalCalendar::new(), today, &UTC);
        let mut out = Vec::new();
        Renderer::plain().write_year(&mut out, &grid).expect("year");
        let text = String::from_utf8(out).expect("utf8");
        assert_eq!(text.matches("S M T W T F S").count(), 12);
        assert!(text.contains("Oct 2025"));
        assert!(text.contains("Sep 2026"));
    }

    #[test]
    fn json_export_uses_sentinels_and_columns() {
        let today = NaiveDate::from_ymd_opt(2026, 10, 18).expect("valid date");
        let calendar = CanonicalCalendar::new();
        let rolling = rolling_grid(&calendar, today, &UTC);
        let year = year_grid(&calendar, today, &UTC);
        let doc = entry_json(&entry(Some(Stats::new(5, calendar)), None), Some(&rolling), Some(&year), &UTC);

        assert_eq!(doc["totalSolved"], 5);
        assert_eq!(doc["source"], "network");
        assert_eq!(doc["rolling"]["columns"].as_array().map(Vec::len), Some(7));
        assert_eq!(doc["year"].as_array().map(Vec::len), Some(12));
        // Oct 2025 opens on a Wednesday.
        assert_eq!(doc["year"][0]["weeks"][0][0], -1);
        assert_eq!(doc["year"][0]["weeks"][0][3], 0);
    }

    #[test]
    fn table_pads_past_ansi_codes() {
        let mut out = Vec::new();
        write_table(
            &mut out,
            vec!["Setting".to_string(), "Value".to_string()],
            vec![vec!["\x1b[33mtz\x1b[0m".to_string(), "UTC".to_string()]],
        )
        .expect("table");
        let text = String::from_utf8(out).expect("utf8");
        assert_eq!(strip_ansi(&text).lines().nth(2), Some("tz      UTC   "));
    }
}
