//! Fixed-geometry projections of a canonical calendar.
//!
//! Both projections are pure: they read the calendar, never fetch or mutate
//! it, and number weekdays from Sunday = 0.

use chrono::{Datelike, NaiveDate};
use chrono_tz::Tz;
use serde::{Serialize, Serializer};

use crate::calendar::CanonicalCalendar;
use crate::datetime::{
    add_days, day_key, days_in_month, first_day_of_month, last_day_of_month, shift_months,
    weekday_from_sunday,
};

pub const DAYS_PER_WEEK: usize = 7;
pub const ROLLING_DAYS: usize = DAYS_PER_WEEK * DAYS_PER_WEEK;
pub const YEAR_MONTHS: usize = 12;

/// Exported value of a cell that is not a real day of its window or month.
pub const OUT_OF_RANGE: i64 = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GridCell {
    Empty,
    Active(u64),
    OutOfRange,
}

impl GridCell {
    pub fn from_count(count: u64) -> Self {
        if count == 0 { Self::Empty } else { Self::Active(count) }
    }

    pub fn count(self) -> Option<u64> {
        match self {
            Self::Empty => Some(0),
            Self::Active(count) => Some(count),
            Self::OutOfRange => None,
        }
    }

    /// The count, or [`OUT_OF_RANGE`].
    pub fn value(self) -> i64 {
        self.count()
            .map(|count| i64::try_from(count).unwrap_or(i64::MAX))
            .unwrap_or(OUT_OF_RANGE)
    }

    pub fn is_active(self) -> bool {
        matches!(self, Self::Active(_))
    }

    pub fn is_out_of_range(self) -> bool {
        matches!(self, Self::OutOfRange)
    }
}

impl Serialize for GridCell {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(self.value())
    }
}

/// The 49 days ending today, oldest first.
///
/// Laid out as 7 columns of 7: column `c`, row `r` is linear index `7c + r`,
/// so each column is one week counted from the first day of the window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RollingGrid {
    pub first_day: NaiveDate,
    pub cells: Vec<GridCell>,
}

impl RollingGrid {
    pub fn last_day(&self) -> NaiveDate {
        add_days(self.first_day, ROLLING_DAYS as i64 - 1)
    }

    pub fn cell_at(&self, column: usize, row: usize) -> Option<GridCell> {
        if column >= DAYS_PER_WEEK || row >= DAYS_PER_WEEK {
            return None;
        }
        self.cells.get(column * DAYS_PER_WEEK + row).copied()
    }

    pub fn date_at(&self, column: usize, row: usize) -> Option<NaiveDate> {
        if column >= DAYS_PER_WEEK || row >= DAYS_PER_WEEK {
            return None;
        }
        Some(add_days(self.first_day, (column * DAYS_PER_WEEK + row) as i64))
    }

    pub fn columns(&self) -> impl Iterator<Item = &[GridCell]> {
        self.cells.chunks(DAYS_PER_WEEK)
    }

    /// Row-major view for drawing line by line.
    pub fn rows(&self) -> Vec<[GridCell; DAYS_PER_WEEK]> {
        (0..DAYS_PER_WEEK)
            .map(|row| {
                let mut line = [GridCell::OutOfRange; DAYS_PER_WEEK];
                for (column, slot) in line.iter_mut().enumerate() {
                    if let Some(cell) = self.cell_at(column, row) {
                        *slot = cell;
                    }
                }
                line
            })
            .collect()
    }

    pub fn active_days(&self) -> usize {
        self.cells.iter().filter(|cell| cell.is_active()).count()
    }
}

#[tracing::instrument(skip(calendar, tz))]
pub fn rolling_grid(calendar: &CanonicalCalendar, today: NaiveDate, tz: &Tz) -> RollingGrid {
    let first_day = add_days(today, -(ROLLING_DAYS as i64 - 1));
    let cells = (0..ROLLING_DAYS)
        .map(|offset| {
            let date = add_days(first_day, offset as i64);
            GridCell::from_count(calendar.count_for_key(day_key(date, tz)))
        })
        .collect();

    RollingGrid { first_day, cells }
}

/// One month as weeks of Sunday..Saturday. Padding before the 1st and after
/// the last day is [`GridCell::OutOfRange`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthGrid {
    pub year: i32,
    pub month: u32,
    pub weeks: Vec<[GridCell; DAYS_PER_WEEK]>,
}

impl MonthGrid {
    pub fn first_day(&self) -> NaiveDate {
        first_day_of_month(self.year, self.month)
    }

    pub fn last_day(&self) -> NaiveDate {
        last_day_of_month(self.year, self.month)
    }

    /// Sunday on or before the 1st; row 0, column 0 of the grid.
    pub fn grid_origin(&self) -> NaiveDate {
        let first = self.first_day();
        add_days(first, -i64::from(weekday_from_sunday(first)))
    }

    pub fn row_count(&self) -> usize {
        self.weeks.len()
    }

    pub fn cell(&self, row: usize, weekday: usize) -> Option<GridCell> {
        self.weeks.get(row).and_then(|week| week.get(weekday)).copied()
    }

    pub fn date_at(&self, row: usize, weekday: usize) -> Option<NaiveDate> {
        if row >= self.weeks.len() || weekday >= DAYS_PER_WEEK {
            return None;
        }
        Some(add_days(self.grid_origin(), (row * DAYS_PER_WEEK + weekday) as i64))
    }

    pub fn title(&self) -> String {
        self.first_day().format("%b %Y").to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct YearGrid {
    pub months: Vec<MonthGrid>,
}

/// Month grid for `year`/`month`. Days after `today` are empty whatever the
/// calendar says.
pub fn month_grid(
    calendar: &CanonicalCalendar,
    year: i32,
    month: u32,
    today: NaiveDate,
    tz: &Tz,
) -> MonthGrid {
    let first = first_day_of_month(year, month);
    let last = last_day_of_month(year, month);
    let leading = weekday_from_sunday(first) as usize;
    let row_count = (leading + days_in_month(year, month) as usize).div_ceil(DAYS_PER_WEEK);
    let origin = add_days(first, -(leading as i64));

    let weeks = (0..row_count)
        .map(|row| {
            let mut week = [GridCell::OutOfRange; DAYS_PER_WEEK];
            for (weekday, slot) in week.iter_mut().enumerate() {
                let date = add_days(origin, (row * DAYS_PER_WEEK + weekday) as i64);
                *slot = if date < first || date > last {
                    GridCell::OutOfRange
                } else if date > today {
                    GridCell::Empty
                } else {
                    GridCell::from_count(calendar.count_for_key(day_key(date, tz)))
                };
            }
            week
        })
        .collect();

    MonthGrid { year, month, weeks }
}

/// Twelve months starting at the month that contains the day exactly one
/// year before `today`.
#[tracing::instrument(skip(calendar, tz))]
pub fn year_grid(calendar: &CanonicalCalendar, today: NaiveDate, tz: &Tz) -> YearGrid {
    let anchor = shift_months(today, -(YEAR_MONTHS as i32));
    let anchor = first_day_of_month(anchor.year(), anchor.month());

    let months = (0..YEAR_MONTHS)
        .map(|offset| {
            let start = shift_months(anchor, offset as i32);
            month_grid(calendar, start.year(), start.month(), today, tz)
        })
        .collect();

    YearGrid { months }
}
