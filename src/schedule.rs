//! Weekly Gantt computation and a plain-text renderer.

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use serde::Serialize;
use std::fmt::Write;
use thiserror::Error;

use crate::models::WorkflowStatus;

const LABEL_WIDTH: usize = 40;
const CELL_WIDTH: usize = 7;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("Invalid ISO week {week} of {year}")]
    InvalidWeek { year: i32, week: u32 },
}

/// Latest known state of one milestone at one site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GanttRow {
    pub site_code: String,
    pub milestone: String,
    pub status: WorkflowStatus,
    pub planned_start: Option<NaiveDate>,
    pub planned_end: Option<NaiveDate>,
    pub actual_start: Option<NaiveDate>,
    pub actual_end: Option<NaiveDate>,
}

/// Day offsets (0 = Monday, 6 = Sunday), both inclusive.
pub type DaySpan = (u8, u8);

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChartRow {
    pub label: String,
    pub status: WorkflowStatus,
    pub planned: Option<DaySpan>,
    pub actual: Option<DaySpan>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WeekChart {
    pub year: i32,
    pub week: u32,
    pub monday: NaiveDate,
    pub sunday: NaiveDate,
    pub rows: Vec<ChartRow>,
}

/// Monday and Sunday of an ISO week.
pub fn week_window(year: i32, week: u32) -> Result<(NaiveDate, NaiveDate), ScheduleError> {
    let invalid = ScheduleError::InvalidWeek { year, week };
    let monday = NaiveDate::from_isoywd_opt(year, week, Weekday::Mon).ok_or(invalid.clone())?;
    let sunday = monday
        .checked_add_signed(Duration::days(6))
        .ok_or(invalid)?;
    Ok((monday, sunday))
}

/// ISO year and week containing `date`.
#[must_use]
pub fn iso_week_of(date: NaiveDate) -> (i32, u32) {
    let week = date.iso_week();
    (week.year(), week.week())
}

/// Part of `[start, end]` that falls in the week starting `monday`.
///
/// A start without an end is drawn as a single day.
#[must_use]
pub fn bar_span(
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    monday: NaiveDate,
) -> Option<DaySpan> {
    let start = start?;
    let end = end.unwrap_or(start);
    if end < start {
        return None;
    }

    let sunday = monday.checked_add_signed(Duration::days(6))?;
    let first = start.max(monday);
    let last = end.min(sunday);
    if first > last {
        return None;
    }

    let offset = |day: NaiveDate| u8::try_from((day - monday).num_days()).ok();
    Some((offset(first)?, offset(last)?))
}

/// Rows with no bar inside the week are left out.
pub fn build_week_chart(
    rows: &[GanttRow],
    year: i32,
    week: u32,
) -> Result<WeekChart, ScheduleError> {
    let (monday, sunday) = week_window(year, week)?;

    let rows = rows
        .iter()
        .filter_map(|row| {
            let planned = bar_span(row.planned_start, row.planned_end, monday);
            let actual = bar_span(row.actual_start, row.actual_end, monday);
            if planned.is_none() && actual.is_none() {
                return None;
            }
            Some(ChartRow {
                label: format!("{} / {}", row.site_code, row.milestone),
                status: row.status,
                planned,
                actual,
            })
        })
        .collect();

    Ok(WeekChart {
        year,
        week,
        monday,
        sunday,
        rows,
    })
}

fn covers(span: Option<DaySpan>, day: u8) -> bool {
    span.is_some_and(|(first, last)| first <= day && day <= last)
}

fn truncate_label(label: &str) -> String {
    if label.chars().count() <= LABEL_WIDTH {
        label.to_string()
    } else {
        let mut short: String = label.chars().take(LABEL_WIDTH - 3).collect();
        short.push_str("...");
        short
    }
}

/// Draws the chart with `=` for planned days and `#` for actual days.
#[must_use]
pub fn render_text(chart: &WeekChart) -> String {
    let mut out = String::new();

    let _ = writeln!(
        out,
        "Week {} of {} ({} to {})",
        chart.week, chart.year, chart.monday, chart.sunday
    );

    let _ = write!(out, "{:<LABEL_WIDTH$}   ", "");
    for day in chart.monday.iter_days().take(7) {
        let _ = write!(out, "{:^CELL_WIDTH$}", day.format("%a %d").to_string());
    }
    out.push('\n');
    let _ = writeln!(out, "{:-<width$}", "", width = LABEL_WIDTH + 3 + CELL_WIDTH * 7);

    if chart.rows.is_empty() {
        out.push_str("(nothing scheduled this week)\n");
        return out;
    }

    for row in &chart.rows {
        let _ = write!(
            out,
            "{:<LABEL_WIDTH$} {} ",
            truncate_label(&row.label),
            row.status.marker()
        );
        for day in 0..7u8 {
            let fill = if covers(row.actual, day) {
                '#'
            } else if covers(row.planned, day) {
                '='
            } else {
                ' '
            };
            out.extend(std::iter::repeat_n(fill, CELL_WIDTH));
        }
        out.push('\n');
    }

    out.push_str("\n= planned  # actual  status: . to do  > in progress  ! blocked  * done\n");
    out
}
