use crate::core::models::Contributions;
use chrono::{Datelike, Duration, Months, NaiveDate};
use std::fmt::Write;

pub const CELL_SIZE: u32 = 11;
pub const CELL_GAP: u32 = 3;
pub const STROKE_PADDING: u32 = 2;
pub const MAX_WEEKS: u32 = 53;

const DEFAULT_QUARTILES: [u32; 4] = [0, 1, 3, 6];

const COLORS_DARK: [&str; 5] = ["#161b22", "#0e4429", "#006d32", "#26a641", "#39d353"];
const COLORS_LIGHT: [&str; 5] = ["#ebedf0", "#9be9a8", "#30c463", "#30a14e", "#216e39"];

const TERMINAL_SHADES: [char; 5] = ['·', '░', '▒', '▓', '█'];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Theme {
    #[default]
    Dark,
    Light,
}

impl Theme {
    pub fn palette(&self) -> &'static [&'static str; 5] {
        match self {
            Theme::Dark => &COLORS_DARK,
            Theme::Light => &COLORS_LIGHT,
        }
    }

    pub fn stroke(&self) -> &'static str {
        match self {
            Theme::Dark => "rgba(255, 255, 255, 0.4)",
            Theme::Light => "rgba(0, 0, 0, 0.4)",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cell {
    pub week: u32,
    pub weekday: u32,
    pub date: NaiveDate,
    pub count: u32,
    pub level: u8,
}

/// Level thresholds taken from the 25th/50th/75th percentile of the
/// non-zero days.
pub fn quartiles(data: &Contributions) -> [u32; 4] {
    let mut counts: Vec<u32> = data
        .contributions
        .iter()
        .map(|d| d.count)
        .filter(|c| *c > 0)
        .collect();

    if counts.is_empty() {
        return DEFAULT_QUARTILES;
    }
    counts.sort_unstable();

    let at = |fraction: f64| counts[(counts.len() as f64 * fraction).floor() as usize];
    [0, at(0.25).max(1), at(0.50), at(0.75)]
}

pub fn level(count: u32, quartiles: &[u32; 4]) -> u8 {
    match count {
        0 => 0,
        c if c <= quartiles[1] => 1,
        c if c <= quartiles[2] => 2,
        c if c <= quartiles[3] => 3,
        _ => 4,
    }
}

/// The Sunday on or before the same day one year earlier.
pub fn start_date(today: NaiveDate) -> NaiveDate {
    let year_ago = today
        .checked_sub_months(Months::new(12))
        .unwrap_or(today);
    year_ago - Duration::days(i64::from(year_ago.weekday().num_days_from_sunday()))
}

/// Number of week columns needed to reach `today`, capped at a year.
pub fn week_count(start: NaiveDate, today: NaiveDate) -> u32 {
    let days = (today - start).num_days().max(0) as u32;
    (days / 7 + 1).min(MAX_WEEKS)
}

/// One cell per day from the start date through `today`, column-major by
/// week with Sunday in row 0.
pub fn layout(data: &Contributions, today: NaiveDate) -> Vec<Cell> {
    let start = start_date(today);
    let weeks = week_count(start, today);
    let quartiles = quartiles(data);
    let counts = data.by_date();

    let mut cells = Vec::new();
    let mut date = start;
    'weeks: for week in 0..weeks {
        for weekday in 0..7 {
            if date > today {
                break 'weeks;
            }
            let count = counts.get(&date).copied().unwrap_or(0);
            cells.push(Cell {
                week,
                weekday,
                date,
                count,
                level: level(count, &quartiles),
            });
            date += Duration::days(1);
        }
    }
    cells
}

pub fn render_svg(data: &Contributions, today: NaiveDate, theme: Theme) -> String {
    let cells = layout(data, today);
    let weeks = cells.last().map_or(0, |c| c.week + 1);
    let pitch = CELL_SIZE + CELL_GAP;
    let width = (weeks * pitch).saturating_sub(CELL_GAP) + 2 * STROKE_PADDING;
    let height = 7 * pitch - CELL_GAP + 2 * STROKE_PADDING;
    let palette = theme.palette();

    let mut svg = format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="-{pad} -{pad} {width} {height}">"#,
        pad = STROKE_PADDING,
    );
    for cell in &cells {
        let _ = write!(
            svg,
            r#"<rect width="{size}" height="{size}" x="{x}" y="{y}" rx="5.5" stroke="{stroke}" stroke-width="1" fill="{fill}"><title>{count} contributions on {date}</title></rect>"#,
            size = CELL_SIZE,
            x = cell.week * pitch,
            y = cell.weekday * pitch,
            stroke = theme.stroke(),
            fill = palette[usize::from(cell.level)],
            count = cell.count,
            date = cell.date,
        );
    }
    svg.push_str("</svg>");
    svg
}

/// Seven text rows, Sunday first, one shade character per day.
pub fn render_terminal(data: &Contributions, today: NaiveDate) -> String {
    let cells = layout(data, today);
    let weeks = cells.last().map_or(0, |c| c.week + 1) as usize;
    let mut rows = vec![vec![' '; weeks]; 7];

    for cell in &cells {
        rows[cell.weekday as usize][cell.week as usize] = TERMINAL_SHADES[usize::from(cell.level)];
    }

    let mut out = String::new();
    for row in rows {
        out.extend(row);
        out.push('\n');
    }
    let _ = writeln!(out, "{} contributions in the last year", data.total());
    out
}
