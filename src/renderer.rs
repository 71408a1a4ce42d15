//! # Terminal Dashboard Rendering
//!
//! Plain-text output for the terminal:
//! - a conditions table with one row per dive spot
//! - a tide panel for one spot: current height and direction, next high/low
//!   with countdown, upcoming extremes, and a 24-hour ASCII tide curve
//!
//! Every `render_*` function builds a `String` so output can be tested; the
//! `draw_*` functions print those strings to stdout.
//!
//! Harmonic tide data is always labelled as an offline estimate.

use chrono::{DateTime, Duration, Utc};

use crate::aggregator::{FullConditions, TideConditions};
use crate::safety::SafetyLevel;
use crate::{HourlyHeightSeries, TideExtreme, TideKind, TideSource};

const CHART_ROWS: usize = 10;
const CHART_HOURS: i64 = 24;
const Y_AXIS_WIDTH: usize = 7;

/// Format a height in meters with two decimals, e.g. "1.25m" or "-0.40m".
pub fn format_height(height_m: f64) -> String {
    format!("{height_m:.2}m")
}

/// Countdown like "in 2h 05m". Past or present instants give "now".
pub fn format_countdown(until: Duration) -> String {
    let minutes = until.num_minutes();
    if minutes <= 0 {
        return "now".to_string();
    }
    format!("in {}h {:02}m", minutes / 60, minutes % 60)
}

pub fn format_direction(is_rising: Option<bool>) -> &'static str {
    match is_rising {
        Some(true) => "↑ RISING",
        Some(false) => "↓ FALLING",
        None => "-",
    }
}

fn source_label(source: TideSource) -> &'static str {
    match source {
        TideSource::Api => "Stormglass",
        TideSource::Harmonic => "estimate (offline model)",
    }
}

fn safety_label(level: SafetyLevel) -> &'static str {
    match level {
        SafetyLevel::Safe => "✓ SAFE",
        SafetyLevel::Caution => "! CAUTION",
        SafetyLevel::Unsafe => "✗ UNSAFE",
    }
}

fn pad(text: &str, width: usize) -> String {
    let len = text.chars().count();
    if len >= width {
        text.chars().take(width).collect()
    } else {
        format!("{text}{}", " ".repeat(width - len))
    }
}

/// One row per spot: wind, waves, tide, safety, visibility.
pub fn render_conditions_table(conditions: &[FullConditions]) -> String {
    const WIDTHS: [usize; 6] = [18, 14, 12, 16, 11, 14];
    let header = ["Spot", "Wind", "Waves", "Tide", "Safety", "Visibility"];

    let mut out = String::new();
    let line = |cells: [String; 6]| {
        cells
            .iter()
            .zip(WIDTHS)
            .map(|(c, w)| pad(c, w))
            .collect::<Vec<_>>()
            .join(" ")
            .trim_end()
            .to_string()
    };

    out.push_str(&line(header.map(String::from)));
    out.push('\n');
    let rule_width = WIDTHS.iter().sum::<usize>() + WIDTHS.len() - 1;
    out.push_str(&"─".repeat(rule_width));
    out.push('\n');

    for c in conditions {
        let wind = c.marine.as_ref().map_or("n/a".to_string(), |m| {
            match m.wind_gust_kt {
                Some(g) => format!("{:.0}kt (g{:.0})", m.wind_speed_kt, g),
                None => format!("{:.0}kt", m.wind_speed_kt),
            }
        });
        let waves = c
            .marine
            .as_ref()
            .map_or("n/a".to_string(), |m| format_height(m.wave_height_m));
        let tide = c.tides.as_ref().map_or("n/a".to_string(), |t| {
            let arrow = match t.is_rising {
                Some(true) => "↑",
                Some(false) => "↓",
                None => "",
            };
            let estimate = if t.source == TideSource::Harmonic { "~" } else { "" };
            match t.current_height_m {
                Some(h) => format!("{estimate}{}{arrow}", format_height(h)),
                None => "n/a".to_string(),
            }
        });
        let safety = c
            .safety
            .as_ref()
            .map_or("n/a", |s| safety_label(s.overall))
            .to_string();
        let visibility = c.visibility.as_ref().map_or("n/a".to_string(), |v| {
            format!("{} {}", v.level.as_str(), v.range_estimate)
        });
        let row = line([c.spot.name.clone(), wind, waves, tide, safety, visibility]);
        out.push_str(&row);
        out.push('\n');
    }
    out
}

/// ASCII curve of the next 24 hours from `now`, one column per sample.
///
/// The column closest to `now` is drawn as `X`; highs and lows inside the
/// window replace their curve point with `▲` and `▼`.
pub fn render_tide_curve(
    series: &HourlyHeightSeries,
    extremes: &[TideExtreme],
    now: DateTime<Utc>,
) -> String {
    let from = now - Duration::minutes(30);
    let window = series.window(from, now + Duration::hours(CHART_HOURS));
    if window.len() < 2 {
        return "(no tide data for the next 24h)\n".to_string();
    }

    let (min, max) = window
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), s| {
            (lo.min(s.height_m), hi.max(s.height_m))
        });
    let span = (max - min).max(1e-6);
    let to_row = |h: f64| {
        let normalized = (h - min) / span;
        ((1.0 - normalized) * (CHART_ROWS as f64 - 1.0)).round() as usize
    };

    let columns = window.len();
    let mut grid = vec![vec![' '; columns + Y_AXIS_WIDTH]; CHART_ROWS];

    // top, middle and bottom labels
    for h in [max, (min + max) / 2.0, min] {
        let row = to_row(h).min(CHART_ROWS - 1);
        for (i, ch) in pad(&format_height(h), Y_AXIS_WIDTH - 1).chars().enumerate() {
            grid[row][i] = ch;
        }
    }
    for row in grid.iter_mut() {
        row[Y_AXIS_WIDTH - 1] = '│';
    }

    let now_column = window
        .iter()
        .enumerate()
        .min_by_key(|(_, s)| (s.time - now).num_seconds().abs())
        .map(|(i, _)| i);

    for (column, sample) in window.iter().enumerate() {
        let row = to_row(sample.height_m).min(CHART_ROWS - 1);
        grid[row][column + Y_AXIS_WIDTH] = if Some(column) == now_column { 'X' } else { '•' };
    }

    let start = window[0].time;
    let end = window[columns - 1].time;
    for e in extremes.iter().filter(|e| e.time >= start && e.time <= end) {
        let column = window
            .iter()
            .enumerate()
            .min_by_key(|(_, s)| (s.time - e.time).num_seconds().abs())
            .map(|(i, _)| i)
            .unwrap_or(0);
        if Some(column) == now_column {
            continue;
        }
        let row = to_row(window[column].height_m).min(CHART_ROWS - 1);
        grid[row][column + Y_AXIS_WIDTH] = match e.kind {
            TideKind::High => '▲',
            TideKind::Low => '▼',
        };
    }

    let mut out = String::new();
    for row in grid {
        out.push_str(row.into_iter().collect::<String>().trim_end());
        out.push('\n');
    }

    let padding = " ".repeat(Y_AXIS_WIDTH);
    let ticks: String = (0..columns)
        .map(|i| if i % 6 == 0 { '|' } else { ' ' })
        .collect();
    out.push_str(&format!("{padding}{}\n", ticks.trim_end()));
    let label_width = columns.saturating_sub(3).max(1);
    out.push_str(&format!("{padding}{:<label_width$}+24h\n", "Now"));
    out
}

/// Current state, next events, upcoming extremes and the 24-hour curve.
pub fn render_tide_panel(name: &str, tides: &TideConditions, now: DateTime<Utc>) -> String {
    let mut out = String::new();
    let source = source_label(tides.source);
    out.push_str(&format!("Tides: {name}  [{source}]\n"));

    let current = tides
        .current_height_m
        .map_or("n/a".to_string(), format_height);
    out.push_str(&format!(
        "  Now:       {current}  {}\n",
        format_direction(tides.is_rising)
    ));

    for (label, event) in [("Next high", tides.next_high), ("Next low", tides.next_low)] {
        match event {
            Some(e) => out.push_str(&format!(
                "  {:<10} {}  {}  ({})\n",
                format!("{label}:"),
                e.time.format("%a %H:%M UTC"),
                format_height(e.height_m),
                format_countdown(e.time - now)
            )),
            None => out.push_str(&format!("  {:<10} -\n", format!("{label}:"))),
        }
    }

    let upcoming: Vec<_> = tides
        .extremes
        .iter()
        .filter(|e| e.time > now)
        .take(6)
        .collect();
    if !upcoming.is_empty() {
        out.push_str("\n  Upcoming:\n");
        for e in upcoming {
            let marker = if e.kind == TideKind::High { '▲' } else { '▼' };
            out.push_str(&format!(
                "    {marker} {:<4} {}  {}\n",
                e.kind.as_str(),
                e.time.format("%a %d %b %H:%M"),
                format_height(e.height_m)
            ));
        }
    }

    out.push('\n');
    let curve = render_tide_curve(&tides.hourly_heights, &tides.extremes, now);
    out.push_str(&curve);
    out
}

/// Conditions table, then the tide panel of the selected spot (or the first).
pub fn render_dashboard(
    conditions: &[FullConditions],
    selected: Option<&str>,
    now: DateTime<Utc>,
) -> String {
    let mut out = render_conditions_table(conditions);
    let chosen = match selected {
        Some(name) => conditions
            .iter()
            .find(|c| c.spot.name.eq_ignore_ascii_case(name)),
        None => conditions.first(),
    };
    if let Some(c) = chosen {
        out.push('\n');
        if let Some(safety) = &c.safety {
            out.push_str(&format!("{}: {}\n", c.spot.name, safety.details));
        }
        if let Some(v) = &c.visibility {
            out.push_str(&format!(
                "Visibility {} ({} confidence): {}\n",
                v.range_estimate,
                v.confidence.as_str(),
                v.notes
            ));
        }
        match &c.tides {
            Some(t) => {
                out.push('\n');
                out.push_str(&render_tide_panel(&c.spot.name, t, now));
            }
            None => out.push_str("Tides unavailable\n"),
        }
        for (source, error) in &c.metadata.errors {
            out.push_str(&format!("⚠ {source}: {error}\n"));
        }
    }
    out
}

pub fn draw_dashboard(conditions: &[FullConditions], selected: Option<&str>) {
    print!("{}", render_dashboard(conditions, selected, Utc::now()));
}

pub fn draw_tide_panel(name: &str, tides: &TideConditions) {
    print!("{}", render_tide_panel(name, tides, Utc::now()));
}
