//! Chart data for the two chart slots, and the coordinator that owns them.
//!
//! Charts are built from column data: `[series, ...values]` plus category or
//! date labels. The terminal widgets are created from these in `ui`.

use crate::config::parse_date;
use crate::stats::{Count, Histogram};
use log::debug;

pub const HISTOGRAM_SERIES: &str = "States";

/// Column data for the bracket histogram
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistogramColumns {
    pub series: String,
    pub categories: Vec<String>,
    pub counts: Vec<u64>,
}

impl From<&Histogram> for HistogramColumns {
    fn from(histogram: &Histogram) -> Self {
        Self {
            series: HISTOGRAM_SERIES.to_string(),
            categories: histogram.labels().map(str::to_string).collect(),
            counts: histogram.counts().map(|n| n as u64).collect(),
        }
    }
}

/// Column data for one region's time series
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesColumns {
    pub x: Vec<String>,
    pub name: String,
    pub values: Vec<Count>,
}

/// A live bar chart
#[derive(Debug, Clone)]
pub struct HistogramChart {
    pub columns: HistogramColumns,
    /// Axis ceiling, at least 1
    pub max: u64,
}

impl HistogramChart {
    pub fn new(columns: HistogramColumns) -> Self {
        let max = columns.counts.iter().copied().max().unwrap_or(0).max(1);
        Self { columns, max }
    }
}

/// A live line chart
#[derive(Debug, Clone)]
pub struct SeriesChart {
    pub columns: SeriesColumns,
    pub points: Vec<(f64, f64)>,
    pub y_bounds: [f64; 2],
    pub x_labels: Vec<String>,
}

impl SeriesChart {
    pub fn new(columns: SeriesColumns) -> Self {
        let points: Vec<(f64, f64)> = columns
            .values
            .iter()
            .enumerate()
            .map(|(i, &v)| (i as f64, v as f64))
            .collect();

        let max = columns.values.iter().copied().max().unwrap_or(0).max(1);
        let min = columns.values.iter().copied().min().unwrap_or(0).min(0);

        // First, middle and last dates keep the axis readable
        let x_labels = match columns.x.len() {
            0 => Vec::new(),
            1 => vec![month_label(&columns.x[0])],
            n => vec![
                month_label(&columns.x[0]),
                month_label(&columns.x[n / 2]),
                month_label(&columns.x[n - 1]),
            ],
        };

        Self {
            columns,
            points,
            y_bounds: [min as f64, max as f64],
            x_labels,
        }
    }

    pub fn x_bounds(&self) -> [f64; 2] {
        [0.0, (self.points.len().saturating_sub(1)).max(1) as f64]
    }
}

/// Holds at most one live chart; a new chart releases the old one first
#[derive(Debug)]
pub struct ChartSlot<T> {
    name: &'static str,
    live: Option<T>,
}

impl<T> ChartSlot<T> {
    pub fn new(name: &'static str) -> Self {
        Self { name, live: None }
    }

    pub fn replace(&mut self, chart: T) {
        self.release();
        self.live = Some(chart);
    }

    /// Drop the live chart, returning it if there was one
    pub fn release(&mut self) -> Option<T> {
        let old = self.live.take();
        if old.is_some() {
            debug!("Released {} chart", self.name);
        }
        old
    }

    pub fn get(&self) -> Option<&T> {
        self.live.as_ref()
    }
}

/// Rendering coordinator owning both chart slots
#[derive(Debug)]
pub struct Dashboard {
    pub histogram: ChartSlot<HistogramChart>,
    pub series: ChartSlot<SeriesChart>,
}

impl Dashboard {
    pub fn new() -> Self {
        Self {
            histogram: ChartSlot::new("histogram"),
            series: ChartSlot::new("time series"),
        }
    }

    pub fn show_histogram(&mut self, histogram: &Histogram) {
        self.histogram
            .replace(HistogramChart::new(HistogramColumns::from(histogram)));
    }

    pub fn show_series(&mut self, columns: SeriesColumns) {
        self.series.replace(SeriesChart::new(columns));
    }

    /// Back to the "click a state" placeholder
    pub fn clear_series(&mut self) {
        self.series.release();
    }
}

impl Default for Dashboard {
    fn default() -> Self {
        Self::new()
    }
}

/// `1234567` -> `1,234,567`
pub fn format_count(n: Count) -> String {
    let digits = n.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if n < 0 {
        out.push('-');
    }
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Compact axis tick: `1.5M`, `12K`, `950`
pub fn compact_tick(value: f64) -> String {
    if value >= 1_000_000.0 {
        format!("{:.1}M", value / 1_000_000.0)
    } else if value >= 1_000.0 {
        format!("{:.0}K", value / 1_000.0)
    } else {
        format!("{}", value.round() as i64)
    }
}

/// `2021-06-01` -> `2021-06`; unparsable keys pass through
pub fn month_label(date: &str) -> String {
    parse_date(date)
        .map(|d| d.format("%Y-%m").to_string())
        .unwrap_or_else(|_| date.to_string())
}
