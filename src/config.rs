use crate::data::{NameFields, Source};
use crate::map::{parse_hex, ColorScale, ColorStop};
use crate::stats::{Bracket, Brackets, Count};
use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use serde::Deserialize;
use std::fs;
use std::path::Path;

pub const DEFAULT_SOURCE: &str = "https://raw.githubusercontent.com/spatial-data-lab/data/ba06af5e48b8fc656bacc3658e4f033c93e81e3b/us-state-Covid-19-cases.geojson";

pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// On-disk configuration. Every section is optional in the TOML file and
/// falls back to the built-in defaults.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Config {
    pub data: DataConfig,
    pub view: ViewConfig,
    pub color_stops: Vec<ColorStopConfig>,
    pub brackets: Vec<BracketConfig>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DataConfig {
    pub source: String,
    pub reference_date: String,
    pub date_series: Vec<String>,
    pub name_fields: Vec<String>,
    pub fallback_name: String,
}

#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct ViewConfig {
    pub center_lon: f64,
    pub center_lat: f64,
    pub zoom: f64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ColorStopConfig {
    pub threshold: Count,
    pub color: String, // Hex code
    pub label: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BracketConfig {
    pub label: String,
    /// Exclusive upper bound; omitted on the last bracket
    pub upper: Option<Count>,
}

impl Default for Config {
    fn default() -> Self {
        let colors = ColorScale::default();
        let brackets = Brackets::default();
        Self {
            data: DataConfig::default(),
            view: ViewConfig::default(),
            color_stops: colors
                .stops()
                .iter()
                .map(|s| ColorStopConfig {
                    threshold: s.threshold,
                    color: format!("#{:02x}{:02x}{:02x}", s.rgb.0, s.rgb.1, s.rgb.2),
                    label: s.label.clone(),
                })
                .collect(),
            brackets: brackets
                .iter()
                .map(|b| BracketConfig {
                    label: b.label.clone(),
                    upper: b.upper,
                })
                .collect(),
        }
    }
}

impl Default for DataConfig {
    fn default() -> Self {
        let names = NameFields::default();
        Self {
            source: DEFAULT_SOURCE.to_string(),
            reference_date: "2022-06-06".to_string(),
            date_series: [
                "2020-03-01", "2020-06-01", "2020-09-01", "2020-12-01",
                "2021-03-01", "2021-06-01", "2021-09-01", "2021-12-01",
                "2022-03-01", "2022-06-06",
            ]
            .iter()
            .map(|d| d.to_string())
            .collect(),
            name_fields: names.fields,
            fallback_name: names.fallback,
        }
    }
}

impl Default for ViewConfig {
    /// Continental US
    fn default() -> Self {
        Self {
            center_lon: -98.0,
            center_lat: 39.0,
            zoom: 5.0,
        }
    }
}

impl Config {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).with_context(|| "Failed to parse TOML configuration")
    }

    /// Validate and convert into the runtime settings
    pub fn into_settings(self) -> Result<Settings> {
        let data = self.data;

        parse_date(&data.reference_date).context("invalid reference_date")?;
        for date in &data.date_series {
            parse_date(date).context("invalid date_series entry")?;
        }
        if data.date_series.is_empty() {
            bail!("date_series must list at least one date");
        }
        if data.source.trim().is_empty() {
            bail!("data source is empty");
        }

        let stops = self
            .color_stops
            .into_iter()
            .map(|s| {
                Ok(ColorStop {
                    threshold: s.threshold,
                    rgb: parse_hex(&s.color)?,
                    label: s.label,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let colors = ColorScale::new(stops).context("invalid color_stops")?;

        let brackets = Brackets::new(
            self.brackets
                .into_iter()
                .map(|b| Bracket {
                    label: b.label,
                    upper: b.upper,
                })
                .collect(),
        )
        .context("invalid brackets")?;

        let view = self.view;
        if !(view.zoom.is_finite() && view.zoom > 0.0) {
            bail!("view zoom must be positive, got {}", view.zoom);
        }

        Ok(Settings {
            source: Source::parse(data.source.trim()),
            reference_date: data.reference_date,
            date_series: data.date_series,
            names: NameFields {
                fields: data.name_fields,
                fallback: data.fallback_name,
            },
            colors,
            brackets,
            home: view,
        })
    }
}

/// Validated, immutable settings for one session
#[derive(Debug, Clone)]
pub struct Settings {
    pub source: Source,
    pub reference_date: String,
    pub date_series: Vec<String>,
    pub names: NameFields,
    pub colors: ColorScale,
    pub brackets: Brackets,
    pub home: ViewConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            source: Source::Url(DEFAULT_SOURCE.to_string()),
            reference_date: DataConfig::default().reference_date,
            date_series: DataConfig::default().date_series,
            names: NameFields::default(),
            colors: ColorScale::default(),
            brackets: Brackets::default(),
            home: ViewConfig::default(),
        }
    }
}

pub fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, DATE_FORMAT)
        .with_context(|| format!("'{}' is not a {} date", s, DATE_FORMAT))
}
