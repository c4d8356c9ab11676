//! Terminal choropleth of COVID-19 cases per US state, with a case-bracket
//! histogram and a per-state time series.

pub mod app;
pub mod braille;
pub mod charts;
pub mod config;
pub mod data;
pub mod logging;
pub mod map;
pub mod report;
pub mod stats;
pub mod ui;
