//! Plain-text summary for `--summary`.

use crate::charts::{format_count, month_label};
use crate::config::Settings;
use crate::data::Dataset;
use crate::stats::{histogram, time_series, total_cases};
use anyhow::{Context, Result};
use std::fmt::Write;

/// Total, bracket histogram and, for `state`, its time series
pub fn summary(dataset: &Dataset, settings: &Settings, state: Option<&str>) -> Result<String> {
    let date = &settings.reference_date;
    let features = dataset.features();
    let mut out = String::new();

    writeln!(out, "Total cases on {}: {}", date, format_count(total_cases(features, date)))?;
    writeln!(out)?;
    writeln!(out, "States by case bracket:")?;
    for (label, count) in &histogram(features, &settings.brackets, date).bins {
        writeln!(out, "  {:<10} {:>3}", label, count)?;
    }

    if let Some(name) = state {
        let feature = dataset
            .find(name)
            .with_context(|| format!("No state named '{}' in the dataset", name))?;
        writeln!(out)?;
        writeln!(out, "Cases over time: {}", feature.name)?;
        let values = time_series(feature, &settings.date_series);
        for (date, value) in settings.date_series.iter().zip(values) {
            writeln!(out, "  {}  {:>12}", month_label(date), format_count(value))?;
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Feature;
    use std::collections::BTreeMap;

    fn settings() -> Settings {
        Settings {
            date_series: vec!["2020-03-01".into(), "2021-06-01".into()],
            ..Settings::default()
        }
    }

    fn dataset() -> Dataset {
        let feature = |name: &str, counts: &[(&str, i64)]| Feature {
            name: name.to_string(),
            cases_by_date: counts.iter().map(|&(d, n)| (d.to_string(), n)).collect::<BTreeMap<_, _>>(),
            polygons: Vec::new(),
        };
        Dataset::new(vec![
            feature("Ohio", &[("2022-06-06", 2_700_000), ("2020-03-01", 12)]),
            feature("Maine", &[("2022-06-06", 260_000)]),
        ])
    }

    #[test]
    fn test_summary_totals_and_brackets() {
        let text = summary(&dataset(), &settings(), None).unwrap();
        let expected = "\
Total cases on 2022-06-06: 2,960,000

States by case bracket:
  <500K        1
  500K–1M      0
  1M–2M        0
  2M–4M        1
  >4M          0
";
        assert_eq!(text, expected);
    }

    #[test]
    fn test_summary_with_state_series() {
        let text = summary(&dataset(), &settings(), Some("ohio")).unwrap();
        assert!(text.ends_with(
            "\nCases over time: Ohio\n  2020-03            12\n  2021-06             0\n"
        ));
    }

    #[test]
    fn test_summary_unknown_state() {
        let err = summary(&dataset(), &settings(), Some("Atlantis")).unwrap_err();
        assert!(err.to_string().contains("Atlantis"));
    }
}
