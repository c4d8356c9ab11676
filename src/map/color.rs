use crate::stats::Count;
use anyhow::{bail, Context, Result};
use ratatui::style::Color;

/// One choropleth stop: values at `threshold` get exactly `rgb`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColorStop {
    pub threshold: Count,
    pub rgb: (u8, u8, u8),
    pub label: String,
}

impl ColorStop {
    pub fn color(&self) -> Color {
        let (r, g, b) = self.rgb;
        Color::Rgb(r, g, b)
    }
}

/// Linear color ramp over case counts, clamped at both ends
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColorScale {
    stops: Vec<ColorStop>,
}

impl ColorScale {
    pub fn new(stops: Vec<ColorStop>) -> Result<Self> {
        let Some(first) = stops.first() else {
            bail!("color stop table is empty");
        };
        if first.threshold != 0 {
            bail!("first color stop must be at 0, found {}", first.threshold);
        }
        for pair in stops.windows(2) {
            if pair[1].threshold <= pair[0].threshold {
                bail!(
                    "color stop thresholds must strictly increase ({} then {})",
                    pair[0].threshold,
                    pair[1].threshold
                );
            }
        }
        Ok(Self { stops })
    }

    pub fn stops(&self) -> &[ColorStop] {
        &self.stops
    }

    /// Interpolated fill color for a count
    pub fn color_for(&self, value: Count) -> Color {
        let (r, g, b) = self.rgb_for(value);
        Color::Rgb(r, g, b)
    }

    pub fn rgb_for(&self, value: Count) -> (u8, u8, u8) {
        let first = &self.stops[0];
        if value <= first.threshold {
            return first.rgb;
        }

        for pair in self.stops.windows(2) {
            let (lo, hi) = (&pair[0], &pair[1]);
            if value < hi.threshold {
                let t = (value - lo.threshold) as f64 / (hi.threshold - lo.threshold) as f64;
                return lerp_rgb(lo.rgb, hi.rgb, t);
            }
        }

        self.stops[self.stops.len() - 1].rgb
    }
}

impl Default for ColorScale {
    fn default() -> Self {
        let stop = |threshold, rgb, label: &str| ColorStop {
            threshold,
            rgb,
            label: label.to_string(),
        };
        Self {
            stops: vec![
                stop(0, (0xfe, 0xed, 0xde), "0"),
                stop(500_000, (0xfd, 0xbe, 0x85), "500K+"),
                stop(1_000_000, (0xfd, 0x8d, 0x3c), "1M+"),
                stop(2_000_000, (0xe6, 0x55, 0x0d), "2M+"),
                stop(4_000_000, (0xa6, 0x36, 0x03), "4M+"),
            ],
        }
    }
}

fn lerp_rgb(a: (u8, u8, u8), b: (u8, u8, u8), t: f64) -> (u8, u8, u8) {
    let mix = |x: u8, y: u8| (x as f64 + (y as f64 - x as f64) * t).round() as u8;
    (mix(a.0, b.0), mix(a.1, b.1), mix(a.2, b.2))
}

/// Parse `#rrggbb` (leading `#` optional)
pub fn parse_hex(s: &str) -> Result<(u8, u8, u8)> {
    let hex = s.trim().trim_start_matches('#');
    if hex.len() != 6 || !hex.is_ascii() {
        bail!("expected a #rrggbb color, got '{}'", s);
    }
    let channel = |i: usize| {
        u8::from_str_radix(&hex[i..i + 2], 16).with_context(|| format!("invalid hex color '{}'", s))
    };
    Ok((channel(0)?, channel(2)?, channel(4)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stop_colors_exact_at_thresholds() {
        let scale = ColorScale::default();
        for stop in scale.stops() {
            assert_eq!(scale.rgb_for(stop.threshold), stop.rgb);
        }
    }

    #[test]
    fn test_clamps_outside_range() {
        let scale = ColorScale::default();
        assert_eq!(scale.rgb_for(-5), (0xfe, 0xed, 0xde));
        assert_eq!(scale.rgb_for(50_000_000), (0xa6, 0x36, 0x03));
    }

    #[test]
    fn test_interpolates_between_stops() {
        let scale = ColorScale::new(vec![
            ColorStop {
                threshold: 0,
                rgb: (0, 0, 0),
                label: "0".into(),
            },
            ColorStop {
                threshold: 100,
                rgb: (200, 100, 50),
                label: "100+".into(),
            },
        ])
        .unwrap();
        assert_eq!(scale.rgb_for(50), (100, 50, 25));
        assert_eq!(scale.color_for(100), Color::Rgb(200, 100, 50));
    }

    #[test]
    fn test_rejects_bad_tables() {
        let stop = |threshold| ColorStop {
            threshold,
            rgb: (0, 0, 0),
            label: String::new(),
        };
        assert!(ColorScale::new(vec![]).is_err());
        assert!(ColorScale::new(vec![stop(10)]).is_err());
        assert!(ColorScale::new(vec![stop(0), stop(5), stop(5)]).is_err());
        assert!(ColorScale::new(vec![stop(0), stop(5)]).is_ok());
    }

    #[test]
    fn test_parse_hex() {
        assert_eq!(parse_hex("#fd8d3c").unwrap(), (0xfd, 0x8d, 0x3c));
        assert_eq!(parse_hex("A63603").unwrap(), (0xa6, 0x36, 0x03));
        assert!(parse_hex("#fff").is_err());
        assert!(parse_hex("#gg0000").is_err());
    }
}
