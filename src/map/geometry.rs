use crate::braille::BrailleCanvas;
use crate::data::Polygon;
use ratatui::style::Color;

/// Draw a line using Bresenham's algorithm
pub fn draw_line(canvas: &mut BrailleCanvas, x0: i32, y0: i32, x1: i32, y1: i32) {
    let dx = (x1 - x0).abs();
    let dy = -(y1 - y0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    let mut x = x0;
    let mut y = y0;

    loop {
        canvas.set_pixel_signed(x, y);

        if x == x1 && y == y1 {
            break;
        }

        let e2 = 2 * err;

        if e2 >= dy {
            if x == x1 {
                break;
            }
            err += dy;
            x += sx;
        }

        if e2 <= dx {
            if y == y1 {
                break;
            }
            err += dx;
            y += sy;
        }
    }
}

/// Scanline fill of projected rings with the even-odd rule, so holes stay
/// empty. Rows are sampled at pixel centers.
pub fn fill_rings(canvas: &mut BrailleCanvas, rings: &[Vec<(f64, f64)>], color: Color) {
    let (min_y, max_y) = rings
        .iter()
        .flatten()
        .fold((f64::MAX, f64::MIN), |(lo, hi), &(_, y)| (lo.min(y), hi.max(y)));
    if min_y > max_y {
        return;
    }

    let first_row = (min_y.floor() as i32).max(0);
    let last_row = (max_y.ceil() as i32).min(canvas.pixel_height() as i32 - 1);
    let mut crossings = Vec::new();

    for row in first_row..=last_row {
        let sample_y = row as f64 + 0.5;
        crossings.clear();

        for ring in rings {
            if ring.len() < 3 {
                continue;
            }
            let mut prev = ring[ring.len() - 1];
            for &point in ring {
                let (x0, y0) = prev;
                let (x1, y1) = point;
                // Half-open test so shared vertices count once
                if (y0 <= sample_y) != (y1 <= sample_y) {
                    crossings.push(x0 + (sample_y - y0) / (y1 - y0) * (x1 - x0));
                }
                prev = point;
            }
        }

        crossings.sort_by(|a, b| a.total_cmp(b));
        for pair in crossings.chunks_exact(2) {
            let start = (pair[0] - 0.5).ceil() as i32;
            let end = (pair[1] - 0.5).floor() as i32;
            if start <= end {
                canvas.paint_span(row, start, end, color);
            }
        }
    }
}

/// Even-odd point-in-ring test in lon/lat space
pub fn ring_contains(ring: &[(f64, f64)], lon: f64, lat: f64) -> bool {
    if ring.len() < 3 {
        return false;
    }
    let mut inside = false;
    let mut prev = ring[ring.len() - 1];
    for &(x1, y1) in ring {
        let (x0, y0) = prev;
        if (y0 > lat) != (y1 > lat) && lon < x0 + (lat - y0) / (y1 - y0) * (x1 - x0) {
            inside = !inside;
        }
        prev = (x1, y1);
    }
    inside
}

/// Inside the exterior ring and outside every hole
pub fn polygon_contains(polygon: &Polygon, lon: f64, lat: f64) -> bool {
    match polygon.split_first() {
        Some((exterior, holes)) => {
            ring_contains(exterior, lon, lat) && !holes.iter().any(|h| ring_contains(h, lon, lat))
        }
        None => false,
    }
}

/// Whether the segment a-b touches the rectangle `[0, width] x [0, height]`
/// (Liang-Barsky clipping)
pub fn segment_hits_rect(a: (f64, f64), b: (f64, f64), width: f64, height: f64) -> bool {
    let (dx, dy) = (b.0 - a.0, b.1 - a.1);
    let mut t_enter = 0.0_f64;
    let mut t_exit = 1.0_f64;

    for (p, q) in [(-dx, a.0), (dx, width - a.0), (-dy, a.1), (dy, height - a.1)] {
        if p == 0.0 {
            // Parallel to this edge and outside it
            if q < 0.0 {
                return false;
            }
            continue;
        }
        let t = q / p;
        if p < 0.0 {
            t_enter = t_enter.max(t);
        } else {
            t_exit = t_exit.min(t);
        }
        if t_enter > t_exit {
            return false;
        }
    }
    true
}

/// Lon/lat bounding box of a polygon's exterior: (min_lon, min_lat, max_lon, max_lat)
pub fn bounding_box(polygon: &Polygon) -> Option<(f64, f64, f64, f64)> {
    let exterior = polygon.first()?;
    if exterior.is_empty() {
        return None;
    }
    Some(exterior.iter().fold(
        (f64::MAX, f64::MAX, f64::MIN, f64::MIN),
        |(x0, y0, x1, y1), &(x, y)| (x0.min(x), y0.min(y), x1.max(x), y1.max(y)),
    ))
}
