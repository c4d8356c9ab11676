use crate::braille::BrailleCanvas;
use crate::data::{Dataset, Polygon, Ring};
use crate::map::color::ColorScale;
use crate::map::geometry::{
    bounding_box, draw_line, fill_rings, polygon_contains, segment_hits_rect,
};
use crate::map::projection::Viewport;
use crate::map::spatial::SpatialGrid;
use crate::stats::CaseCounts;
use ratatui::style::Color;

/// Grid cell size for click hit-testing, in degrees
const PICK_CELL_DEGREES: f64 = 2.0;

/// Display settings for map layers
#[derive(Clone)]
pub struct DisplaySettings {
    pub show_fill: bool,
    pub show_outlines: bool,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            show_fill: true,
            show_outlines: true,
        }
    }
}

/// Rendered canvases, back to front
pub struct MapLayers {
    pub fill: BrailleCanvas,
    pub outlines: BrailleCanvas,
}

/// One polygon of a feature's geometry
struct Part {
    feature: usize,
    polygon: usize,
    bbox: (f64, f64, f64, f64),
}

/// Choropleth over a loaded dataset: per-feature fill colors, a polygon index
/// for hit-testing, and braille rendering.
pub struct ChoroplethMap {
    fills: Vec<Color>,
    parts: Vec<Part>,
    pick_grid: SpatialGrid<usize>,
    pub settings: DisplaySettings,
}

impl ChoroplethMap {
    pub fn new(dataset: &Dataset, colors: &ColorScale, reference_date: &str) -> Self {
        let fills = dataset
            .features()
            .iter()
            .map(|f| colors.color_for(f.cases_on(reference_date)))
            .collect();

        let mut parts = Vec::new();
        let mut pick_grid = SpatialGrid::new(PICK_CELL_DEGREES);
        for (feature, f) in dataset.features().iter().enumerate() {
            for (polygon, rings) in f.polygons.iter().enumerate() {
                let Some(bbox) = bounding_box(rings) else {
                    continue;
                };
                pick_grid.insert_bbox(bbox, parts.len());
                parts.push(Part {
                    feature,
                    polygon,
                    bbox,
                });
            }
        }

        Self {
            fills,
            parts,
            pick_grid,
            settings: DisplaySettings::default(),
        }
    }

    /// Fill color assigned to a feature
    pub fn fill_color(&self, feature: usize) -> Option<Color> {
        self.fills.get(feature).copied()
    }

    /// Render all layers to canvases of `width` x `height` characters
    pub fn render(&self, dataset: &Dataset, width: usize, height: usize, viewport: &Viewport) -> MapLayers {
        let mut fill = BrailleCanvas::new(width, height);
        let mut outlines = BrailleCanvas::new(width, height);

        for part in self.parts.iter().filter(|p| viewport.bbox_visible(p.bbox)) {
            let rings = &dataset.features()[part.feature].polygons[part.polygon];

            if self.settings.show_fill {
                let projected: Vec<Vec<(f64, f64)>> = rings
                    .iter()
                    .map(|ring| ring.iter().map(|&(lon, lat)| viewport.project_f(lon, lat)).collect())
                    .collect();
                fill_rings(&mut fill, &projected, self.fills[part.feature]);
            }

            if self.settings.show_outlines {
                for ring in rings {
                    self.draw_ring(&mut outlines, ring, viewport);
                }
            }
        }

        MapLayers { fill, outlines }
    }

    /// Draw a ring outline with viewport culling
    fn draw_ring(&self, canvas: &mut BrailleCanvas, ring: &Ring, viewport: &Viewport) {
        if ring.len() < 2 {
            return;
        }

        let mut prev: Option<(i32, i32)> = None;

        for &(lon, lat) in ring {
            let (px, py) = viewport.project(lon, lat);

            if let Some((prev_x, prev_y)) = prev {
                if viewport.line_might_be_visible((prev_x, prev_y), (px, py)) {
                    draw_line(canvas, prev_x, prev_y, px, py);
                }
            }

            prev = Some((px, py));
        }
    }

    /// Index of the first feature containing the point
    pub fn feature_at(&self, dataset: &Dataset, lon: f64, lat: f64) -> Option<usize> {
        self.pick_grid
            .query_point(lon, lat)
            .map(|&part| &self.parts[part])
            .find(|p| polygon_contains(&dataset.features()[p.feature].polygons[p.polygon], lon, lat))
            .map(|p| p.feature)
    }

    /// Feature index of every visible polygon. A region drawn as several
    /// polygons appears once per visible polygon.
    pub fn rendered_features(&self, dataset: &Dataset, viewport: &Viewport) -> Vec<usize> {
        self.parts
            .iter()
            .filter(|p| viewport.bbox_visible(p.bbox))
            .filter(|p| {
                polygon_visible(&dataset.features()[p.feature].polygons[p.polygon], viewport)
            })
            .map(|p| p.feature)
            .collect()
    }

    pub fn toggle_fill(&mut self) {
        self.settings.show_fill = !self.settings.show_fill;
    }

    pub fn toggle_outlines(&mut self) {
        self.settings.show_outlines = !self.settings.show_outlines;
    }
}

/// A polygon is on screen when one of its edges crosses the canvas, or when
/// it covers the whole canvas.
fn polygon_visible(polygon: &Polygon, viewport: &Viewport) -> bool {
    let (width, height) = (viewport.width as f64, viewport.height as f64);

    let edge_on_screen = polygon.iter().any(|ring| {
        let projected: Vec<(f64, f64)> = ring
            .iter()
            .map(|&(lon, lat)| viewport.project_f(lon, lat))
            .collect();
        projected
            .iter()
            .zip(projected.iter().cycle().skip(1))
            .any(|(&a, &b)| segment_hits_rect(a, b, width, height))
    });
    if edge_on_screen {
        return true;
    }

    let (lon, lat) = viewport.unproject(viewport.width as i32 / 2, viewport.height as i32 / 2);
    polygon_contains(polygon, lon, lat)
}
