use crate::charts::{format_count, Dashboard, SeriesColumns};
use crate::config::Settings;
use crate::data::{Dataset, LoadError};
use crate::map::{ChoroplethMap, Viewport};
use crate::stats::{dedup_by_name, histogram, time_series, total_cases, CaseCounts, Count};
use log::{debug, error};
use ratatui::layout::Rect;

/// Loaded data plus everything derived from it
pub struct Session {
    pub dataset: Dataset,
    pub map: ChoroplethMap,
}

/// Where the one-shot dataset load stands
pub enum LoadState {
    Loading,
    Ready(Session),
    Failed(String),
}

/// Interaction reported by the map, already resolved to features
#[derive(Debug, Clone, PartialEq)]
pub enum MapEvent {
    /// A state was clicked at a terminal cell
    Click { feature: usize, at: (u16, u16) },
    /// Pan or zoom ended; one entry per rendered polygon, so regions repeat
    ViewportChanged { rendered: Vec<usize> },
}

/// Popup shown next to a clicked state
#[derive(Debug, Clone, PartialEq)]
pub struct Popup {
    pub name: String,
    pub cases: Count,
    pub at: (u16, u16),
}

/// Application state
pub struct App {
    pub settings: Settings,
    pub viewport: Viewport,
    pub state: LoadState,
    pub dashboard: Dashboard,
    /// Total for whatever subset was last counted
    pub total: Count,
    pub popup: Option<Popup>,
    /// Inner map area on screen, in terminal cells
    pub map_area: Rect,
    pub should_quit: bool,
    /// Last mouse position for drag tracking
    pub last_mouse: Option<(u16, u16)>,
    /// Current mouse position for cursor marker
    pub mouse_pos: Option<(u16, u16)>,
    /// Whether the current left-button press has moved
    dragged: bool,
}

impl App {
    pub fn new(settings: Settings, map_area: Rect) -> Self {
        // Braille gives 2x4 resolution per character
        let viewport = Viewport::home(
            &settings.home,
            map_area.width as usize * 2,
            map_area.height as usize * 4,
        );

        Self {
            settings,
            viewport,
            state: LoadState::Loading,
            dashboard: Dashboard::new(),
            total: 0,
            popup: None,
            map_area,
            should_quit: false,
            last_mouse: None,
            mouse_pos: None,
            dragged: false,
        }
    }

    /// Update viewport size when the terminal resizes
    pub fn resize(&mut self, map_area: Rect) {
        self.map_area = map_area;
        self.viewport.width = map_area.width as usize * 2;
        self.viewport.height = map_area.height as usize * 4;
    }

    pub fn is_loading(&self) -> bool {
        matches!(self.state, LoadState::Loading)
    }

    pub fn session(&self) -> Option<&Session> {
        match &self.state {
            LoadState::Ready(session) => Some(session),
            _ => None,
        }
    }

    /// Install the dataset (or the failure) once the fetch completes
    pub fn finish_loading(&mut self, result: Result<Dataset, LoadError>) {
        match result {
            Ok(dataset) => {
                let map = ChoroplethMap::new(
                    &dataset,
                    &self.settings.colors,
                    &self.settings.reference_date,
                );
                self.state = LoadState::Ready(Session { dataset, map });
                self.show_full_dataset();
            }
            Err(e) => {
                error!("Failed to load dataset: {}", e);
                self.state = LoadState::Failed(e.to_string());
            }
        }
    }

    /// Total and histogram over every feature
    fn show_full_dataset(&mut self) {
        let Some(session) = self.session() else {
            return;
        };
        let date = &self.settings.reference_date;
        let features = session.dataset.features();
        let total = total_cases(features, date);
        let bins = histogram(features, &self.settings.brackets, date);

        self.total = total;
        self.dashboard.show_histogram(&bins);
    }

    /// Text for the total-count display
    pub fn count_text(&self) -> String {
        match self.state {
            LoadState::Loading => "Loading...".to_string(),
            LoadState::Failed(_) => "Error loading data".to_string(),
            LoadState::Ready(_) => format_count(self.total),
        }
    }

    /// Handle a resolved map interaction
    pub fn dispatch(&mut self, event: MapEvent) {
        let LoadState::Ready(session) = &self.state else {
            return;
        };
        let date = &self.settings.reference_date;

        match event {
            MapEvent::Click { feature, at } => {
                let Some(f) = session.dataset.get(feature) else {
                    return;
                };
                let values = time_series(f, &self.settings.date_series);
                self.popup = Some(Popup {
                    name: f.name.clone(),
                    cases: f.cases_on(date),
                    at,
                });
                self.dashboard.show_series(SeriesColumns {
                    x: self.settings.date_series.clone(),
                    name: f.name.clone(),
                    values,
                });
            }
            MapEvent::ViewportChanged { rendered } => {
                let features = rendered.iter().filter_map(|&i| session.dataset.get(i));
                let unique = dedup_by_name(features);
                debug!("{} rendered fragments, {} unique states", rendered.len(), unique.len());
                self.total = total_cases(unique, date);
            }
        }
    }

    /// Report the rendered subset after the view moved
    fn viewport_changed(&mut self) {
        let Some(session) = self.session() else {
            return;
        };
        let rendered = session.map.rendered_features(&session.dataset, &self.viewport);
        self.dispatch(MapEvent::ViewportChanged { rendered });
    }

    /// Home view, full-dataset total and histogram, empty time series
    pub fn reset(&mut self) {
        self.viewport = Viewport::home(&self.settings.home, self.viewport.width, self.viewport.height);
        self.popup = None;
        self.show_full_dataset();
        self.dashboard.clear_series();
    }

    /// Pan the map
    pub fn pan(&mut self, dx: i32, dy: i32) {
        self.viewport.pan(dx, dy);
        self.viewport_changed();
    }

    pub fn zoom_in(&mut self) {
        self.viewport.zoom_in();
        self.viewport_changed();
    }

    pub fn zoom_out(&mut self) {
        self.viewport.zoom_out();
        self.viewport_changed();
    }

    /// Zoom in towards a screen position (terminal column/row)
    pub fn zoom_in_at(&mut self, col: u16, row: u16) {
        if let Some((px, py)) = self.to_pixel(col, row) {
            self.viewport.zoom_in_at(px, py);
            self.viewport_changed();
        }
    }

    /// Zoom out from a screen position (terminal column/row)
    pub fn zoom_out_at(&mut self, col: u16, row: u16) {
        if let Some((px, py)) = self.to_pixel(col, row) {
            self.viewport.zoom_out_at(px, py);
            self.viewport_changed();
        }
    }

    pub fn toggle_fill(&mut self) {
        if let LoadState::Ready(session) = &mut self.state {
            session.map.toggle_fill();
        }
    }

    pub fn toggle_outlines(&mut self) {
        if let LoadState::Ready(session) = &mut self.state {
            session.map.toggle_outlines();
        }
    }

    /// Request quit
    pub fn quit(&mut self) {
        self.should_quit = true;
    }

    /// Left button pressed: may become a click or a drag
    pub fn press(&mut self, col: u16, row: u16) {
        if self.to_pixel(col, row).is_some() {
            self.last_mouse = Some((col, row));
            self.dragged = false;
        }
    }

    /// Handle mouse drag
    pub fn handle_drag(&mut self, x: u16, y: u16) {
        if let Some((last_x, last_y)) = self.last_mouse {
            let dx = last_x as i32 - x as i32;
            let dy = last_y as i32 - y as i32;
            // Some terminals report drags that stay in the pressed cell
            if dx == 0 && dy == 0 {
                return;
            }
            // Terminal cells are 2x4 braille pixels
            self.viewport.pan(dx * 2, dy * 4);
            self.dragged = true;
            self.last_mouse = Some((x, y));
        }
    }

    /// Left button released: a press without movement is a click
    pub fn release(&mut self, col: u16, row: u16) {
        if self.last_mouse.take().is_none() {
            return;
        }
        if self.dragged {
            self.dragged = false;
            self.viewport_changed();
        } else {
            self.click(col, row);
        }
    }

    /// Select the state under a screen position
    pub fn click(&mut self, col: u16, row: u16) {
        let Some((px, py)) = self.to_pixel(col, row) else {
            return;
        };
        let Some(session) = self.session() else {
            return;
        };
        let (lon, lat) = self.viewport.unproject(px, py);
        let hit = session.map.feature_at(&session.dataset, lon, lat);
        match hit {
            Some(feature) => self.dispatch(MapEvent::Click {
                feature,
                at: (col, row),
            }),
            None => self.popup = None,
        }
    }

    /// Update mouse cursor position
    pub fn set_mouse_pos(&mut self, col: u16, row: u16) {
        self.mouse_pos = Some((col, row));
    }

    /// Terminal cell to braille pixel inside the map, if it is on the map
    pub fn to_pixel(&self, col: u16, row: u16) -> Option<(i32, i32)> {
        let area = self.map_area;
        let inside = col >= area.x
            && col < area.x + area.width
            && row >= area.y
            && row < area.y + area.height;
        inside.then(|| ((col - area.x) as i32 * 2, (row - area.y) as i32 * 4))
    }

    /// Get current zoom level as a string
    pub fn zoom_level(&self) -> String {
        format!("{:.1}x", self.viewport.zoom)
    }

    /// Get current center coordinates as a string
    pub fn center_coords(&self) -> String {
        format!(
            "{:.1}°{}, {:.1}°{}",
            self.viewport.center_lat.abs(),
            if self.viewport.center_lat >= 0.0 { "N" } else { "S" },
            self.viewport.center_lon.abs(),
            if self.viewport.center_lon >= 0.0 { "E" } else { "W" }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Feature, Ring};
    use std::collections::BTreeMap;

    fn square(x: f64, y: f64, size: f64) -> Ring {
        vec![(x, y), (x + size, y), (x + size, y + size), (x, y + size), (x, y)]
    }

    fn feature(name: &str, cases: Count, polygons: Vec<Vec<Ring>>) -> Feature {
        Feature {
            name: name.to_string(),
            cases_by_date: BTreeMap::from([
                ("2022-06-06".to_string(), cases),
                ("2020-03-01".to_string(), cases / 100),
            ]),
            polygons,
        }
    }

    fn dataset() -> Dataset {
        Dataset::new(vec![
            feature("Kansas", 900_000, vec![vec![square(-102.0, 37.0, 7.0)]]),
            feature(
                "Michigan",
                2_500_000,
                vec![vec![square(-87.0, 41.0, 4.0)], vec![square(-90.0, 46.0, 4.0)]],
            ),
            feature("Alaska", 250_000, vec![vec![square(-160.0, 58.0, 15.0)]]),
        ])
    }

    fn loaded_app() -> App {
        let mut app = App::new(Settings::default(), Rect::new(1, 1, 100, 30));
        app.finish_loading(Ok(dataset()));
        app
    }

    #[test]
    fn test_loading_then_ready() {
        let mut app = App::new(Settings::default(), Rect::new(1, 1, 100, 30));
        assert!(app.is_loading());
        assert_eq!(app.count_text(), "Loading...");
        assert!(app.dashboard.histogram.get().is_none());

        app.finish_loading(Ok(dataset()));
        assert_eq!(app.total, 3_650_000);
        assert_eq!(app.count_text(), "3,650,000");
        let bars = &app.dashboard.histogram.get().unwrap().columns;
        assert_eq!(bars.counts, vec![1, 1, 0, 1, 0]);
    }

    #[test]
    fn test_failed_load_leaves_charts_empty() {
        let mut app = App::new(Settings::default(), Rect::new(1, 1, 100, 30));
        app.finish_loading(Err(LoadError::Interrupted));
        assert_eq!(app.count_text(), "Error loading data");
        assert!(app.session().is_none());
        assert!(app.dashboard.histogram.get().is_none());

        // Interaction before data is a no-op
        app.dispatch(MapEvent::Click { feature: 0, at: (2, 2) });
        assert!(app.dashboard.series.get().is_none());
    }

    #[test]
    fn test_viewport_change_counts_each_state_once() {
        let mut app = loaded_app();
        app.dispatch(MapEvent::ViewportChanged {
            rendered: vec![1, 0, 1],
        });
        assert_eq!(app.total, 3_400_000);
        // Histogram keeps describing the full dataset
        let bars = &app.dashboard.histogram.get().unwrap().columns;
        assert_eq!(bars.counts.iter().sum::<u64>(), 3);
    }

    #[test]
    fn test_click_fills_series_slot() {
        let mut app = loaded_app();
        app.dispatch(MapEvent::Click { feature: 1, at: (5, 5) });

        let popup = app.popup.as_ref().unwrap();
        assert_eq!(popup.name, "Michigan");
        assert_eq!(popup.cases, 2_500_000);

        let chart = app.dashboard.series.get().unwrap();
        assert_eq!(chart.columns.name, "Michigan");
        assert_eq!(chart.columns.values.len(), app.settings.date_series.len());
        assert_eq!(chart.columns.values[0], 25_000);
        assert_eq!(*chart.columns.values.last().unwrap(), 2_500_000);
    }

    #[test]
    fn test_click_on_screen_picks_state_under_cursor() {
        let mut app = loaded_app();
        // Map center maps to the home view center, inside Kansas
        app.click(1 + 50, 1 + 15);
        assert_eq!(app.popup.as_ref().map(|p| p.name.as_str()), Some("Kansas"));

        // Outside the map area nothing happens
        app.click(0, 0);
        assert_eq!(app.popup.as_ref().map(|p| p.name.as_str()), Some("Kansas"));
    }

    #[test]
    fn test_pan_recounts_visible_states() {
        let mut app = loaded_app();
        // Alaska is off screen in the home view
        app.pan(0, 0);
        assert_eq!(app.total, 3_400_000);
    }

    #[test]
    fn test_reset_restores_home_and_clears_series() {
        let mut app = loaded_app();
        app.dispatch(MapEvent::Click { feature: 0, at: (5, 5) });
        app.zoom_in();
        app.pan(40, 10);
        assert_ne!(app.viewport, Viewport::home(&app.settings.home, 200, 120));

        app.reset();
        assert_eq!(app.viewport, Viewport::home(&app.settings.home, 200, 120));
        assert_eq!(app.total, 3_650_000);
        assert!(app.dashboard.series.get().is_none());
        assert!(app.popup.is_none());
    }

    #[test]
    fn test_press_release_without_drag_is_click() {
        let mut app = loaded_app();
        app.press(51, 16);
        app.release(51, 16);
        assert!(app.dashboard.series.get().is_some());

        app.press(51, 16);
        app.handle_drag(60, 16);
        app.release(60, 16);
        assert!(app.last_mouse.is_none());
        // Dragging right moves the view west
        assert!(app.viewport.center_lon < -98.0);
    }

    #[test]
    fn test_drag_within_pressed_cell_is_still_click() {
        let mut app = loaded_app();
        let home = app.viewport.clone();
        app.press(51, 16);
        app.handle_drag(51, 16);
        app.release(51, 16);
        assert_eq!(app.viewport, home);
        assert_eq!(app.popup.as_ref().map(|p| p.name.as_str()), Some("Kansas"));
        assert!(app.dashboard.series.get().is_some());
    }
}
