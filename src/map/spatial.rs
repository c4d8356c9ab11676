use std::collections::HashMap;

/// Spatial hash grid over bounding boxes for point queries.
/// Each item is registered in every cell its box touches.
pub struct SpatialGrid<T> {
    /// Grid cells indexed by (cell_x, cell_y)
    cells: HashMap<(i32, i32), Vec<usize>>,
    /// All items (indices into this vec stored in cells)
    items: Vec<T>,
    /// Cell size in degrees
    cell_size: f64,
}

impl<T> SpatialGrid<T> {
    /// Create a new spatial grid with given cell size in degrees
    pub fn new(cell_size: f64) -> Self {
        Self {
            cells: HashMap::new(),
            items: Vec::new(),
            cell_size,
        }
    }

    /// Convert lon/lat to cell coordinates
    #[inline(always)]
    fn to_cell(&self, lon: f64, lat: f64) -> (i32, i32) {
        let x = (lon / self.cell_size).floor() as i32;
        let y = (lat / self.cell_size).floor() as i32;
        (x, y)
    }

    /// Insert an item covering a lon/lat box
    pub fn insert_bbox(&mut self, (min_lon, min_lat, max_lon, max_lat): (f64, f64, f64, f64), item: T) {
        let idx = self.items.len();
        self.items.push(item);

        let min_cell = self.to_cell(min_lon, min_lat);
        let max_cell = self.to_cell(max_lon, max_lat);
        for y in min_cell.1..=max_cell.1 {
            for x in min_cell.0..=max_cell.0 {
                self.cells.entry((x, y)).or_default().push(idx);
            }
        }
    }

    /// Items whose box may contain the point, in insertion order
    pub fn query_point(&self, lon: f64, lat: f64) -> impl Iterator<Item = &T> + '_ {
        self.cells
            .get(&self.to_cell(lon, lat))
            .into_iter()
            .flatten()
            .map(|&idx| &self.items[idx])
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
