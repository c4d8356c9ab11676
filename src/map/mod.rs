mod color;
mod geometry;
mod projection;
mod renderer;
mod spatial;

pub use color::{parse_hex, ColorScale, ColorStop};
pub use projection::Viewport;
pub use renderer::{ChoroplethMap, MapLayers};
