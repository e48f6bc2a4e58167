//! Raster data structures and the D8 neighbourhood

pub mod d8;
mod element;
mod geotransform;
mod grid;

pub use element::{RasterElement, SampleFormat};
pub use geotransform::GeoTransform;
pub use grid::{Raster, RasterStatistics};
