//! # hydrodem core
//!
//! Core types and I/O shared by the hydrodem terrain-hydrology crates.
//!
//! This crate provides:
//! - `Raster<T>`: georeferenced 2D grid (elevation, flow codes, counts, masks)
//! - `GeoTransform`: affine transformation for georeferencing
//! - `CRS`: coordinate reference system handling
//! - `d8`: the D8 direction encoding shared by every routing stage
//! - `Feature`: GeoJSON-compatible vector output
//! - GeoTIFF reading and writing

pub mod crs;
pub mod error;
pub mod io;
pub mod raster;
pub mod vector;

pub use crs::CRS;
pub use error::{Error, Result};
pub use raster::{d8, GeoTransform, Raster, RasterElement};
pub use vector::{AttributeValue, Feature};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::crs::CRS;
    pub use crate::error::{Error, Result};
    pub use crate::raster::{d8, GeoTransform, Raster, RasterElement};
    pub use crate::vector::{AttributeValue, Feature};
    pub use crate::Algorithm;
}

/// Core trait for the hydrology stages.
///
/// Stages are pure functions of their input and parameters: they never
/// mutate the input and keep no state between calls.
pub trait Algorithm {
    /// Input type for the stage
    type Input;
    /// Output type for the stage
    type Output;
    /// Parameters controlling stage behavior
    type Params: Default;
    /// Error type for stage execution
    type Error: std::error::Error;

    /// Returns the stage name
    fn name(&self) -> &'static str;

    /// Returns a description of what the stage does
    fn description(&self) -> &'static str;

    /// Execute the stage
    fn execute(
        &self,
        input: Self::Input,
        params: Self::Params,
    ) -> std::result::Result<Self::Output, Self::Error>;

    /// Execute with default parameters
    fn execute_default(&self, input: Self::Input) -> std::result::Result<Self::Output, Self::Error> {
        self.execute(input, Self::Params::default())
    }
}
