//! Vector products of the hydrology stages
//!
//! Boolean masks (flood extents, catchments) become GeoJSON-ready
//! features here:
//! - Polygonize: trace mask outlines into polygons with holes
//! - Simplify: topology-preserving Visvalingam-Whyatt
//! - Area: CRS-aware areas in square metres

mod measurements;
mod polygonize;
mod simplify;

pub use measurements::{area, area_m2, cell_size_meters, METERS_PER_DEGREE};
pub use polygonize::polygonize;
pub use simplify::simplify_preserve;

use geo::Geometry;
use hydrodem_core::{AttributeValue, Feature, GeoTransform, Raster, Result, CRS};

/// A vectorized mask before it is turned into a [`Feature`]
#[derive(Debug, Clone)]
pub struct MaskPolygon {
    /// Simplified outline, `None` for an empty mask
    pub geometry: Option<Geometry<f64>>,
    /// Number of `true` cells in the mask
    pub num_cells: usize,
    /// Area in CRS units squared
    pub area_crs: f64,
    /// Area in square metres
    pub area_m2: f64,
}

impl MaskPolygon {
    /// Feature carrying `area_km2`, `area_m2`, `num_cells` and `crs`
    pub fn into_feature(self, crs: &CRS) -> Feature {
        let mut feature = match self.geometry {
            Some(geometry) => Feature::new(geometry),
            None => Feature::empty(),
        };
        feature.set_property("area_km2", AttributeValue::Float(self.area_m2 / 1e6));
        feature.set_property("area_m2", AttributeValue::Float(self.area_m2));
        feature.set_property("num_cells", AttributeValue::Int(self.num_cells as i64));
        feature.set_property("crs", AttributeValue::String(crs.identifier()));
        feature
    }
}

/// Polygonize, simplify and measure a mask.
///
/// Areas are measured on the simplified geometry. An empty mask gives a
/// `None` geometry and zero areas.
pub fn vectorize_mask(
    mask: &Raster<bool>,
    transform: &GeoTransform,
    crs: &CRS,
    tolerance: f64,
) -> Result<MaskPolygon> {
    let num_cells = mask.count_true();
    let geometry = match polygonize(mask, transform) {
        Some(geom) => Some(simplify_preserve(&geom, tolerance)?),
        None => None,
    };

    let (area_crs, area_m2) = geometry
        .as_ref()
        .map_or((0.0, 0.0), |g| (area(g), area_m2(g, crs)));

    Ok(MaskPolygon {
        geometry,
        num_cells,
        area_crs,
        area_m2,
    })
}
