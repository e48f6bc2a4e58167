//! HAND-based flood extents
//!
//! A cell floods at water level `h` when its height above the nearest
//! drainage is below `h`. The mask is therefore monotone: raising the level
//! never un-floods a cell.

use crate::vector::vectorize_mask;
use hydrodem_core::{Error, Feature, GeoTransform, Raster, Result, CRS};
use tracing::{info, warn};

/// Flood mask for a water level in metres above the drainage.
///
/// `true` where `hand < water_level_m`; NoData cells (per `nodata_mask`)
/// and NaN HAND values never flood.
pub fn flood_mask(
    hand: &Raster<f32>,
    water_level_m: f64,
    nodata_mask: &Raster<bool>,
) -> Result<Raster<bool>> {
    if !water_level_m.is_finite() {
        return Err(Error::InvalidParameter {
            name: "water_level_m",
            value: water_level_m.to_string(),
            reason: "must be finite".into(),
        });
    }
    hand.ensure_same_shape(nodata_mask)?;

    let data = ndarray::Zip::from(hand.data())
        .and(nodata_mask.data())
        .map_collect(|&h, &nodata| !nodata && !h.is_nan() && (h as f64) < water_level_m);
    let mask = hand.with_data(data)?;

    let valid = nodata_mask.data().iter().filter(|&&nd| !nd).count();
    let flooded = mask.count_true();
    let percentage = if valid > 0 {
        flooded as f64 / valid as f64 * 100.0
    } else {
        0.0
    };
    info!(water_level_m, flooded, percentage, "flood mask computed");

    Ok(mask)
}

/// Vectorize a flood mask into a feature.
///
/// The feature carries `area_km2`, `area_m2`, `num_cells` and `crs`. An
/// empty mask yields a feature with no geometry and zero areas.
pub fn flood_polygon(
    mask: &Raster<bool>,
    transform: &GeoTransform,
    crs: &CRS,
    simplify_tolerance: f64,
) -> Result<Feature> {
    let polygon = vectorize_mask(mask, transform, crs, simplify_tolerance)?;

    if polygon.geometry.is_none() {
        warn!("flood mask is empty, no polygon produced");
    } else {
        info!(
            area_km2 = polygon.area_m2 / 1e6,
            num_cells = polygon.num_cells,
            "flood polygon created"
        );
    }

    Ok(polygon.into_feature(crs))
}
