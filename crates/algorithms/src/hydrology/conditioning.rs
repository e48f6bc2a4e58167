//! DEM conditioning: fill, resolve flats, validate
//!
//! A conditioned DEM has no interior pits and no perfectly flat cells, so
//! D8 routing can find a downslope neighbour almost everywhere. Conditioning
//! never lowers a cell and never turns a valid cell into NoData; the latter
//! is checked and treated as fatal.

use super::fill_depressions::{fill_depressions, FillParams, FillStats};
use super::flats::{resolve_flats, FlatParams, FlatStats};
use hydrodem_core::io::load_dem;
use hydrodem_core::{Algorithm, Error, Raster, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

/// Parameters for the full conditioning run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConditionParams {
    pub fill: FillParams,
    pub flats: FlatParams,
}

/// Combined statistics of a conditioning run
#[derive(Debug, Clone, Serialize)]
pub struct ConditioningMetadata {
    pub fill: FillStats,
    pub flats: FlatStats,
    pub original_valid: usize,
    pub conditioned_valid: usize,
    /// File the DEM was loaded from, when conditioned from disk
    pub source: Option<PathBuf>,
}

/// A conditioned DEM with the statistics of how it was produced
#[derive(Debug, Clone)]
pub struct ConditionedDem {
    pub dem: Raster<f64>,
    pub metadata: ConditioningMetadata,
}

/// Conditioning algorithm
#[derive(Debug, Clone, Default)]
pub struct Conditioner;

impl Algorithm for Conditioner {
    type Input = Raster<f64>;
    type Output = ConditionedDem;
    type Params = ConditionParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "DEM Conditioning"
    }

    fn description(&self) -> &'static str {
        "Fill depressions and resolve flats for D8 routing"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        condition_dem(&input, params)
    }
}

/// Condition an in-memory DEM.
///
/// # Errors
///
/// - [`Error::MissingCrs`] if the raster carries no CRS
/// - [`Error::NoDataCreated`] if conditioning reduced the valid cell count
pub fn condition_dem(dem: &Raster<f64>, params: ConditionParams) -> Result<ConditionedDem> {
    if dem.crs().is_none() {
        return Err(Error::MissingCrs);
    }

    let original_valid = dem.count_valid();
    let (filled, fill) = fill_depressions(dem, params.fill)?;
    let (resolved, flats) = resolve_flats(&filled, params.flats)?;

    let conditioned_valid = resolved.count_valid();
    if conditioned_valid < original_valid {
        return Err(Error::NoDataCreated {
            original_valid,
            conditioned_valid,
        });
    }

    info!(
        pits_filled = fill.pits_filled,
        flats_resolved = flats.flats_resolved,
        valid_cells = conditioned_valid,
        "DEM conditioned"
    );

    Ok(ConditionedDem {
        dem: resolved,
        metadata: ConditioningMetadata {
            fill,
            flats,
            original_valid,
            conditioned_valid,
            source: None,
        },
    })
}

/// Load a GeoTIFF DEM and condition it.
///
/// Missing files fail with [`Error::NotFound`] before any work is done.
pub fn condition_dem_file(path: impl AsRef<Path>, params: ConditionParams) -> Result<ConditionedDem> {
    let path = path.as_ref();
    let dem = load_dem(path)?;
    let mut conditioned = condition_dem(&dem, params)?;
    conditioned.metadata.source = Some(path.to_path_buf());
    Ok(conditioned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hydrodem_core::io::write_geotiff;
    use hydrodem_core::{GeoTransform, CRS};
    use tempfile::tempdir;

    fn bowl_with_pit() -> Raster<f64> {
        let mut dem = Raster::from_vec(
            (0..49)
                .map(|i| {
                    let (r, c) = ((i / 7) as f64 - 3.0, (i % 7) as f64 - 3.0);
                    10.0 + r.abs().max(c.abs())
                })
                .collect(),
            7,
            7,
        )
        .unwrap();
        dem.set(3, 3, 2.0).unwrap();
        dem.set_transform(GeoTransform::new(500_000.0, 4_000_070.0, 10.0, -10.0));
        dem.set_crs(Some(CRS::from_epsg(32633)));
        dem
    }

    #[test]
    fn test_condition_never_lowers() {
        let dem = bowl_with_pit();
        let conditioned = condition_dem(&dem, ConditionParams::default()).unwrap();

        for (a, b) in dem.data().iter().zip(conditioned.dem.data().iter()) {
            assert!(b >= a);
        }
        assert_eq!(conditioned.metadata.fill.pits_filled, 1);
        assert_eq!(
            conditioned.metadata.original_valid,
            conditioned.metadata.conditioned_valid
        );
        assert!(conditioned.metadata.source.is_none());
    }

    #[test]
    fn test_missing_crs_is_fatal() {
        let mut dem = bowl_with_pit();
        dem.set_crs(None);
        assert!(matches!(
            condition_dem(&dem, ConditionParams::default()),
            Err(Error::MissingCrs)
        ));
    }

    #[test]
    fn test_nodata_preserved() {
        let mut dem = bowl_with_pit();
        dem.set(0, 0, -9999.0).unwrap();
        dem.set_nodata(Some(-9999.0));
        let conditioned = condition_dem(&dem, ConditionParams::default()).unwrap();
        assert_eq!(conditioned.dem.get(0, 0).unwrap(), -9999.0);
        assert_eq!(conditioned.metadata.conditioned_valid, 48);
    }

    #[test]
    fn test_condition_dem_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("dem.tif");
        write_geotiff(&bowl_with_pit(), &path, None).unwrap();

        let conditioned = condition_dem_file(&path, ConditionParams::default()).unwrap();
        assert_eq!(conditioned.metadata.source.as_deref(), Some(path.as_path()));
        // filled to the ring, then lifted by the flat gradient
        let centre = conditioned.dem.get(3, 3).unwrap();
        assert!(centre > 11.0 && centre <= 11.0 + 1e-4 + 1e-9);
    }

    #[test]
    fn test_condition_dem_file_not_found() {
        let dir = tempdir().unwrap();
        let result = condition_dem_file(dir.path().join("missing.tif"), ConditionParams::default());
        assert!(matches!(result, Err(Error::NotFound(_))));
    }
}
