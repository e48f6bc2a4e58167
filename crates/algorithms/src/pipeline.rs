//! End-to-end hydrology pipeline
//!
//! Runs every stage on one DEM with a single [`PipelineConfig`]:
//! conditioning, D8 routing, channels, HAND, flood extents for each
//! configured water level and, when a pour point is given, its catchment.
//! The flow graph is built once and shared by accumulation, HAND and the
//! catchment sweep.

use crate::hydrology::{
    catchment_to_polygon, compute_flow_accumulation, compute_flow_direction, compute_hand,
    condition_dem, delineate_catchment, extract_channel_mask, flood_mask, flood_polygon,
    snap_pour_point, ConditionParams, ConditionedDem, FlowGraph, PourPoint, DEFAULT_SEARCH_RADIUS,
};
use crate::vector::cell_size_meters;
use hydrodem_core::{Error, Feature, GeoTransform, Raster, Result, CRS};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Geographic location of a pour point
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLon {
    pub lat: f64,
    pub lon: f64,
}

/// Parameters for [`run_pipeline`]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub condition: ConditionParams,
    /// Minimum accumulation (cells) of a channel cell
    pub channel_threshold: u32,
    /// Cell size in metres; derived from the transform and CRS when unset
    pub cell_size: Option<f64>,
    /// Water levels (m above drainage) to map flood extents for
    pub water_levels: Vec<f64>,
    /// Polygon simplification tolerance in CRS units
    pub simplify_tolerance: f64,
    /// Pour-point snapping window radius in cells
    pub snap_radius: usize,
    pub pour_point: Option<LatLon>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            condition: ConditionParams::default(),
            channel_threshold: 1000,
            cell_size: None,
            water_levels: vec![1.0, 2.0, 5.0],
            simplify_tolerance: 1e-4,
            snap_radius: DEFAULT_SEARCH_RADIUS,
            pour_point: None,
        }
    }
}

/// Flood extent for one water level
#[derive(Debug, Clone)]
pub struct FloodExtent {
    pub water_level_m: f64,
    pub mask: Raster<bool>,
    pub feature: Feature,
}

/// Catchment of a snapped pour point
#[derive(Debug, Clone)]
pub struct CatchmentResult {
    pub pour_point: PourPoint,
    pub mask: Raster<bool>,
    /// `None` never happens for a valid pour point, whose catchment holds
    /// at least the pour point itself
    pub feature: Option<Feature>,
}

/// Every product of a pipeline run
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub conditioned: ConditionedDem,
    pub flow_direction: Raster<u8>,
    pub flow_accumulation: Raster<u32>,
    pub channel_mask: Raster<bool>,
    pub hand: Raster<f32>,
    pub floods: Vec<FloodExtent>,
    pub catchment: Option<CatchmentResult>,
}

/// Snap a pour point and delineate its catchment
pub fn catchment_from_point(
    point: LatLon,
    acc: &Raster<u32>,
    graph: &FlowGraph,
    transform: &GeoTransform,
    crs: &CRS,
    search_radius: usize,
) -> Result<CatchmentResult> {
    let pour_point = snap_pour_point(point.lat, point.lon, acc, transform, search_radius)?;
    let mask = delineate_catchment(pour_point.index(), graph)?;
    let feature = catchment_to_polygon(&mask, transform, crs)?;
    Ok(CatchmentResult {
        pour_point,
        mask,
        feature,
    })
}

/// Run the full pipeline on a raw DEM.
///
/// # Errors
///
/// Any stage error is returned unchanged; the DEM must carry a CRS.
pub fn run_pipeline(dem: &Raster<f64>, config: &PipelineConfig) -> Result<PipelineOutput> {
    let conditioned = condition_dem(dem, config.condition.clone())?;
    let surface = &conditioned.dem;
    let crs = surface.crs().cloned().ok_or(Error::MissingCrs)?;
    let transform = *surface.transform();

    let cell_size = config
        .cell_size
        .unwrap_or_else(|| cell_size_meters(&transform, Some(&crs)));
    let flow_direction = compute_flow_direction(surface, cell_size)?;

    let nodata_mask = surface.nodata_mask();
    let graph = FlowGraph::build(&flow_direction, &nodata_mask)?;
    let flow_accumulation = compute_flow_accumulation(&graph)?;
    let channel_mask = extract_channel_mask(&flow_accumulation, config.channel_threshold)?;
    let hand = compute_hand(surface, &graph, &channel_mask)?;

    let floods = config
        .water_levels
        .iter()
        .map(|&water_level_m| {
            let mask = flood_mask(&hand, water_level_m, &nodata_mask)?;
            let feature = flood_polygon(&mask, &transform, &crs, config.simplify_tolerance)?;
            Ok(FloodExtent {
                water_level_m,
                mask,
                feature,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let catchment = config
        .pour_point
        .map(|point| {
            catchment_from_point(
                point,
                &flow_accumulation,
                &graph,
                &transform,
                &crs,
                config.snap_radius,
            )
        })
        .transpose()?;

    info!(
        channels = channel_mask.count_true(),
        flood_levels = floods.len(),
        catchment = catchment.is_some(),
        "pipeline finished"
    );

    Ok(PipelineOutput {
        conditioned,
        flow_direction,
        flow_accumulation,
        channel_mask,
        hand,
        floods,
        catchment,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valley_dem() -> Raster<f64> {
        let mut dem = Raster::from_vec(
            (0..100)
                .map(|i| {
                    let (r, c) = ((i / 10) as f64, (i % 10) as f64);
                    (c - 5.0).abs() * 2.0 + (9.0 - r) * 0.5 + 100.0
                })
                .collect(),
            10,
            10,
        )
        .unwrap();
        dem.set_transform(GeoTransform::new(600_000.0, 5_000_300.0, 30.0, -30.0));
        dem.set_crs(Some(CRS::from_epsg(32618)));
        dem
    }

    #[test]
    fn test_default_config() {
        let config = PipelineConfig::default();
        assert_eq!(config.channel_threshold, 1000);
        assert_eq!(config.snap_radius, 5);
        assert!(config.pour_point.is_none());
    }

    #[test]
    fn test_pipeline_products_share_shape() {
        let config = PipelineConfig {
            channel_threshold: 5,
            water_levels: vec![0.5, 3.0],
            ..PipelineConfig::default()
        };
        let output = run_pipeline(&valley_dem(), &config).unwrap();

        assert_eq!(output.flow_direction.shape(), (10, 10));
        assert_eq!(output.hand.shape(), (10, 10));
        assert!(output.channel_mask.any());
        assert_eq!(output.floods.len(), 2);
        assert!(output.floods[0].mask.count_true() <= output.floods[1].mask.count_true());
        assert!(output.catchment.is_none());
    }

    #[test]
    fn test_non_finite_water_level_rejected() {
        for level in [f64::NAN, f64::INFINITY] {
            let config = PipelineConfig {
                channel_threshold: 5,
                water_levels: vec![1.0, level],
                ..PipelineConfig::default()
            };
            let err = run_pipeline(&valley_dem(), &config).unwrap_err();
            assert!(matches!(
                err,
                Error::InvalidParameter {
                    name: "water_level_m",
                    ..
                }
            ));
        }
    }

    #[test]
    fn test_pipeline_with_pour_point() {
        let dem = valley_dem();
        // centre of the valley mouth cell (9, 5)
        let (x, y) = dem.transform().pixel_to_geo(5, 9);
        let config = PipelineConfig {
            channel_threshold: 5,
            water_levels: vec![],
            pour_point: Some(LatLon { lat: y, lon: x }),
            ..PipelineConfig::default()
        };
        let output = run_pipeline(&dem, &config).unwrap();
        let catchment = output.catchment.unwrap();

        assert_eq!(catchment.pour_point.index(), (9, 5));
        assert_eq!(catchment.mask.count_true(), 100);
        assert!(catchment.feature.is_some());
    }
}
