//! Catchment delineation from a pour point
//!
//! A geographic pour point is first snapped to the highest-accumulation
//! cell nearby, so that a point dropped beside a river lands on it. The
//! catchment is then every cell whose flow path passes through the snapped
//! cell, collected by a FIFO sweep up the shared [`FlowGraph`].

use super::flow_graph::FlowGraph;
use crate::vector::vectorize_mask;
use hydrodem_core::{AttributeValue, Error, Feature, GeoTransform, Raster, Result, CRS};
use std::collections::VecDeque;
use tracing::{info, warn};

/// Default snapping window radius in cells
pub const DEFAULT_SEARCH_RADIUS: usize = 5;

/// A snapped pour point
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PourPoint {
    pub row: usize,
    pub col: usize,
    /// Requested latitude
    pub lat: f64,
    /// Requested longitude
    pub lon: f64,
    /// Euclidean distance in cells from the requested cell
    pub snap_distance: f64,
}

impl PourPoint {
    /// `(row, col)` of the snapped cell
    pub fn index(&self) -> (usize, usize) {
        (self.row, self.col)
    }
}

/// Snap `(lat, lon)` to the maximum-accumulation cell within
/// `search_radius` cells.
///
/// The window is clipped to the grid, so a point just outside the grid
/// still snaps to the nearest edge cells. Ties go to the first cell in
/// row-major order.
///
/// # Errors
///
/// - [`Error::InvalidParameter`] for non-finite coordinates or a transform
///   that cannot locate them
/// - [`Error::PourPointOutOfBounds`] when the window does not overlap the grid
pub fn snap_pour_point(
    lat: f64,
    lon: f64,
    acc: &Raster<u32>,
    transform: &GeoTransform,
    search_radius: usize,
) -> Result<PourPoint> {
    if !lat.is_finite() || !lon.is_finite() {
        return Err(Error::InvalidParameter {
            name: "pour_point",
            value: format!("({}, {})", lat, lon),
            reason: "coordinates must be finite".into(),
        });
    }
    let (px, py) = transform.geo_to_pixel(lon, lat);
    if px.is_nan() || py.is_nan() {
        return Err(Error::InvalidParameter {
            name: "transform",
            value: format!("{:?}", transform),
            reason: "cannot map coordinates to pixels".into(),
        });
    }

    let (rows, cols) = acc.shape();
    // indices of points far off the grid saturate at the i64 range
    let (row, col) = transform.geo_to_index(lon, lat);
    let radius = i64::try_from(search_radius).unwrap_or(i64::MAX);

    let r_min = row.saturating_sub(radius).max(0);
    let r_max = row.saturating_add(radius).saturating_add(1).min(rows as i64);
    let c_min = col.saturating_sub(radius).max(0);
    let c_max = col.saturating_add(radius).saturating_add(1).min(cols as i64);
    if r_min >= r_max || c_min >= c_max {
        return Err(Error::PourPointOutOfBounds {
            row,
            col,
            rows,
            cols,
        });
    }

    let mut best = (r_min as usize, c_min as usize);
    let mut best_acc = acc.data()[best];
    for r in r_min as usize..r_max as usize {
        for c in c_min as usize..c_max as usize {
            let a = acc.data()[(r, c)];
            if a > best_acc {
                best_acc = a;
                best = (r, c);
            }
        }
    }

    let dr = best.0 as f64 - row as f64;
    let dc = best.1 as f64 - col as f64;
    let snap_distance = (dr * dr + dc * dc).sqrt();

    info!(
        lat,
        lon,
        row = best.0,
        col = best.1,
        accumulation = best_acc,
        snap_distance,
        "pour point snapped"
    );

    Ok(PourPoint {
        row: best.0,
        col: best.1,
        lat,
        lon,
        snap_distance,
    })
}

/// Delineate the catchment draining through `pour_point` (row, col).
///
/// # Errors
///
/// - [`Error::PourPointOutOfBounds`] for a cell outside the grid
/// - [`Error::PourPointOnNoData`] for a NoData cell
pub fn delineate_catchment(pour_point: (usize, usize), graph: &FlowGraph) -> Result<Raster<bool>> {
    let (row, col) = pour_point;
    let (rows, cols) = graph.shape();
    if row >= rows || col >= cols {
        return Err(Error::PourPointOutOfBounds {
            row: row as i64,
            col: col as i64,
            rows,
            cols,
        });
    }

    let start = graph.index(row, col);
    if !graph.is_valid(start) {
        return Err(Error::PourPointOnNoData { row, col });
    }

    let mut visited = vec![false; graph.len()];
    let mut queue = VecDeque::new();
    visited[start] = true;
    queue.push_back(start);

    let mut num_cells = 0usize;
    while let Some(idx) = queue.pop_front() {
        num_cells += 1;
        for &up in graph.upstream(idx) {
            let up = up as usize;
            if !visited[up] {
                visited[up] = true;
                queue.push_back(up);
            }
        }
    }

    info!(row, col, num_cells, "catchment delineated");
    graph.raster_from(visited)
}

/// Vectorize a catchment mask.
///
/// Properties match the flood polygon (`area_km2`, `area_m2`, `num_cells`,
/// `crs`), plus `area_deg2` for geographic CRS. The outline is not
/// simplified, so the area is exactly the cell count times the cell area.
/// Returns `None` for an empty mask.
pub fn catchment_to_polygon(
    mask: &Raster<bool>,
    transform: &GeoTransform,
    crs: &CRS,
) -> Result<Option<Feature>> {
    let polygon = vectorize_mask(mask, transform, crs, 0.0)?;
    if polygon.geometry.is_none() {
        warn!("catchment mask is empty, no polygon produced");
        return Ok(None);
    }

    let area_deg2 = crs.is_geographic().then_some(polygon.area_crs);
    info!(
        num_cells = polygon.num_cells,
        area_km2 = polygon.area_m2 / 1e6,
        "catchment polygon created"
    );

    let mut feature = polygon.into_feature(crs);
    if let Some(area_deg2) = area_deg2 {
        feature.set_property("area_deg2", AttributeValue::Float(area_deg2));
    }
    Ok(Some(feature))
}
