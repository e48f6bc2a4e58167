//! Depression filling
//!
//! The default method is an iterative relaxation: each pass finds interior
//! pits (cells strictly lower than all eight neighbours) and raises them to
//! their lowest neighbour. Passes repeat until no pit remains or the
//! iteration cap is reached. Multi-cell depressions and wide plateaus can
//! need many passes, so convergence within the cap is reported rather than
//! assumed.
//!
//! [`FillMethod::PriorityFlood`] swaps in the single-pass min-heap fill from
//! [`priority_flood`](super::priority_flood), which always converges.

use super::priority_flood::priority_flood;
use hydrodem_core::raster::d8;
use hydrodem_core::{Algorithm, Error, Raster, RasterElement, Result};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Depression filling method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FillMethod {
    /// Iteration-capped pit relaxation
    #[default]
    Iterative,
    /// Priority-Flood (Barnes et al. 2014)
    PriorityFlood,
}

/// Parameters for depression filling
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FillParams {
    pub method: FillMethod,
    /// Pass limit for the iterative method
    pub max_iterations: usize,
    /// Percentage of modified valid cells above which the fill is flagged
    pub excessive_fill_pct: f64,
    /// Minimum rise per step for Priority-Flood; 0 leaves filled areas flat
    pub epsilon: f64,
}

impl Default for FillParams {
    fn default() -> Self {
        Self {
            method: FillMethod::Iterative,
            max_iterations: 100,
            excessive_fill_pct: 10.0,
            epsilon: 0.0,
        }
    }
}

/// Statistics of a fill run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FillStats {
    /// Valid cells whose elevation was raised
    pub pits_filled: usize,
    pub mean_fill_depth: f64,
    pub max_fill_depth: f64,
    /// Passes that raised at least one cell (1 for Priority-Flood). The
    /// closing pit-free check is not counted, so a DEM without pits
    /// reports 0.
    pub iterations: usize,
    /// Whether the surface was pit-free when filling stopped
    pub converged: bool,
    /// `pits_filled` as a percentage of valid cells
    pub fill_percentage: f64,
    /// `fill_percentage` exceeded the configured limit
    pub excessive: bool,
}

/// Depression filling algorithm
#[derive(Debug, Clone, Default)]
pub struct FillDepressions;

impl Algorithm for FillDepressions {
    type Input = Raster<f64>;
    type Output = (Raster<f64>, FillStats);
    type Params = FillParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "Fill Depressions"
    }

    fn description(&self) -> &'static str {
        "Raise interior pits so every valid cell can drain"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        fill_depressions(&input, params)
    }
}

/// Fill depressions in a DEM.
///
/// Never lowers a cell and never touches NoData cells. Quality problems
/// (more than `excessive_fill_pct` of valid cells raised, or the iteration
/// cap reached with pits left) are logged as warnings and reported in the
/// returned [`FillStats`]; they are not errors.
pub fn fill_depressions(dem: &Raster<f64>, params: FillParams) -> Result<(Raster<f64>, FillStats)> {
    if dem.is_empty() {
        return Err(Error::InvalidDimensions {
            width: dem.cols(),
            height: dem.rows(),
        });
    }

    let valid = dem.nodata_mask().into_array().mapv(|nd| !nd);

    let (filled, iterations, converged) = match params.method {
        FillMethod::Iterative => {
            if params.max_iterations == 0 {
                return Err(Error::InvalidParameter {
                    name: "max_iterations",
                    value: "0".into(),
                    reason: "at least one pass is required".into(),
                });
            }
            fill_iterative(dem.data(), &valid, params.max_iterations)
        }
        FillMethod::PriorityFlood => {
            if !(params.epsilon.is_finite() && params.epsilon >= 0.0) {
                return Err(Error::InvalidParameter {
                    name: "epsilon",
                    value: params.epsilon.to_string(),
                    reason: "must be finite and non-negative".into(),
                });
            }
            (priority_flood(dem.data(), &valid, params.epsilon), 1, true)
        }
    };

    let stats = fill_stats(dem.data(), &filled, &valid, iterations, converged, &params);

    info!(
        method = ?params.method,
        pits_filled = stats.pits_filled,
        mean_fill_depth = stats.mean_fill_depth,
        max_fill_depth = stats.max_fill_depth,
        iterations = stats.iterations,
        converged = stats.converged,
        "depressions filled"
    );
    if stats.excessive {
        warn!(
            percentage = stats.fill_percentage,
            limit = params.excessive_fill_pct,
            "excessive pit filling, DEM quality may be poor"
        );
    }
    if !stats.converged {
        warn!(
            iterations = stats.iterations,
            "pit filling stopped at the iteration cap with pits remaining"
        );
    }

    let mut output = dem.like(0.0);
    *output.data_mut() = filled;
    Ok((output, stats))
}

/// Interior pits of `z` with the level they should be raised to.
///
/// Grid-boundary cells and cells next to NoData are never pits: they can
/// drain off the grid or into the NoData region.
fn find_pits(z: &Array2<f64>, valid: &Array2<bool>) -> Vec<(usize, usize, f64)> {
    let (rows, cols) = z.dim();
    let mut pits = Vec::new();

    for row in 1..rows.saturating_sub(1) {
        'cell: for col in 1..cols.saturating_sub(1) {
            if !valid[(row, col)] {
                continue;
            }
            let mut lowest = f64::INFINITY;
            for (_, r, c) in d8::neighbors(row, col, rows, cols) {
                if !valid[(r, c)] {
                    continue 'cell;
                }
                lowest = lowest.min(z[(r, c)]);
            }
            if z[(row, col)] < lowest {
                pits.push((row, col, lowest));
            }
        }
    }

    pits
}

fn fill_iterative(
    dem: &Array2<f64>,
    valid: &Array2<bool>,
    max_iterations: usize,
) -> (Array2<f64>, usize, bool) {
    let mut z = dem.clone();
    let mut iterations = 0;
    let mut converged = false;

    while iterations < max_iterations {
        let pits = find_pits(&z, valid);
        if pits.is_empty() {
            converged = true;
            break;
        }
        for &(row, col, level) in &pits {
            z[(row, col)] = level;
        }
        iterations += 1;
        debug!(iteration = iterations, pits = pits.len(), "raised pits");
    }

    if !converged {
        converged = find_pits(&z, valid).is_empty();
    }

    (z, iterations, converged)
}

fn fill_stats(
    original: &Array2<f64>,
    filled: &Array2<f64>,
    valid: &Array2<bool>,
    iterations: usize,
    converged: bool,
    params: &FillParams,
) -> FillStats {
    let mut pits_filled = 0usize;
    let mut total_depth = 0.0;
    let mut max_fill_depth = 0.0_f64;
    let mut valid_cells = 0usize;

    for ((&before, &after), &ok) in original.iter().zip(filled.iter()).zip(valid.iter()) {
        if !ok {
            continue;
        }
        valid_cells += 1;
        let depth = after - before;
        if depth > 0.0 {
            pits_filled += 1;
            total_depth += depth;
            max_fill_depth = max_fill_depth.max(depth);
        }
    }

    let mean_fill_depth = if pits_filled > 0 {
        total_depth / pits_filled as f64
    } else {
        0.0
    };
    let fill_percentage = if valid_cells > 0 {
        pits_filled as f64 / valid_cells as f64 * 100.0
    } else {
        0.0
    };

    FillStats {
        pits_filled,
        mean_fill_depth,
        max_fill_depth,
        iterations,
        converged,
        fill_percentage,
        excessive: fill_percentage > params.excessive_fill_pct,
    }
}

/// Whether `z` has an interior pit, honouring the raster's NoData value
pub fn has_pits(dem: &Raster<f64>) -> bool {
    let nodata = dem.nodata();
    let valid = dem.data().mapv(|v| !v.is_nodata(nodata));
    !find_pits(dem.data(), &valid).is_empty()
}
