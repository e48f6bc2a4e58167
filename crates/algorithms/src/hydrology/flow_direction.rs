//! D8 flow direction
//!
//! Each valid cell drains to the neighbour with the steepest strictly
//! positive slope, using the ESRI codes from [`d8`]:
//! ```text
//!   32  64  128
//!   16   0    1
//!    8   4    2
//! ```
//! `0` marks an outlet (no downslope neighbour) or a NoData cell.
//!
//! Because only strictly positive slopes are accepted, every step of a flow
//! path strictly lowers elevation and the induced graph cannot contain a
//! cycle. Ties go to the first neighbour in N, NE, E, SE, S, SW, W, NW order.

use crate::maybe_rayon::map_rows;
use hydrodem_core::raster::d8;
use hydrodem_core::{Algorithm, Error, Raster, RasterElement, Result};
use ndarray::Array2;
use tracing::info;

/// Parameters for flow direction
#[derive(Debug, Clone, Default)]
pub struct FlowDirectionParams {
    /// Cell size in metres. `None` uses the raster's pixel width.
    pub cell_size: Option<f64>,
}

/// Flow direction algorithm (D8)
#[derive(Debug, Clone, Default)]
pub struct FlowDirection;

impl Algorithm for FlowDirection {
    type Input = Raster<f64>;
    type Output = Raster<u8>;
    type Params = FlowDirectionParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "Flow Direction (D8)"
    }

    fn description(&self) -> &'static str {
        "Steepest-descent D8 flow direction from a conditioned DEM"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        let cell_size = params.cell_size.unwrap_or_else(|| input.cell_size());
        compute_flow_direction(&input, cell_size)
    }
}

/// Compute D8 flow direction from a conditioned DEM.
///
/// `cell_size` scales the cardinal and diagonal distances; it must be
/// positive and finite.
pub fn compute_flow_direction(dem: &Raster<f64>, cell_size: f64) -> Result<Raster<u8>> {
    if !(cell_size.is_finite() && cell_size > 0.0) {
        return Err(Error::InvalidParameter {
            name: "cell_size",
            value: cell_size.to_string(),
            reason: "must be positive and finite".into(),
        });
    }

    let (rows, cols) = dem.shape();
    let nodata = dem.nodata();
    let elev = dem.data();
    let distances = d8::DISTANCES.map(|d| d * cell_size);

    let row_codes = map_rows(rows, |row| {
        let mut codes = vec![d8::OUTLET; cols];

        for (col, code) in codes.iter_mut().enumerate() {
            let center = elev[(row, col)];
            if center.is_nodata(nodata) {
                continue;
            }

            let mut max_slope = 0.0_f64;
            for (dir, r, c) in d8::neighbors(row, col, rows, cols) {
                let neighbor = elev[(r, c)];
                if neighbor.is_nodata(nodata) {
                    continue;
                }
                let slope = (center - neighbor) / distances[dir];
                if slope > max_slope {
                    max_slope = slope;
                    *code = d8::CODES[dir];
                }
            }
        }

        codes
    });

    let data: Vec<u8> = row_codes.into_iter().flatten().collect();
    let array = Array2::from_shape_vec((rows, cols), data).map_err(|e| Error::Other(e.to_string()))?;
    let output = dem.with_data(array)?;

    let nodata_cells = dem.count_nodata();
    let outlets = output
        .data()
        .iter()
        .filter(|&&c| c == d8::OUTLET)
        .count()
        - nodata_cells;
    info!(outlets, nodata_cells, cell_size, "flow direction computed");

    Ok(output)
}
