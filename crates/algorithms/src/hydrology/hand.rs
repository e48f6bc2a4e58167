//! HAND: Height Above Nearest Drainage
//!
//! HAND is the elevation of a cell above the drainage cell its flow path
//! reaches first. It is 0 on channels and grows away from them, which makes
//! it a cheap proxy for flood depth.
//!
//! Rather than tracing every cell downstream, HAND is propagated upstream
//! from the drainage cells in one FIFO sweep over the shared [`FlowGraph`]:
//!
//! ```text
//! hand[u] = max(0, z[u] - z[d] + hand[d])    for every u draining into d
//! ```
//!
//! Reference:
//! Nobre, A.D. et al. (2011). HAND, a new terrain descriptor using
//! SRTM-DEM. *Mapping Ecology and Conservation*, 275–287.

use super::flow_graph::FlowGraph;
use hydrodem_core::{Error, Raster, Result};
use std::collections::VecDeque;
use tracing::{info, warn};

/// Channel HAND above this value is reported as suspicious
const CHANNEL_TOLERANCE: f64 = 1e-6;

/// Compute HAND for every valid cell.
///
/// Seeds (HAND 0) are the channel cells plus every terminal cell of the
/// graph: outlets and cells draining off the grid or into NoData. Terminal
/// cells are included so basins without a channel still get values. NoData
/// cells are NaN, which is also the output's NoData value.
///
/// # Arguments
/// * `dem` - Conditioned DEM the flow graph was derived from
/// * `graph` - Shared D8 flow graph
/// * `channel_mask` - Channel cells (`true`)
///
/// # Errors
///
/// [`Error::UnprocessedCells`] if the sweep did not reach every valid cell.
pub fn compute_hand(
    dem: &Raster<f64>,
    graph: &FlowGraph,
    channel_mask: &Raster<bool>,
) -> Result<Raster<f32>> {
    dem.ensure_same_shape(channel_mask)?;
    if dem.shape() != graph.shape() {
        let (er, ec) = graph.shape();
        let (ar, ac) = dem.shape();
        return Err(Error::SizeMismatch { er, ec, ar, ac });
    }

    let z = dem.data();
    let cols = graph.cols();
    let elev = |idx: usize| z[(idx / cols, idx % cols)];

    let n = graph.len();
    let mut hand = vec![f64::NAN; n];
    let mut visited = vec![false; n];
    let mut queue = VecDeque::new();

    for ((row, col), &is_channel) in channel_mask.data().indexed_iter() {
        let idx = graph.index(row, col);
        if graph.is_valid(idx) && (is_channel || graph.is_terminal(idx)) {
            hand[idx] = 0.0;
            visited[idx] = true;
            queue.push_back(idx);
        }
    }

    let mut processed = 0usize;
    while let Some(idx) = queue.pop_front() {
        processed += 1;
        let base = elev(idx);
        let base_hand = hand[idx];

        for &up in graph.upstream(idx) {
            let up = up as usize;
            if visited[up] {
                continue;
            }
            visited[up] = true;
            hand[up] = (elev(up) - base + base_hand).max(0.0);
            queue.push_back(up);
        }
    }

    if processed != graph.valid_count() {
        warn!(
            processed,
            valid = graph.valid_count(),
            "HAND sweep left cells unprocessed"
        );
        return Err(Error::UnprocessedCells {
            stage: "hand",
            processed,
            valid: graph.valid_count(),
        });
    }

    let max_channel_hand = channel_mask
        .data()
        .iter()
        .zip(hand.iter())
        .filter(|(&c, h)| c && !h.is_nan())
        .map(|(_, &h)| h)
        .fold(0.0_f64, f64::max);
    if max_channel_hand > CHANNEL_TOLERANCE {
        warn!(max_channel_hand, "channel cells have non-zero HAND");
    }

    let (min, max, sum) = hand
        .iter()
        .filter(|h| !h.is_nan())
        .fold((f64::INFINITY, f64::NEG_INFINITY, 0.0), |(lo, hi, s), &h| {
            (lo.min(h), hi.max(h), s + h)
        });
    if processed > 0 {
        info!(
            min,
            max,
            mean = sum / processed as f64,
            cells_processed = processed,
            "HAND computed"
        );
    }

    let mut output = graph.raster_from(hand.into_iter().map(|h| h as f32).collect())?;
    output.set_nodata(Some(f32::NAN));
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hydrology::channels::extract_channel_mask;
    use crate::hydrology::flow_accumulation::compute_flow_accumulation;
    use crate::hydrology::flow_direction::compute_flow_direction;
    use approx::assert_relative_eq;
    use hydrodem_core::GeoTransform;

    /// V-shaped valley: elevation = |col - center|, sloping south
    fn v_valley() -> Raster<f64> {
        let rows = 10;
        let cols = 11;
        let mut dem = Raster::new(rows, cols);
        dem.set_transform(GeoTransform::new(0.0, rows as f64, 1.0, -1.0));
        for row in 0..rows {
            for col in 0..cols {
                let cross = (col as f64 - 5.0).abs();
                let along = (rows - 1 - row) as f64 * 0.1;
                dem.set(row, col, cross + along).unwrap();
            }
        }
        dem
    }

    fn hand_for(dem: &Raster<f64>, threshold: u32) -> (Raster<bool>, Raster<f32>) {
        let fdir = compute_flow_direction(dem, 1.0).unwrap();
        let graph = FlowGraph::build(&fdir, &dem.nodata_mask()).unwrap();
        let acc = compute_flow_accumulation(&graph).unwrap();
        let channels = extract_channel_mask(&acc, threshold).unwrap();
        let hand = compute_hand(dem, &graph, &channels).unwrap();
        (channels, hand)
    }

    #[test]
    fn test_channel_cells_are_zero() {
        let dem = v_valley();
        let (channels, hand) = hand_for(&dem, 6);

        assert!(channels.any());
        for (&c, &h) in channels.data().iter().zip(hand.data().iter()) {
            if c {
                assert_eq!(h, 0.0);
            }
        }
    }

    #[test]
    fn test_hand_increases_away_from_valley() {
        let dem = v_valley();
        let (_, hand) = hand_for(&dem, 6);

        // side cells flow straight east into the valley column, which is
        // the only channel at this threshold
        let near = hand.get(5, 4).unwrap();
        let far = hand.get(5, 1).unwrap();
        assert_relative_eq!(near, 1.0, epsilon = 1e-5);
        assert!(far > near);
        assert!(hand.data().iter().all(|&h| h >= 0.0));
    }

    #[test]
    fn test_no_channels_falls_back_to_outlets() {
        let dem = v_valley();
        let (channels, hand) = hand_for(&dem, 10_000);

        assert!(!channels.any());
        assert!(hand.data().iter().all(|h| !h.is_nan() && *h >= 0.0));
        // the valley mouth drains off the grid and is a seed
        assert_eq!(hand.get(9, 5).unwrap(), 0.0);
    }

    #[test]
    fn test_nodata_is_nan() {
        let mut dem = v_valley();
        dem.set(0, 0, -9999.0).unwrap();
        dem.set_nodata(Some(-9999.0));
        let (_, hand) = hand_for(&dem, 6);

        assert!(hand.get(0, 0).unwrap().is_nan());
        assert!(hand.nodata().is_some_and(|nd| nd.is_nan()));
    }

    #[test]
    fn test_hand_is_clamped_at_zero() {
        // upstream cell lower than its downstream cell (only possible
        // on an unconditioned grid)
        let dem = Raster::from_vec(vec![0.0, 5.0, 4.0], 1, 3).unwrap();
        let fdir = Raster::from_vec(vec![1u8, 1, 0], 1, 3).unwrap();
        let graph = FlowGraph::build(&fdir, &dem.nodata_mask()).unwrap();
        let channels = dem.map(|_| false);

        let hand = compute_hand(&dem, &graph, &channels).unwrap();
        assert_eq!(hand.get(0, 2).unwrap(), 0.0);
        assert_eq!(hand.get(0, 1).unwrap(), 1.0);
        assert_eq!(hand.get(0, 0).unwrap(), 0.0);
    }

    #[test]
    fn test_cycle_is_reported() {
        // the channel cell drains into a two-cell loop that never reaches it
        let fdir = Raster::from_vec(vec![1u8, 16, 16], 1, 3).unwrap();
        let graph = FlowGraph::build(&fdir, &fdir.map(|_| false)).unwrap();
        let dem = Raster::from_vec(vec![1.0, 1.0, 2.0], 1, 3).unwrap();
        let channels = Raster::from_vec(vec![false, false, true], 1, 3).unwrap();

        let err = compute_hand(&dem, &graph, &channels).unwrap_err();
        assert!(matches!(
            err,
            Error::UnprocessedCells {
                stage: "hand",
                processed: 1,
                valid: 3
            }
        ));
    }

    #[test]
    fn test_shape_mismatch() {
        let dem = v_valley();
        let fdir = compute_flow_direction(&dem, 1.0).unwrap();
        let graph = FlowGraph::build(&fdir, &dem.nodata_mask()).unwrap();
        let channels: Raster<bool> = Raster::new(3, 3);
        assert!(compute_hand(&dem, &graph, &channels).is_err());
    }
}
