//! Flat resolution
//!
//! After filling, a DEM can contain plateaus where a cell and all eight of
//! its neighbours share the same elevation. D8 finds no positive slope there.
//! Each flat cell is raised by a small amount proportional to its distance
//! (Dijkstra, 8-connected, diagonal steps weighted by √2) from the nearest
//! non-flat cell, so water crosses the plateau towards its rim.

use hydrodem_core::raster::d8;
use hydrodem_core::{Error, Raster, RasterElement, Result};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use tracing::{info, warn};

/// Parameters for flat resolution
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FlatParams {
    /// Increment given to the flat cell farthest from the rim
    pub eps: f64,
}

impl Default for FlatParams {
    fn default() -> Self {
        Self { eps: 1e-4 }
    }
}

/// Statistics of a flat resolution run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FlatStats {
    pub flat_cells_before: usize,
    pub flat_cells_after: usize,
    pub flats_resolved: usize,
    /// Mean increment over all valid cells
    pub mean_gradient_added: f64,
    pub max_gradient_added: f64,
}

/// State in the priority queue (min-heap via reverse ordering)
#[derive(Debug, Clone, PartialEq)]
struct State {
    cost: f64,
    idx: usize,
}

impl Eq for State {}

impl PartialOrd for State {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for State {
    fn cmp(&self, other: &Self) -> Ordering {
        other.cost.total_cmp(&self.cost)
    }
}

/// Flat cells of `z`: interior valid cells whose eight neighbours are valid
/// and have exactly the same elevation.
fn detect_flats(z: &Array2<f64>, valid: &Array2<bool>) -> Array2<bool> {
    let (rows, cols) = z.dim();
    let mut flat = Array2::from_elem((rows, cols), false);

    for row in 1..rows.saturating_sub(1) {
        for col in 1..cols.saturating_sub(1) {
            if !valid[(row, col)] {
                continue;
            }
            let center = z[(row, col)];
            flat[(row, col)] = d8::neighbors(row, col, rows, cols)
                .all(|(_, r, c)| valid[(r, c)] && z[(r, c)] == center);
        }
    }

    flat
}

/// Number of flat cells in a DEM, honouring its NoData value
pub fn count_flats(dem: &Raster<f64>) -> usize {
    let nodata = dem.nodata();
    let valid = dem.data().mapv(|v| !v.is_nodata(nodata));
    detect_flats(dem.data(), &valid).iter().filter(|&&f| f).count()
}

/// Distance from every flat cell to the nearest valid non-flat cell.
///
/// Non-flat and invalid cells hold 0 and `INFINITY` respectively.
fn distance_to_rim(flat: &Array2<bool>, valid: &Array2<bool>) -> Vec<f64> {
    let (rows, cols) = flat.dim();
    let mut dist = vec![f64::INFINITY; rows * cols];
    let mut heap = BinaryHeap::new();

    for ((row, col), &is_flat) in flat.indexed_iter() {
        if valid[(row, col)] && !is_flat {
            let idx = row * cols + col;
            dist[idx] = 0.0;
            heap.push(State { cost: 0.0, idx });
        }
    }

    while let Some(State { cost, idx }) = heap.pop() {
        if cost > dist[idx] {
            continue;
        }
        let (row, col) = (idx / cols, idx % cols);
        for (dir, r, c) in d8::neighbors(row, col, rows, cols) {
            if !flat[(r, c)] {
                continue;
            }
            let next = r * cols + c;
            let next_cost = cost + d8::DISTANCES[dir];
            if next_cost < dist[next] {
                dist[next] = next_cost;
                heap.push(State {
                    cost: next_cost,
                    idx: next,
                });
            }
        }
    }

    dist
}

/// Resolve flats by imposing a gradient of at most `eps`.
///
/// Flat cell `c` gets `eps * d(c) / d_max` added, where `d` is its distance
/// to the nearest non-flat cell and `d_max` the largest such distance. Only
/// flat cells change; NoData stays NoData. A DEM without flats is returned
/// unchanged.
pub fn resolve_flats(dem: &Raster<f64>, params: FlatParams) -> Result<(Raster<f64>, FlatStats)> {
    if !(params.eps.is_finite() && params.eps >= 0.0) {
        return Err(Error::InvalidParameter {
            name: "eps",
            value: params.eps.to_string(),
            reason: "must be finite and non-negative".into(),
        });
    }

    let (rows, cols) = dem.shape();
    let valid = dem.nodata_mask().into_array().mapv(|nd| !nd);
    let flat = detect_flats(dem.data(), &valid);
    let flat_cells_before = flat.iter().filter(|&&f| f).count();

    let mut resolved = dem.clone();
    if flat_cells_before > 0 && params.eps > 0.0 {
        let dist = distance_to_rim(&flat, &valid);
        let d_max = flat
            .iter()
            .zip(dist.iter())
            .filter(|(&f, d)| f && d.is_finite())
            .map(|(_, &d)| d)
            .fold(0.0_f64, f64::max);

        if d_max > 0.0 {
            let z = resolved.data_mut();
            for ((row, col), &is_flat) in flat.indexed_iter() {
                let d = dist[row * cols + col];
                if is_flat && d.is_finite() {
                    z[(row, col)] += params.eps * d / d_max;
                }
            }
        }
    }

    let flat_cells_after = detect_flats(resolved.data(), &valid)
        .iter()
        .filter(|&&f| f)
        .count();

    let mut total = 0.0;
    let mut max_gradient_added = 0.0_f64;
    let mut valid_cells = 0usize;
    for ((&before, &after), &ok) in dem
        .data()
        .iter()
        .zip(resolved.data().iter())
        .zip(valid.iter())
    {
        if ok {
            let added = (after - before).abs();
            total += added;
            max_gradient_added = max_gradient_added.max(added);
            valid_cells += 1;
        }
    }

    let stats = FlatStats {
        flat_cells_before,
        flat_cells_after,
        flats_resolved: flat_cells_before.saturating_sub(flat_cells_after),
        mean_gradient_added: if valid_cells > 0 {
            total / valid_cells as f64
        } else {
            0.0
        },
        max_gradient_added,
    };

    info!(
        flat_cells_before = stats.flat_cells_before,
        flat_cells_after = stats.flat_cells_after,
        max_gradient_added = stats.max_gradient_added,
        rows,
        cols,
        "flats resolved"
    );
    if stats.flat_cells_after > 0 {
        warn!(remaining = stats.flat_cells_after, "flat cells remain after resolution");
    }

    Ok((resolved, stats))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hydrology::flow_direction::compute_flow_direction;
    use approx::assert_relative_eq;

    #[test]
    fn test_plateau_gets_gradient() {
        // 7x7 plateau at 10, one low edge cell on the west side; the three
        // interior cells touching it are not flat
        let mut dem = Raster::filled(7, 7, 10.0);
        dem.set(3, 0, 5.0).unwrap();

        assert_eq!(count_flats(&dem), 22);
        let (resolved, stats) = resolve_flats(&dem, FlatParams::default()).unwrap();

        assert_eq!(stats.flat_cells_before, 22);
        assert_eq!(stats.flat_cells_after, 0);
        assert_eq!(stats.flats_resolved, 22);
        assert_relative_eq!(stats.max_gradient_added, 1e-4, epsilon = 1e-12);

        // centre is farther from the rim than a cell next to it
        let centre = resolved.get(3, 3).unwrap();
        let inner = resolved.get(2, 2).unwrap();
        assert!(centre > inner);
        assert!(inner > 10.0);
        // rim cells are untouched
        assert_eq!(resolved.get(0, 0).unwrap(), 10.0);
        assert_eq!(resolved.get(3, 0).unwrap(), 5.0);
    }

    #[test]
    fn test_every_former_flat_cell_drains() {
        let mut dem = Raster::filled(9, 9, 10.0);
        for col in 0..9 {
            dem.set(8, col, 1.0).unwrap();
        }
        let (resolved, _) = resolve_flats(&dem, FlatParams::default()).unwrap();
        let fdir = compute_flow_direction(&resolved, 1.0).unwrap();

        for row in 2..7 {
            for col in 2..7 {
                assert_ne!(fdir.get(row, col).unwrap(), 0, "cell ({}, {})", row, col);
            }
        }
    }

    #[test]
    fn test_no_flats_is_identity() {
        let dem = Raster::from_vec((0..16).map(|i| i as f64).collect(), 4, 4).unwrap();
        let (resolved, stats) = resolve_flats(&dem, FlatParams::default()).unwrap();
        assert_eq!(resolved.data(), dem.data());
        assert_eq!(stats, FlatStats::default());
    }

    #[test]
    fn test_nodata_preserved_and_blocks_flats() {
        let mut dem = Raster::filled(5, 5, 10.0);
        dem.set(2, 2, -9999.0).unwrap();
        dem.set_nodata(Some(-9999.0));

        let (resolved, stats) = resolve_flats(&dem, FlatParams::default()).unwrap();
        assert_eq!(resolved.get(2, 2).unwrap(), -9999.0);
        // every interior cell borders the NoData hole
        assert_eq!(stats.flat_cells_before, 0);
    }

    #[test]
    fn test_negative_eps_rejected() {
        let dem = Raster::filled(3, 3, 1.0);
        assert!(resolve_flats(&dem, FlatParams { eps: -1.0 }).is_err());
    }
}
