//! Flow accumulation
//!
//! Counts, for every valid cell, the cells whose flow path passes through
//! it, including itself. Values are raw counts: they are never normalized,
//! log-scaled or clipped, because downstream consumers turn them into
//! contributing areas.

use super::flow_graph::FlowGraph;
use hydrodem_core::{Algorithm, Error, Raster, Result};
use std::collections::VecDeque;
use tracing::{info, warn};

/// Flow accumulation algorithm
#[derive(Debug, Clone, Default)]
pub struct FlowAccumulation;

impl Algorithm for FlowAccumulation {
    type Input = FlowGraph;
    type Output = Raster<u32>;
    type Params = ();
    type Error = Error;

    fn name(&self) -> &'static str {
        "Flow Accumulation"
    }

    fn description(&self) -> &'static str {
        "Upstream cell counts by topological sort of the D8 flow graph"
    }

    fn execute(&self, input: Self::Input, _params: Self::Params) -> Result<Self::Output> {
        compute_flow_accumulation(&input)
    }
}

/// Compute flow accumulation with Kahn's topological sort.
///
/// Headwater cells (no upstream neighbours) start the FIFO queue with a
/// count of 1. Each processed cell adds its count to its downstream cell,
/// which is enqueued once all of its upstream cells are done. NoData cells
/// hold 0.
///
/// # Errors
///
/// [`Error::UnprocessedCells`] when fewer cells were processed than there
/// are valid cells, which means the flow graph contains a cycle.
pub fn compute_flow_accumulation(graph: &FlowGraph) -> Result<Raster<u32>> {
    let n = graph.len();
    let mut acc = vec![0u32; n];
    let mut remaining = vec![0usize; n];
    let mut queue = VecDeque::new();

    for idx in 0..n {
        if !graph.is_valid(idx) {
            continue;
        }
        acc[idx] = 1;
        remaining[idx] = graph.in_degree(idx);
        if remaining[idx] == 0 {
            queue.push_back(idx);
        }
    }

    let mut processed = 0usize;
    while let Some(idx) = queue.pop_front() {
        processed += 1;

        if let Some(ds) = graph.downstream(idx) {
            acc[ds] = acc[ds].saturating_add(acc[idx]);
            remaining[ds] -= 1;
            if remaining[ds] == 0 {
                queue.push_back(ds);
            }
        }
    }

    if processed != graph.valid_count() {
        warn!(
            processed,
            valid = graph.valid_count(),
            "flow accumulation left cells unprocessed"
        );
        return Err(Error::UnprocessedCells {
            stage: "flow accumulation",
            processed,
            valid: graph.valid_count(),
        });
    }

    let max_accumulation = acc.iter().copied().max().unwrap_or(0);
    let mean_accumulation = if processed > 0 {
        acc.iter().map(|&a| a as f64).sum::<f64>() / processed as f64
    } else {
        0.0
    };
    info!(
        max_accumulation,
        mean_accumulation,
        cells_processed = processed,
        "flow accumulation computed"
    );

    let mut output = graph.raster_from(acc)?;
    output.set_nodata(Some(0));
    Ok(output)
}

/// Upstream contributing area in square metres for each cell
pub fn contributing_area(acc: &Raster<u32>, cell_size_m: f64) -> Raster<f64> {
    let cell_area = cell_size_m * cell_size_m;
    acc.map(|&count| count as f64 * cell_area)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hydrology::flow_direction::compute_flow_direction;
    use hydrodem_core::GeoTransform;

    fn route(dem: &Raster<f64>) -> (FlowGraph, Raster<u32>) {
        let fdir = compute_flow_direction(dem, 1.0).unwrap();
        let graph = FlowGraph::build(&fdir, &dem.nodata_mask()).unwrap();
        let acc = compute_flow_accumulation(&graph).unwrap();
        (graph, acc)
    }

    #[test]
    fn test_flow_accumulation_linear() {
        // 1x5 strip sloping east
        let mut dem = Raster::new(1, 5);
        dem.set_transform(GeoTransform::new(0.0, 1.0, 1.0, -1.0));
        for col in 0..5 {
            dem.set(0, col, (5 - col) as f64).unwrap();
        }

        let (_, acc) = route(&dem);
        let values: Vec<u32> = acc.data().iter().copied().collect();
        assert_eq!(values, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_flow_accumulation_convergent() {
        //  9 5 9
        //  5 1 5
        //  9 5 9
        let dem = Raster::from_vec(
            vec![9.0, 5.0, 9.0, 5.0, 1.0, 5.0, 9.0, 5.0, 9.0],
            3,
            3,
        )
        .unwrap();

        let (_, acc) = route(&dem);
        assert_eq!(acc.get(1, 1).unwrap(), 9);
        assert_eq!(acc.get(0, 0).unwrap(), 1);
    }

    #[test]
    fn test_accumulation_recurrence() {
        let dem = Raster::from_vec(
            (0..36)
                .map(|i| {
                    let (r, c) = ((i / 6) as f64, (i % 6) as f64);
                    (r - 2.5).powi(2) + (c - 4.0).abs() * 3.0 + 0.1 * r
                })
                .collect(),
            6,
            6,
        )
        .unwrap();

        let (graph, acc) = route(&dem);
        for idx in 0..graph.len() {
            let (r, c) = graph.coords(idx);
            let upstream_sum: u32 = graph
                .upstream(idx)
                .iter()
                .map(|&u| {
                    let (ur, uc) = graph.coords(u as usize);
                    acc.get(ur, uc).unwrap()
                })
                .sum();
            assert_eq!(acc.get(r, c).unwrap(), 1 + upstream_sum);
        }
    }

    #[test]
    fn test_nodata_cells_hold_zero() {
        let mut dem = Raster::from_vec(vec![3.0, 2.0, 1.0, -1.0], 1, 4).unwrap();
        dem.set_nodata(Some(-1.0));

        let (_, acc) = route(&dem);
        assert_eq!(acc.get(0, 3).unwrap(), 0);
        assert_eq!(acc.get(0, 2).unwrap(), 3);
    }

    #[test]
    fn test_cycle_is_reported() {
        // two cells pointing at each other
        let fdir = Raster::from_vec(vec![1u8, 16], 1, 2).unwrap();
        let mask = fdir.map(|_| false);
        let graph = FlowGraph::build(&fdir, &mask).unwrap();

        let err = compute_flow_accumulation(&graph).unwrap_err();
        assert!(matches!(
            err,
            Error::UnprocessedCells { processed: 0, valid: 2, .. }
        ));
    }

    #[test]
    fn test_contributing_area() {
        let acc = Raster::from_vec(vec![1u32, 4], 1, 2).unwrap();
        let area = contributing_area(&acc, 30.0);
        assert_eq!(area.get(0, 1).unwrap(), 3600.0);
    }
}
