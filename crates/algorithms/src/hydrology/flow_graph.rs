//! Shared D8 flow graph
//!
//! The reverse-flow adjacency (for each cell, the cells that drain into it)
//! is needed by accumulation, HAND and catchment delineation. It is built
//! once from a flow direction grid and shared by all three traversals.
//!
//! Upstream lists are stored in compressed sparse row form: the upstream
//! cells of cell `i` are `upstream[offsets[i]..offsets[i + 1]]`, with cells
//! addressed by their linear index `row * cols + col`.

use hydrodem_core::raster::d8;
use hydrodem_core::{Error, GeoTransform, Raster, RasterElement, Result, CRS};

/// Sentinel for "no downstream cell"
const NONE: u32 = u32::MAX;

/// Reverse-flow adjacency of a D8 flow direction grid.
#[derive(Debug, Clone)]
pub struct FlowGraph {
    rows: usize,
    cols: usize,
    valid: Vec<bool>,
    valid_count: usize,
    downstream: Vec<u32>,
    offsets: Vec<u32>,
    upstream: Vec<u32>,
    transform: GeoTransform,
    crs: Option<CRS>,
}

impl FlowGraph {
    /// Build the graph from a flow direction grid and the NoData mask of the
    /// DEM it was derived from.
    ///
    /// A valid cell gets a downstream edge when its code points at an
    /// in-grid valid cell. Cells whose code is 0, leaves the grid or points
    /// at NoData are terminal. Codes outside the D8 table are rejected.
    pub fn build(flow_dir: &Raster<u8>, nodata_mask: &Raster<bool>) -> Result<Self> {
        flow_dir.ensure_same_shape(nodata_mask)?;
        let (rows, cols) = flow_dir.shape();
        let n = rows * cols;
        if n >= NONE as usize {
            return Err(Error::InvalidDimensions {
                width: cols,
                height: rows,
            });
        }

        let valid: Vec<bool> = nodata_mask.data().iter().map(|&nd| !nd).collect();
        let valid_count = valid.iter().filter(|&&v| v).count();

        let mut downstream = vec![NONE; n];
        let mut in_degree = vec![0u32; n + 1];

        for ((row, col), &code) in flow_dir.data().indexed_iter() {
            let idx = row * cols + col;
            if !valid[idx] || code == d8::OUTLET {
                continue;
            }
            if !d8::is_valid_code(code) {
                return Err(Error::MalformedRaster(format!(
                    "invalid D8 code {} at ({}, {})",
                    code, row, col
                )));
            }
            if let Some((r, c)) = d8::downstream(row, col, code, rows, cols) {
                let target = r * cols + c;
                if valid[target] {
                    downstream[idx] = target as u32;
                    in_degree[target + 1] += 1;
                }
            }
        }

        // prefix sums turn in-degrees into row offsets
        let mut offsets = in_degree;
        for i in 1..offsets.len() {
            offsets[i] += offsets[i - 1];
        }

        let mut cursor: Vec<u32> = offsets[..n].to_vec();
        let mut upstream = vec![0u32; offsets[n] as usize];
        for (idx, &ds) in downstream.iter().enumerate() {
            if ds != NONE {
                let slot = &mut cursor[ds as usize];
                upstream[*slot as usize] = idx as u32;
                *slot += 1;
            }
        }

        Ok(Self {
            rows,
            cols,
            valid,
            valid_count,
            downstream,
            offsets,
            upstream,
            transform: *flow_dir.transform(),
            crs: flow_dir.crs().cloned(),
        })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// Total number of cells, valid or not
    pub fn len(&self) -> usize {
        self.valid.len()
    }

    pub fn is_empty(&self) -> bool {
        self.valid.is_empty()
    }

    /// Number of valid (non-NoData) cells
    pub fn valid_count(&self) -> usize {
        self.valid_count
    }

    /// Linear index of `(row, col)`
    pub fn index(&self, row: usize, col: usize) -> usize {
        row * self.cols + col
    }

    /// `(row, col)` of a linear index
    pub fn coords(&self, idx: usize) -> (usize, usize) {
        (idx / self.cols, idx % self.cols)
    }

    pub fn is_valid(&self, idx: usize) -> bool {
        self.valid[idx]
    }

    /// Downstream cell of `idx`, `None` for terminal and NoData cells
    pub fn downstream(&self, idx: usize) -> Option<usize> {
        match self.downstream[idx] {
            NONE => None,
            ds => Some(ds as usize),
        }
    }

    /// Valid cells that drain directly into `idx`
    pub fn upstream(&self, idx: usize) -> &[u32] {
        let start = self.offsets[idx] as usize;
        let end = self.offsets[idx + 1] as usize;
        &self.upstream[start..end]
    }

    /// Number of cells draining directly into `idx`
    pub fn in_degree(&self, idx: usize) -> usize {
        (self.offsets[idx + 1] - self.offsets[idx]) as usize
    }

    /// Valid cell without a valid downstream neighbour
    pub fn is_terminal(&self, idx: usize) -> bool {
        self.valid[idx] && self.downstream[idx] == NONE
    }

    /// Raster with this graph's georeferencing over row-major `data`
    pub(crate) fn raster_from<T: RasterElement>(&self, data: Vec<T>) -> Result<Raster<T>> {
        let mut raster = Raster::from_vec(data, self.rows, self.cols)?;
        raster.set_transform(self.transform);
        raster.set_crs(self.crs.clone());
        Ok(raster)
    }
}
