//! Boolean mask vectorization
//!
//! Traces the outline of the `true` region of a mask along cell edges and
//! returns polygons in map coordinates. Cells are grouped with
//! 4-connectivity: two `true` cells touching only at a corner belong to
//! different polygons.
//!
//! Boundary edges run between grid vertices `(x, y) = (col, row)`. Every
//! `true` cell contributes its sides that face a `false` or off-grid cell,
//! oriented clockwise on screen (y down):
//!
//! ```text
//!   (c,r) ──E──▶ (c+1,r)
//!     ▲            │
//!     N            S
//!     │            ▼
//!   (c,r+1) ◀─W─ (c+1,r+1)
//! ```
//!
//! Outer rings then have positive shoelace area in grid space and holes
//! negative area. At a vertex shared by two diagonal cells the tracer takes
//! the right-most turn, which keeps each ring around a single 4-connected
//! component. A ring is attached to the component of the cell below its
//! first east edge, so holes find their polygon without geometric tests.

use geo::{Coord, Geometry, LineString, MultiPolygon, Polygon};
use hydrodem_core::{GeoTransform, Raster};
use ndarray::Array2;
use std::collections::VecDeque;

const EAST: usize = 0;
const SOUTH: usize = 1;
const WEST: usize = 2;
const NORTH: usize = 3;

/// Vertex step `(dx, dy)` for each edge direction
const STEP: [(i64, i64); 4] = [(1, 0), (0, 1), (-1, 0), (0, -1)];

/// Closed ring in grid vertex coordinates, corners only
type GridRing = Vec<(i64, i64)>;

/// Label of cells outside every component
const UNLABELLED: usize = usize::MAX;

struct EdgeTracer<'a> {
    mask: &'a Array2<bool>,
    rows: i64,
    cols: i64,
}

impl<'a> EdgeTracer<'a> {
    fn new(mask: &'a Array2<bool>) -> Self {
        let (rows, cols) = mask.dim();
        Self {
            mask,
            rows: rows as i64,
            cols: cols as i64,
        }
    }

    fn cell(&self, row: i64, col: i64) -> bool {
        row >= 0
            && col >= 0
            && row < self.rows
            && col < self.cols
            && self.mask[(row as usize, col as usize)]
    }

    /// Whether a boundary edge leaves vertex `(x, y)` in direction `dir`
    fn has_edge(&self, x: i64, y: i64, dir: usize) -> bool {
        match dir {
            EAST => self.cell(y, x) && !self.cell(y - 1, x),
            SOUTH => self.cell(y, x - 1) && !self.cell(y, x),
            WEST => self.cell(y - 1, x - 1) && !self.cell(y, x - 1),
            NORTH => self.cell(y - 1, x) && !self.cell(y - 1, x - 1),
            _ => false,
        }
    }

    fn vertex_index(&self, x: i64, y: i64) -> usize {
        (y * (self.cols + 1) + x) as usize
    }

    /// Every ring of the mask, outer rings and holes alike, with the cell
    /// `(row, col)` below its first east edge
    fn rings(&self) -> Vec<(GridRing, (usize, usize))> {
        let mut east_used = vec![false; ((self.rows + 1) * (self.cols + 1)) as usize];
        let mut rings = Vec::new();

        for y in 0..self.rows {
            for x in 0..self.cols {
                if self.has_edge(x, y, EAST) && !east_used[self.vertex_index(x, y)] {
                    let ring = self.trace(x, y, &mut east_used);
                    rings.push((ring, (y as usize, x as usize)));
                }
            }
        }

        rings
    }

    /// Follow boundary edges from the east edge at `(x0, y0)` back to it
    fn trace(&self, x0: i64, y0: i64, east_used: &mut [bool]) -> GridRing {
        let mut edges: Vec<(i64, i64, usize)> = Vec::new();
        let (mut x, mut y, mut dir) = (x0, y0, EAST);

        loop {
            if dir == EAST {
                east_used[self.vertex_index(x, y)] = true;
            }
            edges.push((x, y, dir));

            let (dx, dy) = STEP[dir];
            x += dx;
            y += dy;

            // right turn, straight on, left turn
            let next = [(dir + 1) % 4, dir, (dir + 3) % 4]
                .into_iter()
                .find(|&d| self.has_edge(x, y, d));
            match next {
                Some(d) => dir = d,
                None => break,
            }
            if (x, y, dir) == (x0, y0, EAST) {
                break;
            }
        }

        let n = edges.len();
        (0..n)
            .filter(|&i| edges[(i + n - 1) % n].2 != edges[i].2)
            .map(|i| (edges[i].0, edges[i].1))
            .collect()
    }
}

/// Twice the signed shoelace area of a ring in grid coordinates
fn signed_area2(ring: &[(i64, i64)]) -> i64 {
    let n = ring.len();
    (0..n)
        .map(|i| {
            let (x1, y1) = ring[i];
            let (x2, y2) = ring[(i + 1) % n];
            x1 * y2 - x2 * y1
        })
        .sum()
}

fn to_line_string(ring: &[(i64, i64)], transform: &GeoTransform) -> LineString<f64> {
    let mut coords: Vec<Coord<f64>> = ring
        .iter()
        .map(|&(x, y)| {
            let (gx, gy) = transform.apply(x as f64, y as f64);
            Coord { x: gx, y: gy }
        })
        .collect();
    if let Some(&first) = coords.first() {
        coords.push(first);
    }
    LineString::new(coords)
}

/// 4-connected component label of every `true` cell, and the number of
/// components. Labels follow row-major order of each component's first cell.
fn label_components(mask: &Array2<bool>) -> (Array2<usize>, usize) {
    let (rows, cols) = mask.dim();
    let mut labels = Array2::from_elem((rows, cols), UNLABELLED);
    let mut count = 0;
    let mut queue = VecDeque::new();

    for ((row, col), &inside) in mask.indexed_iter() {
        if !inside || labels[(row, col)] != UNLABELLED {
            continue;
        }
        labels[(row, col)] = count;
        queue.push_back((row, col));

        while let Some((r, c)) = queue.pop_front() {
            let neighbors = [
                (r.wrapping_sub(1), c),
                (r + 1, c),
                (r, c.wrapping_sub(1)),
                (r, c + 1),
            ];
            for (nr, nc) in neighbors {
                if nr < rows && nc < cols && mask[(nr, nc)] && labels[(nr, nc)] == UNLABELLED {
                    labels[(nr, nc)] = count;
                    queue.push_back((nr, nc));
                }
            }
        }
        count += 1;
    }

    (labels, count)
}

/// Polygons covering the `true` cells of `mask`, in grid coordinates
/// (x = column, y = row of cell corners).
fn polygonize_grid(mask: &Array2<bool>) -> Vec<Polygon<f64>> {
    let identity = GeoTransform::new(0.0, 0.0, 1.0, 1.0);
    let (labels, count) = label_components(mask);

    let mut exteriors: Vec<Option<LineString<f64>>> = vec![None; count];
    let mut interiors: Vec<Vec<LineString<f64>>> = vec![Vec::new(); count];
    for (ring, cell) in EdgeTracer::new(mask).rings() {
        let component = labels[cell];
        let line = to_line_string(&ring, &identity);
        if signed_area2(&ring) > 0 {
            exteriors[component] = Some(line);
        } else {
            interiors[component].push(line);
        }
    }

    exteriors
        .into_iter()
        .zip(interiors)
        .filter_map(|(exterior, holes)| exterior.map(|ring| Polygon::new(ring, holes)))
        .collect()
}

/// Vectorize a mask into map coordinates.
///
/// Returns `None` when the mask has no `true` cell, a `Polygon` for a
/// single component and a `MultiPolygon` otherwise.
pub fn polygonize(mask: &Raster<bool>, transform: &GeoTransform) -> Option<Geometry<f64>> {
    let mut polygons: Vec<Polygon<f64>> = polygonize_grid(mask.data())
        .into_iter()
        .map(|poly| {
            let (exterior, interiors) = poly.into_inner();
            let map = |ring: LineString<f64>| {
                LineString::new(
                    ring.0
                        .into_iter()
                        .map(|c| {
                            let (x, y) = transform.apply(c.x, c.y);
                            Coord { x, y }
                        })
                        .collect(),
                )
            };
            Polygon::new(map(exterior), interiors.into_iter().map(map).collect())
        })
        .collect();

    match polygons.len() {
        0 => None,
        1 => polygons.pop().map(Geometry::Polygon),
        _ => Some(Geometry::MultiPolygon(MultiPolygon::new(polygons))),
    }
}
