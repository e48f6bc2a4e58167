//! D8 flow direction encoding.
//!
//! Every routing stage shares this table. Codes follow the ESRI convention
//! so flow direction rasters can be exchanged with other GIS tools:
//!
//! ```text
//!   32  64  128
//!   16   0    1
//!    8   4    2
//! ```
//!
//! `0` marks an outlet (no downslope neighbour) or a no-data cell.

use std::f64::consts::SQRT_2;

/// Code for "no outflow"
pub const OUTLET: u8 = 0;

/// Direction codes in evaluation order: N, NE, E, SE, S, SW, W, NW
pub const CODES: [u8; 8] = [64, 128, 1, 2, 4, 8, 16, 32];

/// `(row_offset, col_offset)` for each entry of [`CODES`]
pub const OFFSETS: [(isize, isize); 8] = [
    (-1, 0),  // N
    (-1, 1),  // NE
    (0, 1),   // E
    (1, 1),   // SE
    (1, 0),   // S
    (1, -1),  // SW
    (0, -1),  // W
    (-1, -1), // NW
];

/// Distance to each neighbour in cell units
pub const DISTANCES: [f64; 8] = [1.0, SQRT_2, 1.0, SQRT_2, 1.0, SQRT_2, 1.0, SQRT_2];

/// Position of `code` in [`CODES`], `None` for 0 or an unknown code
pub fn index_of(code: u8) -> Option<usize> {
    match code {
        64 => Some(0),
        128 => Some(1),
        1 => Some(2),
        2 => Some(3),
        4 => Some(4),
        8 => Some(5),
        16 => Some(6),
        32 => Some(7),
        _ => None,
    }
}

/// Whether `code` is a valid raster value (outlet or one of the eight directions)
pub fn is_valid_code(code: u8) -> bool {
    code == OUTLET || index_of(code).is_some()
}

/// Offset the code points at
pub fn offset(code: u8) -> Option<(isize, isize)> {
    index_of(code).map(|i| OFFSETS[i])
}

/// Cell reached by moving one step from `(row, col)` along offset `(dr, dc)`,
/// `None` when the step leaves a `rows` x `cols` grid.
pub fn step(
    row: usize,
    col: usize,
    (dr, dc): (isize, isize),
    rows: usize,
    cols: usize,
) -> Option<(usize, usize)> {
    let nr = row.checked_add_signed(dr)?;
    let nc = col.checked_add_signed(dc)?;
    (nr < rows && nc < cols).then_some((nr, nc))
}

/// Downstream cell of `(row, col)` for `code`.
///
/// `None` for outlets, unknown codes and steps that leave the grid.
pub fn downstream(row: usize, col: usize, code: u8, rows: usize, cols: usize) -> Option<(usize, usize)> {
    offset(code).and_then(|off| step(row, col, off, rows, cols))
}

/// In-grid neighbours of `(row, col)` as `(direction index, row, col)`
pub fn neighbors(
    row: usize,
    col: usize,
    rows: usize,
    cols: usize,
) -> impl Iterator<Item = (usize, usize, usize)> {
    OFFSETS
        .iter()
        .enumerate()
        .filter_map(move |(i, &off)| step(row, col, off, rows, cols).map(|(r, c)| (i, r, c)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_downstream_leaves_grid() {
        assert_eq!(downstream(0, 0, 64, 3, 3), None);
        assert_eq!(downstream(1, 1, 2, 3, 3), Some((2, 2)));
        assert_eq!(downstream(1, 1, 0, 3, 3), None);
        assert_eq!(downstream(1, 1, 3, 3, 3), None);
    }

    #[test]
    fn test_neighbors_corner() {
        let around: Vec<_> = neighbors(0, 0, 4, 4).map(|(_, r, c)| (r, c)).collect();
        assert_eq!(around, vec![(0, 1), (1, 1), (1, 0)]);
        assert_eq!(neighbors(2, 2, 4, 4).count(), 8);
    }

    #[test]
    fn test_codes_match_offsets() {
        for (i, &code) in CODES.iter().enumerate() {
            assert_eq!(index_of(code), Some(i));
            assert_eq!(offset(code), Some(OFFSETS[i]));
        }
        assert!(is_valid_code(0));
        assert!(!is_valid_code(3));
    }
}
