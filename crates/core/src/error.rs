//! Error types for hydrodem

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for hydrodem operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("DEM not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Raster has no coordinate reference system")]
    MissingCrs,

    #[error("Invalid coordinate reference system: {0}")]
    InvalidCrs(String),

    #[error("Malformed raster: {0}")]
    MalformedRaster(String),

    #[error("Invalid raster dimensions: {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },

    #[error("Index out of bounds: ({row}, {col}) in raster of size ({rows}, {cols})")]
    IndexOutOfBounds {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },

    #[error("Raster size mismatch: expected ({er}, {ec}), got ({ar}, {ac})")]
    SizeMismatch { er: usize, ec: usize, ar: usize, ac: usize },

    #[error("Unsupported data type: {0}")]
    UnsupportedDataType(String),

    #[error("Invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("Conditioning created new NoData cells: {original_valid} valid before, {conditioned_valid} after")]
    NoDataCreated {
        original_valid: usize,
        conditioned_valid: usize,
    },

    #[error("{stage}: processed {processed} of {valid} valid cells (flow graph is not acyclic)")]
    UnprocessedCells {
        stage: &'static str,
        processed: usize,
        valid: usize,
    },

    #[error("Pour point ({row}, {col}) outside grid of size ({rows}, {cols})")]
    PourPointOutOfBounds {
        row: i64,
        col: i64,
        rows: usize,
        cols: usize,
    },

    #[error("Pour point ({row}, {col}) is on a NoData cell")]
    PourPointOnNoData { row: usize, col: usize },

    #[error("{0}")]
    Other(String),
}

/// Result type alias for hydrodem operations
pub type Result<T> = std::result::Result<T, Error>;
