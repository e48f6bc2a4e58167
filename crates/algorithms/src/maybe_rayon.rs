//! Row-wise execution that runs on rayon when the `parallel` feature is on.
//!
//! The default build stays single-threaded. Row results are collected in
//! row order either way, so the output does not depend on the feature.

/// Evaluate `f` for every row index in `0..rows` and collect the results in order.
#[cfg(feature = "parallel")]
pub(crate) fn map_rows<T, F>(rows: usize, f: F) -> Vec<T>
where
    T: Send,
    F: Fn(usize) -> T + Sync + Send,
{
    use rayon::prelude::*;
    (0..rows).into_par_iter().map(f).collect()
}

/// Evaluate `f` for every row index in `0..rows` and collect the results in order.
#[cfg(not(feature = "parallel"))]
pub(crate) fn map_rows<T, F>(rows: usize, f: F) -> Vec<T>
where
    F: Fn(usize) -> T,
{
    (0..rows).map(f).collect()
}
