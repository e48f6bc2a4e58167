//! Channel network extraction
//!
//! Cells whose flow accumulation reaches a threshold are channel cells.
//! The threshold is supplied by the caller. As a rough guide, small streams
//! need 100-500 cells, rivers 1000-5000 and major rivers more than 10000.

use hydrodem_core::{Error, Raster, Result};
use tracing::{info, warn};

/// Extract the channel mask: `true` where `accumulation >= threshold`.
///
/// An empty mask is a valid result. NoData cells hold an accumulation of 0
/// and so are never channels.
pub fn extract_channel_mask(acc: &Raster<u32>, threshold: u32) -> Result<Raster<bool>> {
    if threshold == 0 {
        return Err(Error::InvalidParameter {
            name: "threshold",
            value: threshold.to_string(),
            reason: "must be at least 1 cell".into(),
        });
    }

    let channels = acc.map(|&a| a >= threshold);
    let num_cells = channels.count_true();

    if num_cells == 0 {
        warn!(threshold, "no cells reach the channel threshold");
    } else {
        info!(threshold, num_cells, "channels extracted");
    }

    Ok(channels)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_is_inclusive() {
        let acc = Raster::from_vec(vec![1u32, 4, 5, 25], 2, 2).unwrap();
        let channels = extract_channel_mask(&acc, 5).unwrap();
        let values: Vec<bool> = channels.data().iter().copied().collect();
        assert_eq!(values, vec![false, false, true, true]);
    }

    #[test]
    fn test_high_threshold_gives_empty_mask() {
        let acc = Raster::from_vec(vec![1u32, 2, 3, 9], 2, 2).unwrap();
        let channels = extract_channel_mask(&acc, 1000).unwrap();
        assert!(!channels.any());
    }

    #[test]
    fn test_zero_threshold_rejected() {
        let acc: Raster<u32> = Raster::new(2, 2);
        assert!(matches!(
            extract_channel_mask(&acc, 0),
            Err(Error::InvalidParameter { name: "threshold", .. })
        ));
    }
}
