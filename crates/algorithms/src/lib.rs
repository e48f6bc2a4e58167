//! # hydrodem algorithms
//!
//! Terrain hydrology for flood and catchment analysis.
//!
//! ## Modules
//!
//! - **hydrology**: conditioning, D8 routing, flow graph, accumulation,
//!   channels, HAND, flood extents, catchments
//! - **vector**: mask polygonization, simplification, areas
//! - **pipeline**: every stage in one call, driven by [`PipelineConfig`]
//!
//! Rows of the flow-direction pass run on rayon when the `parallel` feature
//! is enabled; the default build is single-threaded.

pub mod hydrology;
mod maybe_rayon;
pub mod pipeline;
pub mod vector;

pub use pipeline::{
    catchment_from_point, run_pipeline, CatchmentResult, FloodExtent, LatLon, PipelineConfig,
    PipelineOutput,
};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::hydrology::{
        catchment_to_polygon, compute_flow_accumulation, compute_flow_direction, compute_hand,
        condition_dem, condition_dem_file, delineate_catchment, extract_channel_mask,
        fill_depressions, flood_mask, flood_polygon, resolve_flats, snap_pour_point,
        ConditionParams, ConditionedDem, Conditioner, FillMethod, FillParams, FlatParams,
        FlowAccumulation, FlowDirection, FlowGraph, PourPoint,
    };
    pub use crate::pipeline::{run_pipeline, LatLon, PipelineConfig, PipelineOutput};
    pub use crate::vector::{polygonize, simplify_preserve};
    pub use hydrodem_core::prelude::*;
}
