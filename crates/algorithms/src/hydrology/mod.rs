//! Hydrological analysis from Digital Elevation Models
//!
//! The stages form a pipeline:
//! - Conditioning: fill depressions, resolve flats, validate
//! - Flow direction: D8 steepest descent
//! - Flow graph: shared reverse-flow adjacency
//! - Flow accumulation: upstream cell counts (Kahn's algorithm)
//! - Channels: accumulation threshold
//! - HAND: Height Above Nearest Drainage
//! - Flood: HAND-threshold flood extents and polygons
//! - Catchment: pour-point snapping and upstream delineation

mod catchment;
mod channels;
mod conditioning;
mod fill_depressions;
mod flats;
mod flood;
mod flow_accumulation;
mod flow_direction;
mod flow_graph;
mod hand;
mod priority_flood;

pub use catchment::{
    catchment_to_polygon, delineate_catchment, snap_pour_point, PourPoint, DEFAULT_SEARCH_RADIUS,
};
pub use channels::extract_channel_mask;
pub use conditioning::{
    condition_dem, condition_dem_file, ConditionParams, ConditionedDem, Conditioner,
    ConditioningMetadata,
};
pub use fill_depressions::{fill_depressions, has_pits, FillDepressions, FillMethod, FillParams, FillStats};
pub use flats::{count_flats, resolve_flats, FlatParams, FlatStats};
pub use flood::{flood_mask, flood_polygon};
pub use flow_accumulation::{compute_flow_accumulation, contributing_area, FlowAccumulation};
pub use flow_direction::{compute_flow_direction, FlowDirection, FlowDirectionParams};
pub use flow_graph::FlowGraph;
pub use hand::compute_hand;
