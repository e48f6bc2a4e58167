//! Scenario and property tests for the hydrology stages on synthetic DEMs.
//!
//! Each DEM is small enough to check by hand; the property tests run the
//! same checks over a rough pseudo-random surface.

use hydrodem_algorithms::hydrology::{
    catchment_to_polygon, compute_flow_accumulation, compute_flow_direction, compute_hand,
    condition_dem, delineate_catchment, extract_channel_mask, flood_mask, flood_polygon,
    ConditionParams, FillMethod, FillParams, FlowGraph,
};
use hydrodem_core::{GeoTransform, Raster, CRS};

fn georeferenced(values: Vec<f64>, rows: usize, cols: usize) -> Raster<f64> {
    let mut dem = Raster::from_vec(values, rows, cols).unwrap();
    dem.set_transform(GeoTransform::new(0.0, rows as f64, 1.0, -1.0));
    dem.set_crs(Some(CRS::from_epsg(32633)));
    dem
}

/// Deterministic rough terrain with pits, ridges and a NoData hole
fn rough_terrain(rows: usize, cols: usize) -> Raster<f64> {
    let mut seed: u64 = 0x2545_f491_4f6c_dd1d;
    let values = (0..rows * cols)
        .map(|i| {
            seed ^= seed << 13;
            seed ^= seed >> 7;
            seed ^= seed << 17;
            let (r, c) = ((i / cols) as f64, (i % cols) as f64);
            let noise = (seed % 1000) as f64 / 100.0;
            200.0 - 1.5 * r - 0.8 * c + (r * 0.7).sin() * 4.0 + noise
        })
        .collect();
    let mut dem = georeferenced(values, rows, cols);
    for r in 10..13 {
        for c in 20..24 {
            dem.set(r, c, -9999.0).unwrap();
        }
    }
    dem.set_nodata(Some(-9999.0));
    dem
}

struct Routed {
    dem: Raster<f64>,
    graph: FlowGraph,
    acc: Raster<u32>,
}

fn route(dem: &Raster<f64>) -> Routed {
    let conditioned = condition_dem(dem, ConditionParams::default()).unwrap();
    let fdir = compute_flow_direction(&conditioned.dem, 1.0).unwrap();
    let graph = FlowGraph::build(&fdir, &conditioned.dem.nodata_mask()).unwrap();
    let acc = compute_flow_accumulation(&graph).unwrap();
    Routed {
        dem: conditioned.dem,
        graph,
        acc,
    }
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[test]
fn scenario_a_bowl_centre_collects_everything() {
    let dem = georeferenced(vec![9.0, 5.0, 9.0, 5.0, 1.0, 5.0, 9.0, 5.0, 9.0], 3, 3);
    let fdir = compute_flow_direction(&dem, 1.0).unwrap();
    let graph = FlowGraph::build(&fdir, &dem.nodata_mask()).unwrap();
    let acc = compute_flow_accumulation(&graph).unwrap();

    assert_eq!(fdir.get(1, 1).unwrap(), 0);
    assert_eq!(acc.get(1, 1).unwrap(), 9);
}

#[test]
fn scenario_b_tilted_plane_single_catchment() {
    let values = (0..25)
        .map(|i| 50.0 - (i / 5) as f64 - (i % 5) as f64)
        .collect();
    let routed = route(&georeferenced(values, 5, 5));

    assert_eq!(routed.acc.get(4, 4).unwrap(), 25);
    let catchment = delineate_catchment((4, 4), &routed.graph).unwrap();
    assert_eq!(catchment.count_true(), 25);
}

#[test]
fn scenario_c_threshold_above_max_accumulation() {
    let routed = route(&rough_terrain(20, 30));
    let max_acc = routed.acc.data().iter().copied().max().unwrap();

    let channels = extract_channel_mask(&routed.acc, max_acc + 1).unwrap();
    assert!(!channels.any());

    let hand = compute_hand(&routed.dem, &routed.graph, &channels).unwrap();
    let nodata = routed.dem.nodata_mask();
    for (&h, &nd) in hand.data().iter().zip(nodata.data().iter()) {
        assert_eq!(h.is_nan(), nd);
        if !nd {
            assert!(h >= 0.0);
        }
    }
}

#[test]
fn scenario_d_empty_flood_mask() {
    let routed = route(&rough_terrain(20, 30));
    let channels = extract_channel_mask(&routed.acc, 5).unwrap();
    let hand = compute_hand(&routed.dem, &routed.graph, &channels).unwrap();
    let nodata = routed.dem.nodata_mask();

    // nothing is strictly below a level of zero
    let mask = flood_mask(&hand, 0.0, &nodata).unwrap();
    assert!(!mask.any());

    let feature = flood_polygon(&mask, routed.dem.transform(), &CRS::from_epsg(32633), 1e-4).unwrap();
    assert!(feature.geometry.is_none());
    assert_eq!(feature.get_property("area_km2").and_then(|v| v.as_f64()), Some(0.0));
    assert!(feature.to_geojson().geometry.is_none());
    let json = serde_json::to_value(feature.to_geojson()).unwrap();
    assert_eq!(json["geometry"], serde_json::Value::Null);
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

#[test]
fn conditioning_never_lowers_or_creates_nodata() {
    let dem = rough_terrain(24, 24);
    for method in [FillMethod::Iterative, FillMethod::PriorityFlood] {
        let params = ConditionParams {
            fill: FillParams {
                method,
                ..FillParams::default()
            },
            ..ConditionParams::default()
        };
        let conditioned = condition_dem(&dem, params).unwrap();

        assert_eq!(conditioned.dem.count_valid(), dem.count_valid());
        for (&before, &after) in dem.data().iter().zip(conditioned.dem.data().iter()) {
            assert!(after >= before);
        }
    }
}

#[test]
fn accumulation_satisfies_recurrence() {
    let routed = route(&rough_terrain(20, 30));
    let graph = &routed.graph;

    for idx in 0..graph.len() {
        let (r, c) = graph.coords(idx);
        let acc = routed.acc.get(r, c).unwrap();
        if !graph.is_valid(idx) {
            assert_eq!(acc, 0);
            continue;
        }
        let upstream: u32 = graph
            .upstream(idx)
            .iter()
            .map(|&u| {
                let (ur, uc) = graph.coords(u as usize);
                routed.acc.get(ur, uc).unwrap()
            })
            .sum();
        assert_eq!(acc, 1 + upstream);
    }
}

#[test]
fn hand_is_zero_on_channels_and_non_negative() {
    let routed = route(&rough_terrain(20, 30));
    let channels = extract_channel_mask(&routed.acc, 8).unwrap();
    let hand = compute_hand(&routed.dem, &routed.graph, &channels).unwrap();

    for (&c, &h) in channels.data().iter().zip(hand.data().iter()) {
        if c {
            assert!(h.abs() <= 1e-6);
        }
        if !h.is_nan() {
            assert!(h >= 0.0);
        }
    }
}

#[test]
fn flood_mask_is_monotone_in_level() {
    let routed = route(&rough_terrain(20, 30));
    let channels = extract_channel_mask(&routed.acc, 8).unwrap();
    let hand = compute_hand(&routed.dem, &routed.graph, &channels).unwrap();
    let nodata = routed.dem.nodata_mask();

    let mut previous = flood_mask(&hand, 0.0, &nodata).unwrap();
    for level in [0.5, 1.0, 2.0, 5.0, 10.0, 50.0] {
        let mask = flood_mask(&hand, level, &nodata).unwrap();
        for (&lo, &hi) in previous.data().iter().zip(mask.data().iter()) {
            assert!(!lo || hi);
        }
        previous = mask;
    }
}

#[test]
fn catchment_contains_pour_point_and_matches_polygon() {
    let routed = route(&rough_terrain(20, 30));
    let (pour_row, pour_col) = routed
        .acc
        .data()
        .indexed_iter()
        .max_by_key(|(_, &a)| a)
        .map(|(idx, _)| idx)
        .unwrap();

    let mask = delineate_catchment((pour_row, pour_col), &routed.graph).unwrap();
    assert!(mask.get(pour_row, pour_col).unwrap());
    assert_eq!(
        mask.count_true() as u32,
        routed.acc.get(pour_row, pour_col).unwrap()
    );

    let feature = catchment_to_polygon(&mask, routed.dem.transform(), &CRS::from_epsg(32633))
        .unwrap()
        .unwrap();
    assert_eq!(
        feature.get_property("num_cells").and_then(|v| v.as_i64()),
        Some(mask.count_true() as i64)
    );
    let area_m2 = feature.get_property("area_m2").and_then(|v| v.as_f64()).unwrap();
    assert!((area_m2 - mask.count_true() as f64).abs() < 1e-6);
}
