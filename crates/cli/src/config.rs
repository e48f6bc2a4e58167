//! Pipeline configuration loader
//!
//! Parameters come from an optional TOML file shaped like
//! [`PipelineConfig`]; any field left out keeps its default. Command-line
//! flags are applied on top of whatever the file set.

use anyhow::{Context, Result};
use hydrodem_algorithms::hydrology::FillMethod;
use hydrodem_algorithms::{LatLon, PipelineConfig};
use std::fs;
use std::path::Path;

/// Parse a pipeline configuration from TOML text
pub fn parse_config(contents: &str) -> Result<PipelineConfig> {
    toml::from_str(contents).context("Invalid pipeline configuration")
}

/// Load the configuration file, or the defaults when no file is given
pub fn load_config(path: Option<&Path>) -> Result<PipelineConfig> {
    let Some(path) = path else {
        return Ok(PipelineConfig::default());
    };
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    parse_config(&contents).with_context(|| format!("Failed to parse {}", path.display()))
}

/// Command-line values that take precedence over the configuration file
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub fill_method: Option<FillMethod>,
    pub flat_eps: Option<f64>,
    pub channel_threshold: Option<u32>,
    pub cell_size: Option<f64>,
    pub water_levels: Option<Vec<f64>>,
    pub simplify_tolerance: Option<f64>,
    pub snap_radius: Option<usize>,
    pub pour_point: Option<LatLon>,
}

impl Overrides {
    pub fn apply(self, config: &mut PipelineConfig) {
        if let Some(method) = self.fill_method {
            config.condition.fill.method = method;
        }
        if let Some(eps) = self.flat_eps {
            config.condition.flats.eps = eps;
        }
        if let Some(threshold) = self.channel_threshold {
            config.channel_threshold = threshold;
        }
        if self.cell_size.is_some() {
            config.cell_size = self.cell_size;
        }
        if let Some(levels) = self.water_levels {
            config.water_levels = levels;
        }
        if let Some(tolerance) = self.simplify_tolerance {
            config.simplify_tolerance = tolerance;
        }
        if let Some(radius) = self.snap_radius {
            config.snap_radius = radius;
        }
        if self.pour_point.is_some() {
            config.pour_point = self.pour_point;
        }
    }
}

/// Parse a fill method name as accepted on the command line
pub fn parse_fill_method(s: &str) -> Result<FillMethod> {
    match s.to_lowercase().replace('-', "_").as_str() {
        "iterative" => Ok(FillMethod::Iterative),
        "priority_flood" | "pf" => Ok(FillMethod::PriorityFlood),
        _ => anyhow::bail!("Unknown fill method: {}. Use iterative or priority-flood.", s),
    }
}
