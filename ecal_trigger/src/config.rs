//! Configuration loading.
//!
//! A run is described by one TOML file with four optional sections:
//!
//! ```toml
//! [layout]
//! origin_x = 950.0
//! origin_y = 2500.0
//!
//! [grid]
//! increment_x = 160.0
//! increment_y = 160.0
//! acceptance = { mode = "radius", factor = 0.6 }
//!
//! [logic]
//! capacity = 32
//! cut_x = 4.0
//! cut_y = 4.0
//! density = { mode = "fixed", max_per_row = 4, max_rows = 8 }
//!
//! [anchors]
//! mode = "range"
//! start = 35
//! end = 45
//! ```
//!
//! Every field has a default, so a missing file section means the detector
//! study's constants.

use crate::core_modules::cluster_builder::{ClusterParams, DensityCap};
use crate::core_modules::layout_reader::LayoutConfig;
use crate::core_modules::node_grid::{GridConfig, NodeAcceptance, SamplingNode};
use crate::error::ConfigError;
use serde::Deserialize;
use std::ops::Range;
use std::path::Path;

/// How the per-row density cap is chosen.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum DensityMode {
    /// 4 per row on 8 rows for 32-module logic, no cap otherwise.
    #[default]
    Auto,
    Off,
    Fixed { max_per_row: usize, max_rows: usize },
}

/// Cluster growth parameters as written in the config file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LogicConfig {
    pub capacity: usize,
    pub nominal_size: f64,
    pub cut_x: f64,
    pub cut_y: f64,
    /// Adjacency distance in multiples of `nominal_size`.
    pub neighbor_factor: f64,
    pub density: DensityMode,
}

impl Default for LogicConfig {
    fn default() -> Self {
        Self {
            capacity: 64,
            nominal_size: 42.0,
            cut_x: 4.0,
            cut_y: 4.0,
            neighbor_factor: 1.5,
            density: DensityMode::Auto,
        }
    }
}

impl LogicConfig {
    pub fn cluster_params(&self) -> ClusterParams {
        let density = match self.density {
            DensityMode::Auto => ClusterParams::for_capacity(self.capacity).density,
            DensityMode::Off => None,
            DensityMode::Fixed { max_per_row, max_rows } => Some(DensityCap { max_per_row, max_rows }),
        };
        ClusterParams {
            capacity: self.capacity,
            cut_x: self.cut_x,
            cut_y: self.cut_y,
            nominal_size: self.nominal_size,
            neighbor_distance: self.neighbor_factor * self.nominal_size,
            density,
        }
    }
}

/// Which sampling nodes anchor a cluster.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum AnchorSelection {
    #[default]
    All,
    /// Node indices `start..end`.
    Range { start: usize, end: usize },
    /// Every `stride`-th node starting at `offset`.
    Every { stride: usize, offset: usize },
    Explicit { indices: Vec<usize> },
}

impl AnchorSelection {
    /// Resolves the selection against the generated nodes.
    ///
    /// Returns the anchors in processing order and the spans of requested
    /// indices that have no node. Only existing nodes are ever walked, so the
    /// cost does not depend on how far a range reaches past the last node.
    pub fn select<'a>(&self, nodes: &'a [SamplingNode]) -> (Vec<&'a SamplingNode>, Vec<Range<usize>>) {
        let count = nodes.len();
        match self {
            AnchorSelection::All => (nodes.iter().collect(), Vec::new()),
            AnchorSelection::Range { start, end } => {
                let anchors = nodes
                    .get(*start..(*end).min(count))
                    .map_or_else(Vec::new, |slice| slice.iter().collect());
                let first_missing = (*start).max(count);
                let missing = if first_missing < *end {
                    vec![first_missing..*end]
                } else {
                    Vec::new()
                };
                (anchors, missing)
            }
            AnchorSelection::Every { stride, offset } => {
                let anchors = nodes.iter().skip(*offset).step_by((*stride).max(1)).collect();
                (anchors, Vec::new())
            }
            AnchorSelection::Explicit { indices } => {
                let mut anchors = Vec::new();
                let mut missing: Vec<Range<usize>> = Vec::new();
                for &index in indices {
                    match nodes.get(index) {
                        Some(node) => anchors.push(node),
                        None => match missing.last_mut() {
                            Some(span) if span.end == index => span.end = index.saturating_add(1),
                            _ => missing.push(index..index.saturating_add(1)),
                        },
                    }
                }
                (anchors, missing)
            }
        }
    }
}

/// Complete configuration of one pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub layout: LayoutConfig,
    pub grid: GridConfig,
    pub logic: LogicConfig,
    pub anchors: AnchorSelection,
}

impl PipelineConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: PipelineConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |message: String| Err(ConfigError::Invalid(message));

        if !(self.grid.increment_x > 0.0 && self.grid.increment_y > 0.0) {
            return invalid(format!(
                "grid increments must be positive, got ({}, {})",
                self.grid.increment_x, self.grid.increment_y
            ));
        }
        if !(self.grid.nominal_size > 0.0) {
            return invalid(format!("grid nominal_size must be positive, got {}", self.grid.nominal_size));
        }
        match self.grid.acceptance {
            NodeAcceptance::Radius { factor } if !(factor > 0.0) => {
                return invalid(format!("acceptance factor must be positive, got {factor}"));
            }
            NodeAcceptance::Footprint { scale } if !(scale > 0.0) => {
                return invalid(format!("acceptance scale must be positive, got {scale}"));
            }
            _ => {}
        }
        if self.logic.capacity == 0 {
            return invalid("logic capacity must be at least 1".to_string());
        }
        if !(self.logic.cut_x > 0.0 && self.logic.cut_y > 0.0) {
            return invalid(format!(
                "logic cuts must be positive, got ({}, {})",
                self.logic.cut_x, self.logic.cut_y
            ));
        }
        if !(self.logic.nominal_size > 0.0 && self.logic.neighbor_factor > 0.0) {
            return invalid("logic nominal_size and neighbor_factor must be positive".to_string());
        }
        if let DensityMode::Fixed { max_per_row, max_rows } = self.logic.density {
            if max_per_row == 0 || max_rows == 0 {
                return invalid("density limits must be at least 1".to_string());
            }
        }
        if let AnchorSelection::Every { stride: 0, .. } = self.anchors {
            return invalid("anchor stride must be at least 1".to_string());
        }
        Ok(())
    }
}
