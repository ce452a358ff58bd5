//! One-screen description of a loaded detector.

use crate::core_modules::module::{Bounds, ModuleCounts, ModuleTable};
use crate::core_modules::node_grid::{GridConfig, NodeGrid};
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub struct DetectorSummary {
    pub counts: ModuleCounts,
    /// Extent of the module centers.
    pub centers: Option<Bounds>,
    /// The padded rectangle the lattice is laid over.
    pub region: Option<Bounds>,
    pub increment_x: f64,
    pub increment_y: f64,
    pub node_count: usize,
}

impl DetectorSummary {
    pub fn new(table: &ModuleTable, grid: &GridConfig, nodes: &NodeGrid) -> Self {
        Self {
            counts: table.counts(),
            centers: table.bounds(),
            region: nodes.region,
            increment_x: grid.increment_x,
            increment_y: grid.increment_y,
            node_count: nodes.len(),
        }
    }
}

impl fmt::Display for DetectorSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Total modules: {}", self.counts.total())?;
        writeln!(f, "Type 42: {}", self.counts.s42)?;
        writeln!(f, "Type 40: {}", self.counts.s40)?;
        writeln!(f, "Type 38: {}", self.counts.s38)?;
        match self.centers {
            Some(c) => writeln!(
                f,
                "Module centers: x {:.1} .. {:.1}, y {:.1} .. {:.1}",
                c.min_x, c.max_x, c.min_y, c.max_y
            )?,
            None => writeln!(f, "Module centers: none")?,
        }
        match self.region {
            Some(r) => writeln!(f, "Sampling region: {:.1} x {:.1} mm", r.width(), r.height())?,
            None => writeln!(f, "Sampling region: none")?,
        }
        write!(
            f,
            "Sampling nodes at {} x {} mm spacing: {}",
            self.increment_x, self.increment_y, self.node_count
        )
    }
}
