// THEORY:
// The node grid lays a regular lattice of virtual trigger "sampling nodes" over
// the detector. It plays the role a chunk grid plays over an image: a fixed,
// coarse partition of space that later stages anchor their work to.
//
// Algorithm:
// 1.  **Sampling region**: the extent of the module centers is inflated by half
//     the average module pitch on every side. This is the rectangle drawn
//     around the detector.
// 2.  **Lattice walk**: starting one increment in from the top-left corner, the
//     lattice is walked row by row (ascending y) and column by column
//     (ascending x).
// 3.  **Acceptance**: a lattice point becomes a node only if it falls inside
//     the acceptance footprint of at least one module. Points over gaps and
//     outside the perimeter are dropped.
// 4.  **Snapping**: by default an accepted node moves onto the center of the
//     nearest accepting module, so every anchor sits exactly on a tile.
// 5.  **Row correction** (optional): rows of different tile sizes drift away
//     from a fixed pitch. Each lattice row can be pulled onto its nearest
//     module row, and the shift is carried over to the rows below.

use crate::core_modules::module::{Bounds, Module, ModuleTable, Point};
use serde::Deserialize;
use tracing::{debug, info};

/// How a lattice point decides whether it lies "on" a module.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum NodeAcceptance {
    /// Within `factor * nominal_size` of a module center.
    Radius { factor: f64 },
    /// Inside the module's square footprint scaled by `scale` (1.0 exact, 0.5 half).
    Footprint { scale: f64 },
}

impl Default for NodeAcceptance {
    fn default() -> Self {
        NodeAcceptance::Radius { factor: 0.6 }
    }
}

impl NodeAcceptance {
    fn accepts(&self, point: Point, module: &Module, nominal_size: f64) -> bool {
        match *self {
            NodeAcceptance::Radius { factor } => point.distance(&module.center) <= factor * nominal_size,
            NodeAcceptance::Footprint { scale } => {
                let reach = scale * module.half_size();
                (point.x - module.center.x).abs() <= reach && (point.y - module.center.y).abs() <= reach
            }
        }
    }
}

/// Lattice parameters. Defaults reproduce the 160 mm node spacing of the detector study.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    pub increment_x: f64,
    pub increment_y: f64,
    /// Average module pitch; half of it pads the sampling region on each side.
    pub pitch_x: f64,
    pub pitch_y: f64,
    pub nominal_size: f64,
    pub acceptance: NodeAcceptance,
    pub snap_to_module: bool,
    pub row_correction: bool,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            increment_x: 160.0,
            increment_y: 160.0,
            pitch_x: (38.0 + 40.0) / 2.0,
            pitch_y: (38.0 + 42.0) / 2.0,
            nominal_size: 42.0,
            acceptance: NodeAcceptance::default(),
            snap_to_module: true,
            row_correction: false,
        }
    }
}

/// A virtual anchor point on the lattice.
#[derive(Debug, Clone, PartialEq)]
pub struct SamplingNode {
    /// Stable position in the generated sequence.
    pub index: usize,
    pub position: Point,
    /// The raw lattice point before snapping.
    pub lattice_point: Point,
    /// The module the node was snapped to, if snapping is on.
    pub module_id: Option<u32>,
}

/// The sampling region plus every accepted node, in lattice order.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeGrid {
    pub region: Option<Bounds>,
    pub columns: usize,
    pub rows: usize,
    pub nodes: Vec<SamplingNode>,
}

impl NodeGrid {
    fn empty() -> Self {
        Self {
            region: None,
            columns: 0,
            rows: 0,
            nodes: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&SamplingNode> {
        self.nodes.get(index)
    }
}

/// Module centers inflated by half the pitch on each side.
pub fn sampling_region(table: &ModuleTable, config: &GridConfig) -> Option<Bounds> {
    let centers = table.bounds()?;
    Some(Bounds {
        min_x: centers.min_x - 0.5 * config.pitch_x,
        max_x: centers.max_x + 0.5 * config.pitch_x,
        min_y: centers.min_y - 0.5 * config.pitch_y,
        max_y: centers.max_y + 0.5 * config.pitch_y,
    })
}

fn lattice_count(extent: f64, increment: f64) -> usize {
    let steps = ((extent - increment) / increment).floor() + 1.0;
    if steps > 0.0 { steps as usize } else { 0 }
}

/// The nearest module whose footprint accepts `point`. Ties go to the lowest id.
fn accepting_module<'a>(table: &'a ModuleTable, point: Point, config: &GridConfig) -> Option<&'a Module> {
    let mut best: Option<(&Module, f64)> = None;
    for module in table.iter() {
        if !config.acceptance.accepts(point, module, config.nominal_size) {
            continue;
        }
        let distance = point.distance(&module.center);
        if best.is_none_or(|(_, d)| distance < d) {
            best = Some((module, distance));
        }
    }
    best.map(|(module, _)| module)
}

/// The module-center y closest to `y`. Ties go to the lowest id.
fn nearest_row_y(table: &ModuleTable, y: f64) -> Option<f64> {
    let mut best: Option<f64> = None;
    for module in table.iter() {
        let candidate = module.center.y;
        if best.is_none_or(|b| (candidate - y).abs() < (b - y).abs()) {
            best = Some(candidate);
        }
    }
    best
}

/// Walks the lattice and keeps every point that lands on a module.
pub fn generate_nodes(table: &ModuleTable, config: &GridConfig) -> NodeGrid {
    let Some(region) = sampling_region(table, config) else {
        return NodeGrid::empty();
    };

    let columns = lattice_count(region.width(), config.increment_x);
    let rows = lattice_count(region.height(), config.increment_y);
    let mut nodes = Vec::new();
    let mut y_offset = 0.0;

    for row in 0..rows {
        let mut y = region.min_y + config.increment_y * (row + 1) as f64 + y_offset;

        if config.row_correction {
            if let Some(target) = nearest_row_y(table, y) {
                let delta = target - y;
                if delta.abs() <= 0.5 * config.nominal_size {
                    y_offset += delta;
                    y = target;
                }
            }
        }

        for col in 0..columns {
            let lattice_point = Point::new(region.min_x + config.increment_x * (col + 1) as f64, y);
            let Some(module) = accepting_module(table, lattice_point, config) else {
                continue;
            };

            let (position, module_id) = if config.snap_to_module {
                (module.center, Some(module.id))
            } else {
                (lattice_point, None)
            };
            nodes.push(SamplingNode {
                index: nodes.len(),
                position,
                lattice_point,
                module_id,
            });
        }
        debug!(row, y, accepted = nodes.len(), "lattice row walked");
    }

    info!(columns, rows, nodes = nodes.len(), "sampling nodes generated");
    NodeGrid {
        region: Some(region),
        columns,
        rows,
        nodes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::module::SizeClass;
    use crate::core_modules::test_support::uniform_grid;

    #[test]
    fn region_is_padded_by_half_pitch() {
        let table = uniform_grid(10, 10, SizeClass::S42);
        let region = sampling_region(&table, &GridConfig::default()).expect("region");
        assert_eq!(region.min_x, -19.5);
        assert_eq!(region.max_x, 397.5);
        assert_eq!(region.min_y, -20.0);
        assert_eq!(region.max_y, 398.0);
    }

    #[test]
    fn nodes_snap_onto_nearest_module() {
        let table = uniform_grid(10, 10, SizeClass::S42);
        let grid = generate_nodes(&table, &GridConfig::default());
        assert_eq!((grid.columns, grid.rows), (2, 2));
        let positions: Vec<Point> = grid.nodes.iter().map(|n| n.position).collect();
        assert_eq!(
            positions,
            vec![
                Point::new(126.0, 126.0),
                Point::new(294.0, 126.0),
                Point::new(126.0, 294.0),
                Point::new(294.0, 294.0),
            ]
        );
        let indices: Vec<usize> = grid.nodes.iter().map(|n| n.index).collect();
        assert_eq!(indices, vec![0, 1, 2, 3]);
        assert_eq!(grid.nodes[0].lattice_point, Point::new(140.5, 140.0));
        assert_eq!(grid.nodes[0].module_id, Some(33));
    }

    #[test]
    fn gaps_produce_no_nodes() {
        // Only the left half of the detector is populated.
        let table: ModuleTable = uniform_grid(10, 10, SizeClass::S42)
            .iter()
            .filter(|m| m.center.x < 200.0)
            .cloned()
            .chain(std::iter::once(Module::new(1000, Point::new(378.0, 378.0), SizeClass::S42)))
            .collect();
        let grid = generate_nodes(&table, &GridConfig::default());
        assert!(grid.nodes.iter().all(|n| n.position.x < 200.0));
        assert_eq!(grid.len(), 2);
    }

    #[test]
    fn raw_lattice_points_when_not_snapping() {
        let table = uniform_grid(10, 10, SizeClass::S42);
        let config = GridConfig {
            snap_to_module: false,
            ..GridConfig::default()
        };
        let grid = generate_nodes(&table, &config);
        assert_eq!(grid.nodes[0].position, Point::new(140.5, 140.0));
        assert_eq!(grid.nodes[0].module_id, None);
    }

    #[test]
    fn footprint_acceptance_is_stricter_than_radius() {
        let table = uniform_grid(10, 10, SizeClass::S42);
        let config = GridConfig {
            acceptance: NodeAcceptance::Footprint { scale: 0.25 },
            ..GridConfig::default()
        };
        // Every lattice point sits at least 6 mm off its nearest center on some axis.
        assert!(generate_nodes(&table, &config).is_empty());
    }

    #[test]
    fn row_correction_follows_module_rows() {
        let table = uniform_grid(10, 10, SizeClass::S42);
        let config = GridConfig {
            snap_to_module: false,
            row_correction: true,
            ..GridConfig::default()
        };
        let grid = generate_nodes(&table, &config);
        let ys: Vec<f64> = grid.nodes.iter().map(|n| n.position.y).collect();
        assert_eq!(ys, vec![126.0, 126.0, 294.0, 294.0]);
    }

    #[test]
    fn generation_is_deterministic() {
        let table = uniform_grid(12, 9, SizeClass::S40);
        let config = GridConfig::default();
        assert_eq!(generate_nodes(&table, &config), generate_nodes(&table, &config));
    }

    #[test]
    fn empty_table_has_no_region() {
        let grid = generate_nodes(&ModuleTable::new(), &GridConfig::default());
        assert!(grid.region.is_none());
        assert!(grid.is_empty());
    }
}
