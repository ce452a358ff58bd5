// THEORY:
// The cluster builder is the engine of the trigger-logic layer. Given one
// anchor (a sampling node) it grows a single bounded "logic pattern" of
// modules around it. It is a region-growing algorithm on an irregular grid,
// where the neighbor relation is a distance test instead of a fixed stencil.
//
// Algorithm steps:
// 1.  **Seed Selection**: the module nearest to the anchor seeds the cluster.
//     Equidistant candidates resolve to the lowest module id, which is the
//     first one met in table order.
// 2.  **Frontier Expansion**: members are expanded in the order they were
//     accepted (a FIFO queue). Expanding a member scans the whole table and
//     accepts every free module that
//       - lies inside a box of `cut_x`/`cut_y` nominal sizes around the
//         *anchor* (keeps the shape bounded), and
//       - lies within the adjacency distance of the *member being expanded*
//         (keeps the growth contiguous).
// 3.  **Density Cap**: optionally, a row (exact y-coordinate) may hold only so
//     many members and the cluster may span only so many rows. This keeps
//     32-module patterns block-shaped instead of running along a dense row.
// 4.  **Termination**: growth stops when the frontier drains or the capacity
//     is reached.
// 5.  **Stateless Utility**: building reads the table and returns a new
//     `Cluster`; nothing outside the returned value is touched, so anchors can
//     be built in any order or in parallel.

use crate::core_modules::logic_cluster::Cluster;
use crate::core_modules::module::{Module, ModuleTable, Point, RowKey};
use crate::error::ClusterError;
use std::collections::{BTreeMap, HashSet, VecDeque};

/// Per-row occupancy limits for a cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DensityCap {
    pub max_per_row: usize,
    pub max_rows: usize,
}

impl DensityCap {
    /// The limits used for 32-module logic: at most 4 modules on 8 rows.
    pub const SMALL_LOGIC: DensityCap = DensityCap {
        max_per_row: 4,
        max_rows: 8,
    };
}

/// Everything the builder needs besides the anchor and the table.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterParams {
    pub capacity: usize,
    /// Anchor box half-width, in multiples of `nominal_size`.
    pub cut_x: f64,
    /// Anchor box half-height, in multiples of `nominal_size`.
    pub cut_y: f64,
    pub nominal_size: f64,
    /// Maximum center distance (mm) between a member and a module it pulls in.
    pub neighbor_distance: f64,
    pub density: Option<DensityCap>,
}

impl ClusterParams {
    /// Study defaults for a capacity: a 4x4 nominal box, 1.5 nominal adjacency,
    /// and the row cap only for 32-module logic.
    pub fn for_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            cut_x: 4.0,
            cut_y: 4.0,
            nominal_size: 42.0,
            neighbor_distance: 1.5 * 42.0,
            density: (capacity == 32).then_some(DensityCap::SMALL_LOGIC),
        }
    }

    pub fn reach_x(&self) -> f64 {
        self.cut_x * self.nominal_size
    }

    pub fn reach_y(&self) -> f64 {
        self.cut_y * self.nominal_size
    }

    /// Whether `point` lies strictly inside the anchor box.
    pub fn within_box(&self, anchor: Point, point: Point) -> bool {
        (point.x - anchor.x).abs() < self.reach_x() && (point.y - anchor.y).abs() < self.reach_y()
    }
}

/// Tracks how many members sit on each row.
struct RowOccupancy {
    cap: Option<DensityCap>,
    rows: BTreeMap<RowKey, usize>,
}

impl RowOccupancy {
    fn new(cap: Option<DensityCap>) -> Self {
        Self {
            cap,
            rows: BTreeMap::new(),
        }
    }

    fn admits(&self, row: RowKey) -> bool {
        let Some(cap) = self.cap else {
            return true;
        };
        match self.rows.get(&row) {
            Some(count) => *count < cap.max_per_row,
            None => self.rows.len() < cap.max_rows && cap.max_per_row >= 1,
        }
    }

    fn record(&mut self, row: RowKey) {
        *self.rows.entry(row).or_insert(0) += 1;
    }
}

pub mod cluster_builder {
    use super::*;
    use tracing::{debug, warn};

    /// The module nearest to `anchor`; ties go to the lowest id.
    pub fn select_seed(table: &ModuleTable, anchor: Point) -> Option<&Module> {
        let mut best: Option<(&Module, f64)> = None;
        for module in table.iter() {
            let distance = anchor.distance(&module.center);
            // Strict comparison keeps the first (lowest id) of equidistant modules.
            if best.is_none_or(|(_, d)| distance < d) {
                best = Some((module, distance));
            }
        }
        best.map(|(module, _)| module)
    }

    /// Grows one cluster around `anchor`.
    pub fn build_cluster(
        anchor: Point,
        anchor_node_index: usize,
        table: &ModuleTable,
        params: &ClusterParams,
    ) -> Result<Cluster, ClusterError> {
        // --- 1. Seed Selection ---
        let seed = select_seed(table, anchor).ok_or(ClusterError::EmptyInput)?;
        if !params.within_box(anchor, seed.center) {
            warn!(
                node = anchor_node_index,
                seed = seed.id,
                "seed lies outside the anchor box; keeping it so the cluster is not empty"
            );
        }

        let mut members: Vec<Module> = Vec::with_capacity(params.capacity.max(1));
        let mut taken: HashSet<u32> = HashSet::new();
        let mut occupancy = RowOccupancy::new(params.density);
        let mut frontier: VecDeque<Point> = VecDeque::new();

        members.push(seed.clone());
        taken.insert(seed.id);
        occupancy.record(seed.row_key());
        frontier.push_back(seed.center);

        // --- 2. Frontier Expansion ---
        while let Some(current) = frontier.pop_front() {
            if members.len() >= params.capacity {
                break;
            }

            for candidate in table.iter() {
                if members.len() >= params.capacity {
                    break;
                }
                if taken.contains(&candidate.id) {
                    continue;
                }
                if !params.within_box(anchor, candidate.center) {
                    continue;
                }
                if current.distance(&candidate.center) >= params.neighbor_distance {
                    continue;
                }

                // --- 3. Density Cap ---
                let row = candidate.row_key();
                if !occupancy.admits(row) {
                    continue;
                }

                occupancy.record(row);
                taken.insert(candidate.id);
                members.push(candidate.clone());
                frontier.push_back(candidate.center);
            }
        }

        // --- 4. Invariant Check ---
        if members.len() > params.capacity {
            return Err(ClusterError::CapacityViolation {
                len: members.len(),
                capacity: params.capacity,
            });
        }

        debug!(
            node = anchor_node_index,
            seed = seed.id,
            members = members.len(),
            capacity = params.capacity,
            "cluster grown"
        );
        Ok(Cluster::from_members(anchor_node_index, anchor, params.capacity, members))
    }
}
