// THEORY:
// A `Cluster` (a "logic pattern") is the output of the spatial grouping stage:
// a bounded group of modules that one trigger sampling node aggregates. It is a
// plain data container with no memory of how it was grown. It
// is created by the cluster builder, then frozen; every later stage (colors,
// outlines, report) only borrows it.
//
// Members are stored as snapshots of the modules in insertion order. The order
// is the order the breadth-first growth accepted them, so two runs over the
// same table produce identical clusters member for member.

use crate::core_modules::module::{Module, ModuleTable, Point};
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq)]
pub struct Cluster {
    /// Index of the sampling node this cluster was grown from.
    pub anchor_node_index: usize,
    /// Position of that node.
    pub anchor: Point,
    /// Maximum number of members (32 or 64 in the detector study).
    pub capacity: usize,
    members: Vec<Module>,
}

impl Cluster {
    pub fn from_members(anchor_node_index: usize, anchor: Point, capacity: usize, members: Vec<Module>) -> Self {
        Self {
            anchor_node_index,
            anchor,
            capacity,
            members,
        }
    }

    /// Members in the order they were accepted; the seed comes first.
    pub fn members(&self) -> &[Module] {
        &self.members
    }

    pub fn seed(&self) -> Option<&Module> {
        self.members.first()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn contains(&self, module_id: u32) -> bool {
        self.members.iter().any(|m| m.id == module_id)
    }

    pub fn module_ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.members.iter().map(|m| m.id)
    }
}

/// Every cluster of one pipeline run, in anchor processing order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClusterCollection {
    clusters: Vec<Cluster>,
}

impl ClusterCollection {
    pub fn len(&self) -> usize {
        self.clusters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Cluster> {
        self.clusters.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Cluster> {
        self.clusters.iter()
    }

    /// Distinct module ids used by at least one cluster.
    pub fn covered_modules(&self) -> BTreeSet<u32> {
        self.clusters.iter().flat_map(|c| c.module_ids()).collect()
    }

    /// True when every member id of every cluster exists in `table`.
    pub fn is_consistent_with(&self, table: &ModuleTable) -> bool {
        self.clusters.iter().flat_map(|c| c.module_ids()).all(|id| table.contains(id))
    }
}

impl FromIterator<Cluster> for ClusterCollection {
    fn from_iter<I: IntoIterator<Item = Cluster>>(iter: I) -> Self {
        Self {
            clusters: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a ClusterCollection {
    type Item = &'a Cluster;
    type IntoIter = std::slice::Iter<'a, Cluster>;

    fn into_iter(self) -> Self::IntoIter {
        self.clusters.iter()
    }
}
