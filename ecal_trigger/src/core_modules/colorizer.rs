// THEORY:
// Colors are purely informational. Each cluster gets one dim base color from a
// fixed palette, cycled by cluster index. A module claimed by several clusters
// is painted with the saturating sum of all their base colors, so overlapping
// logic lights up brighter the more patterns share a tile.
//
// The blend for a module depends only on *which* clusters hold it, never on
// the order they are compared in, so every cluster that holds the module
// records the same color for it.

use crate::core_modules::logic_cluster::ClusterCollection;
use std::collections::BTreeMap;
use std::ops::Add;
use tracing::info;

/// An 8-bit RGBA color. `+` saturates per channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }
}

impl Add for Rgba {
    type Output = Rgba;

    fn add(self, other: Rgba) -> Rgba {
        Rgba {
            r: self.r.saturating_add(other.r),
            g: self.g.saturating_add(other.g),
            b: self.b.saturating_add(other.b),
            a: self.a.saturating_add(other.a),
        }
    }
}

/// Fill colors for cluster members: yellow, green, cyan, red, blue, green.
pub const LOGIC_PALETTE: [Rgba; 6] = [
    Rgba::rgb(51, 51, 0),
    Rgba::rgb(0, 51, 0),
    Rgba::rgb(0, 51, 51),
    Rgba::rgb(51, 0, 0),
    Rgba::rgb(0, 0, 51),
    Rgba::rgb(0, 51, 0),
];

/// Line colors for outlines: yellow, green, cyan, red, blue, green, magenta.
pub const BORDER_PALETTE: [Rgba; 7] = [
    Rgba::rgb(255, 255, 0),
    Rgba::rgb(0, 255, 0),
    Rgba::rgb(0, 255, 255),
    Rgba::rgb(255, 0, 0),
    Rgba::rgb(0, 0, 255),
    Rgba::rgb(0, 255, 0),
    Rgba::rgb(255, 0, 255),
];

pub fn base_color(cluster_index: usize) -> Rgba {
    LOGIC_PALETTE[cluster_index % LOGIC_PALETTE.len()]
}

pub fn border_color(cluster_index: usize) -> Rgba {
    BORDER_PALETTE[cluster_index % BORDER_PALETTE.len()]
}

/// The fill color of every member of one cluster.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterColors {
    pub base: Rgba,
    members: BTreeMap<u32, Rgba>,
}

impl ClusterColors {
    /// Color of a member, or `None` if the module is not in this cluster.
    pub fn color_of(&self, module_id: u32) -> Option<Rgba> {
        self.members.get(&module_id).copied()
    }

    /// Members whose color differs from the base, i.e. shared with another cluster.
    pub fn overlapping(&self) -> impl Iterator<Item = (u32, Rgba)> + '_ {
        let base = self.base;
        self.members
            .iter()
            .filter(move |(_, color)| **color != base)
            .map(|(id, color)| (*id, *color))
    }
}

/// Colors for the whole collection, indexed like the clusters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OverlapColors {
    clusters: Vec<ClusterColors>,
    shared_modules: usize,
}

impl OverlapColors {
    pub fn cluster(&self, cluster_index: usize) -> Option<&ClusterColors> {
        self.clusters.get(cluster_index)
    }

    pub fn color(&self, cluster_index: usize, module_id: u32) -> Option<Rgba> {
        self.cluster(cluster_index)?.color_of(module_id)
    }

    /// Number of distinct modules held by two or more clusters.
    pub fn shared_modules(&self) -> usize {
        self.shared_modules
    }

    pub fn len(&self) -> usize {
        self.clusters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }
}

/// Assigns base colors and blends every module shared between clusters.
pub fn colorize(clusters: &ClusterCollection) -> OverlapColors {
    // --- 1. Occurrence Index ---
    // module id -> indices of the clusters that hold it
    let mut holders: BTreeMap<u32, Vec<usize>> = BTreeMap::new();
    for (index, cluster) in clusters.iter().enumerate() {
        for id in cluster.module_ids() {
            holders.entry(id).or_default().push(index);
        }
    }

    // --- 2. Blending ---
    let blended: BTreeMap<u32, Rgba> = holders
        .iter()
        .filter(|(_, indices)| indices.len() > 1)
        .map(|(id, indices)| {
            let color = indices
                .iter()
                .map(|&index| base_color(index))
                .fold(Rgba::rgba(0, 0, 0, 0), |acc, c| acc + c);
            (*id, color)
        })
        .collect();

    // --- 3. Per-Cluster Assignment ---
    let colors: Vec<ClusterColors> = clusters
        .iter()
        .enumerate()
        .map(|(index, cluster)| {
            let base = base_color(index);
            let members = cluster
                .module_ids()
                .map(|id| (id, blended.get(&id).copied().unwrap_or(base)))
                .collect();
            ClusterColors { base, members }
        })
        .collect();

    info!(clusters = colors.len(), shared = blended.len(), "overlap colors assigned");
    OverlapColors {
        clusters: colors,
        shared_modules: blended.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::logic_cluster::Cluster;
    use crate::core_modules::module::{Module, Point, SizeClass};

    fn cluster(ids: &[u32]) -> Cluster {
        let members = ids
            .iter()
            .map(|&id| Module::new(id, Point::new(id as f64 * 42.0, 0.0), SizeClass::S42))
            .collect();
        Cluster::from_members(0, Point::default(), 64, members)
    }

    #[test]
    fn addition_saturates() {
        let sum = Rgba::rgb(200, 51, 0) + Rgba::rgb(100, 51, 0);
        assert_eq!(sum, Rgba::rgb(255, 102, 0));
    }

    #[test]
    fn isolated_clusters_keep_base_colors() {
        let clusters: ClusterCollection = vec![cluster(&[1, 2]), cluster(&[3, 4])].into_iter().collect();
        let colors = colorize(&clusters);
        assert_eq!(colors.color(0, 1), Some(LOGIC_PALETTE[0]));
        assert_eq!(colors.color(1, 4), Some(LOGIC_PALETTE[1]));
        assert_eq!(colors.color(1, 1), None);
        assert_eq!(colors.shared_modules(), 0);
    }

    #[test]
    fn shared_modules_blend_symmetrically() {
        let clusters: ClusterCollection =
            vec![cluster(&[1, 2, 3]), cluster(&[3, 4]), cluster(&[3, 4, 5])].into_iter().collect();
        let colors = colorize(&clusters);

        let triple = LOGIC_PALETTE[0] + LOGIC_PALETTE[1] + LOGIC_PALETTE[2];
        assert_eq!(colors.color(0, 3), Some(triple));
        assert_eq!(colors.color(1, 3), Some(triple));
        assert_eq!(colors.color(2, 3), Some(triple));

        let pair = LOGIC_PALETTE[1] + LOGIC_PALETTE[2];
        assert_eq!(colors.color(1, 4), colors.color(2, 4));
        assert_eq!(colors.color(1, 4), Some(pair));
        assert_eq!(colors.color(0, 1), Some(LOGIC_PALETTE[0]));
        assert_eq!(colors.shared_modules(), 2);

        let overlapping: Vec<u32> = colors.cluster(1).map(|c| c.overlapping().map(|(id, _)| id).collect()).unwrap_or_default();
        assert_eq!(overlapping, vec![3, 4]);
    }

    #[test]
    fn palettes_cycle_by_index() {
        assert_eq!(base_color(6), base_color(0));
        assert_eq!(border_color(7), border_color(0));
        assert_eq!(border_color(6), Rgba::rgb(255, 0, 255));
    }
}
