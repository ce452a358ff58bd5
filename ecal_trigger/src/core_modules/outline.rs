// THEORY:
// The outline extractor turns a frozen cluster into a polyline that hugs its
// boundary, for visual inspection of the logic patterns.
//
// Algorithm steps:
// 1.  **Row Grouping**: members are bucketed by their exact y-coordinate. Each
//     bucket becomes a `RowExtent` holding the min/max member centers and the
//     outer edges (center -/+ half that member's size).
// 2.  **Edges**: rows are visited in ascending y. The first row gets a top edge,
//     the last row a bottom edge, and every row a left and a right vertical
//     edge over its own height.
// 3.  **Stitching**: between consecutive rows, the lower corners of one row are
//     joined to the upper corners of the next. On a jagged cluster these joins
//     close the boundary where row widths differ.
// 4.  **Display Offset**: outlines of neighboring clusters lie on top of each
//     other. Each cluster's segments are shifted by a tiny offset picked by its
//     index. The offset only touches emitted segments; `rows` stays exact.

use crate::core_modules::colorizer::{Rgba, border_color};
use crate::core_modules::logic_cluster::{Cluster, ClusterCollection};
use crate::core_modules::module::{Module, Point, RowKey};
use std::collections::BTreeMap;
use tracing::debug;

/// Offsets (mm) cycled through by cluster index.
pub const OUTLINE_OFFSETS: [f64; 2] = [0.0, 1.0];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment {
    pub start: Point,
    pub end: Point,
    pub color: Rgba,
}

/// Horizontal extent of one row of a cluster.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RowExtent {
    pub y: f64,
    /// Smallest and largest member center x.
    pub min_x: f64,
    pub max_x: f64,
    /// Outer edges: the extreme members' centers pushed out by their half sizes.
    pub left: f64,
    pub right: f64,
    /// Largest half size in the row; sets the row's vertical extent.
    pub half_size: f64,
    pub count: usize,
}

impl RowExtent {
    fn from_members(y: f64, members: &[&Module]) -> Option<Self> {
        let first = members.first()?;
        let mut row = RowExtent {
            y,
            min_x: first.center.x,
            max_x: first.center.x,
            left: first.center.x - first.half_size(),
            right: first.center.x + first.half_size(),
            half_size: first.half_size(),
            count: members.len(),
        };
        for module in &members[1..] {
            row.min_x = row.min_x.min(module.center.x);
            row.max_x = row.max_x.max(module.center.x);
            row.left = row.left.min(module.center.x - module.half_size());
            row.right = row.right.max(module.center.x + module.half_size());
            row.half_size = row.half_size.max(module.half_size());
        }
        Some(row)
    }

    pub fn top(&self) -> f64 {
        self.y - self.half_size
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.half_size
    }

    /// A row with a single member has no interior horizontal extent.
    pub fn is_single_point(&self) -> bool {
        self.count == 1
    }
}

/// Boundary of one cluster.
#[derive(Debug, Clone, PartialEq)]
pub struct Outline {
    pub cluster_index: usize,
    pub color: Rgba,
    pub offset: f64,
    pub rows: Vec<RowExtent>,
    pub segments: Vec<Segment>,
}

/// Buckets members by exact y and returns the rows in ascending y.
pub fn row_extents(cluster: &Cluster) -> Vec<RowExtent> {
    let mut buckets: BTreeMap<RowKey, Vec<&Module>> = BTreeMap::new();
    for module in cluster.members() {
        buckets.entry(module.row_key()).or_default().push(module);
    }
    buckets
        .iter()
        .filter_map(|(key, members)| RowExtent::from_members(key.y(), members))
        .collect()
}

pub fn extract_outline(cluster_index: usize, cluster: &Cluster) -> Outline {
    let rows = row_extents(cluster);
    let color = border_color(cluster_index);
    let offset = OUTLINE_OFFSETS[cluster_index % OUTLINE_OFFSETS.len()];

    let shifted = |x: f64, y: f64| Point::new(x - offset, y - offset);
    let segment = |start: Point, end: Point| Segment { start, end, color };

    let mut segments = Vec::with_capacity(rows.len() * 4 + 2);
    let last = rows.len().saturating_sub(1);

    for (i, row) in rows.iter().enumerate() {
        // top
        if i == 0 {
            segments.push(segment(shifted(row.right, row.top()), shifted(row.left, row.top())));
        }
        // bottom
        if i == last {
            segments.push(segment(shifted(row.right, row.bottom()), shifted(row.left, row.bottom())));
        }
        // right and left sides of this row
        segments.push(segment(shifted(row.right, row.top()), shifted(row.right, row.bottom())));
        segments.push(segment(shifted(row.left, row.top()), shifted(row.left, row.bottom())));

        // stitches down to the next row
        if let Some(next) = rows.get(i + 1) {
            segments.push(segment(shifted(row.right, row.bottom()), shifted(next.right, next.top())));
            segments.push(segment(shifted(row.left, row.bottom()), shifted(next.left, next.top())));
        }
    }

    debug!(cluster = cluster_index, rows = rows.len(), segments = segments.len(), "outline extracted");
    Outline {
        cluster_index,
        color,
        offset,
        rows,
        segments,
    }
}

pub fn extract_outlines(clusters: &ClusterCollection) -> Vec<Outline> {
    clusters
        .iter()
        .enumerate()
        .map(|(index, cluster)| extract_outline(index, cluster))
        .collect()
}
