// THEORY:
// The `pipeline` module is the top-level API of the trigger-logic engine. It
// runs the full stack over one module table and hands back everything a
// consumer (the CLI, the viewer, a test) needs in a single `PipelineOutput`.
//
// Stages, in fixed order:
// 1.  **Node Grid**: lay the sampling lattice over the table.
// 2.  **Anchor Selection**: pick the nodes that get a cluster. Requested
//     indices that do not exist are logged and skipped.
// 3.  **Cluster Building**: grow one cluster per anchor. A failure aborts the
//     run and names the cluster and node it happened at.
// 4.  **Overlap Colors**: blend the colors of shared modules.
// 5.  **Outlines**: extract one boundary per cluster.
//
// The pipeline keeps no state between runs. Running it twice over the same
// table gives two equal outputs.

use crate::config::PipelineConfig;
use crate::core_modules::cluster_builder::{ClusterParams, cluster_builder};
use crate::core_modules::colorizer::{OverlapColors, colorize};
use crate::core_modules::logic_cluster::{Cluster, ClusterCollection};
use crate::core_modules::module::ModuleTable;
use crate::core_modules::node_grid::{NodeGrid, SamplingNode, generate_nodes};
use crate::core_modules::outline::{Outline, extract_outlines};
use crate::error::PipelineError;
use std::ops::Range;
use tracing::{info, warn};

/// Everything one run produced.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOutput {
    pub nodes: NodeGrid,
    /// Node indices of the anchors, in processing order.
    pub anchors: Vec<usize>,
    /// Spans of requested anchor indices that did not exist.
    pub skipped_anchors: Vec<Range<usize>>,
    pub clusters: ClusterCollection,
    pub colors: OverlapColors,
    pub outlines: Vec<Outline>,
}

impl PipelineOutput {
    pub fn nodes(&self) -> &[SamplingNode] {
        &self.nodes.nodes
    }

    pub fn clusters(&self) -> &ClusterCollection {
        &self.clusters
    }

    pub fn colors(&self) -> &OverlapColors {
        &self.colors
    }

    pub fn outlines(&self) -> &[Outline] {
        &self.outlines
    }
}

/// Nodes plus the anchors chosen from them.
pub(crate) struct AnchorPlan {
    pub nodes: NodeGrid,
    pub anchors: Vec<SamplingNode>,
    pub skipped: Vec<Range<usize>>,
}

/// The sequential trigger-logic pipeline.
#[derive(Debug, Clone)]
pub struct TriggerPipeline {
    config: PipelineConfig,
    params: ClusterParams,
}

impl TriggerPipeline {
    pub fn new(config: PipelineConfig) -> Result<Self, PipelineError> {
        config.validate()?;
        let params = config.logic.cluster_params();
        Ok(Self { config, params })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn params(&self) -> &ClusterParams {
        &self.params
    }

    pub fn run(&self, table: &ModuleTable) -> Result<PipelineOutput, PipelineError> {
        // Stages 1 and 2: Node Grid and Anchor Selection
        let plan = self.plan(table)?;

        // Stage 3: Cluster Building
        let clusters = plan
            .anchors
            .iter()
            .enumerate()
            .map(|(cluster_index, node)| build_for_anchor(cluster_index, node, table, &self.params))
            .collect::<Result<ClusterCollection, _>>()?;

        // Stages 4 and 5
        Ok(assemble(plan, clusters))
    }

    pub(crate) fn plan(&self, table: &ModuleTable) -> Result<AnchorPlan, PipelineError> {
        if table.is_empty() {
            return Err(PipelineError::EmptyTable);
        }

        let nodes = generate_nodes(table, &self.config.grid);
        let (selected, skipped) = self.config.anchors.select(&nodes.nodes);
        for span in &skipped {
            warn!(
                first = span.start,
                end = span.end,
                available = nodes.len(),
                "anchor indices out of range, skipping"
            );
        }
        let anchors: Vec<SamplingNode> = selected.into_iter().cloned().collect();
        info!(
            modules = table.len(),
            nodes = nodes.len(),
            anchors = anchors.len(),
            skipped = skipped.iter().map(|span| span.len()).fold(0usize, usize::saturating_add),
            "anchors selected"
        );
        Ok(AnchorPlan {
            nodes,
            anchors,
            skipped,
        })
    }
}

/// Grows the cluster for one anchor and attaches the anchor to any failure.
pub(crate) fn build_for_anchor(
    cluster_index: usize,
    node: &SamplingNode,
    table: &ModuleTable,
    params: &ClusterParams,
) -> Result<Cluster, PipelineError> {
    cluster_builder::build_cluster(node.position, node.index, table, params).map_err(|source| {
        PipelineError::Cluster {
            cluster_index,
            node_index: node.index,
            x: node.position.x,
            y: node.position.y,
            source,
        }
    })
}

/// Runs the read-only stages over finished clusters.
pub(crate) fn assemble(plan: AnchorPlan, clusters: ClusterCollection) -> PipelineOutput {
    let covered = clusters.covered_modules().len();
    info!(clusters = clusters.len(), covered, "clusters built");

    let colors = colorize(&clusters);
    let outlines = extract_outlines(&clusters);

    PipelineOutput {
        nodes: plan.nodes,
        anchors: plan.anchors.iter().map(|node| node.index).collect(),
        skipped_anchors: plan.skipped,
        clusters,
        colors,
        outlines,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnchorSelection;
    use crate::core_modules::module::{Point, SizeClass};
    use crate::core_modules::test_support::uniform_grid;
    use crate::error::ClusterError;

    #[test]
    fn default_run_over_uniform_grid() {
        let table = uniform_grid(10, 10, SizeClass::S42);
        let pipeline = TriggerPipeline::new(PipelineConfig::default()).expect("valid config");
        let output = pipeline.run(&table).expect("pipeline runs");

        assert_eq!(output.nodes().len(), 4);
        assert_eq!(output.anchors, vec![0, 1, 2, 3]);
        assert_eq!(output.clusters().len(), 4);
        assert_eq!(output.colors().len(), 4);
        assert_eq!(output.outlines().len(), 4);
        assert!(output.clusters().is_consistent_with(&table));

        // The box around (126, 126) holds a 7 x 7 block of tiles.
        let first = output.clusters().get(0).expect("first cluster");
        assert_eq!(first.len(), 49);
        assert_eq!(first.anchor, Point::new(126.0, 126.0));
        assert!(output.colors().shared_modules() > 0);
    }

    #[test]
    fn runs_are_independent_and_equal() {
        let table = uniform_grid(9, 12, SizeClass::S40);
        let pipeline = TriggerPipeline::new(PipelineConfig::default()).expect("valid config");
        let first = pipeline.run(&table).expect("first run");
        let second = pipeline.run(&table).expect("second run");
        assert_eq!(first, second);
    }

    #[test]
    fn open_ended_range_runs_the_nodes_that_exist() {
        let table = uniform_grid(10, 10, SizeClass::S42);
        let text = "[anchors]\nmode = \"range\"\nstart = 2\nend = 9223372036854775807\n";
        let config = PipelineConfig::from_toml_str(text).expect("valid config");
        let output = TriggerPipeline::new(config).expect("valid config").run(&table).expect("pipeline runs");
        assert_eq!(output.nodes.len(), 4);
        assert_eq!(output.anchors, vec![2, 3]);
        assert_eq!(output.skipped_anchors, vec![4..9223372036854775807]);
        assert_eq!(output.clusters.len(), 2);
    }

    #[test]
    fn out_of_range_anchors_are_skipped() {
        let table = uniform_grid(10, 10, SizeClass::S42);
        let config = PipelineConfig {
            anchors: AnchorSelection::Explicit { indices: vec![3, 7, 1] },
            ..PipelineConfig::default()
        };
        let output = TriggerPipeline::new(config).expect("valid config").run(&table).expect("pipeline runs");
        assert_eq!(output.anchors, vec![3, 1]);
        assert_eq!(output.skipped_anchors, vec![7..8]);
        let nodes: Vec<usize> = output.clusters().iter().map(|c| c.anchor_node_index).collect();
        assert_eq!(nodes, vec![3, 1]);
    }

    #[test]
    fn empty_table_is_rejected() {
        let pipeline = TriggerPipeline::new(PipelineConfig::default()).expect("valid config");
        assert!(matches!(pipeline.run(&ModuleTable::new()), Err(PipelineError::EmptyTable)));
    }

    #[test]
    fn invalid_config_is_rejected() {
        let mut config = PipelineConfig::default();
        config.logic.capacity = 0;
        assert!(matches!(TriggerPipeline::new(config), Err(PipelineError::Config(_))));
    }

    #[test]
    fn cluster_failures_name_their_anchor() {
        let table = uniform_grid(3, 3, SizeClass::S42);
        let node = SamplingNode {
            index: 5,
            position: Point::new(42.0, 42.0),
            lattice_point: Point::new(40.0, 40.0),
            module_id: Some(4),
        };
        let params = ClusterParams {
            capacity: 0,
            ..ClusterParams::for_capacity(64)
        };
        match build_for_anchor(2, &node, &table, &params) {
            Err(PipelineError::Cluster {
                cluster_index,
                node_index,
                source,
                ..
            }) => {
                assert_eq!((cluster_index, node_index), (2, 5));
                assert_eq!(source, ClusterError::CapacityViolation { len: 1, capacity: 0 });
            }
            other => panic!("expected a cluster failure, got {other:?}"),
        }
    }
}
