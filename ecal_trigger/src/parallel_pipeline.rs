// THEORY:
// Building a cluster only reads the module table, so anchors are independent
// and can be grown concurrently. The parallel pipeline shares the table
// through an `Arc`, deals the anchors out into one batch per worker, builds
// every batch on a blocking task, and puts the clusters back into anchor
// order before the read-only stages run. Its output is identical to the
// sequential `TriggerPipeline`.

use crate::config::PipelineConfig;
use crate::core_modules::cluster_builder::ClusterParams;
use crate::core_modules::logic_cluster::{Cluster, ClusterCollection};
use crate::core_modules::module::ModuleTable;
use crate::core_modules::node_grid::SamplingNode;
use crate::error::PipelineError;
use crate::pipeline::{PipelineOutput, TriggerPipeline, assemble, build_for_anchor};
use futures::future::try_join_all;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// One worker's share: `(cluster index, anchor)` pairs.
type Batch = Vec<(usize, SamplingNode)>;

pub struct ParallelPipeline {
    pipeline: TriggerPipeline,
    workers: usize,
}

impl ParallelPipeline {
    pub fn new(config: PipelineConfig) -> Result<Self, PipelineError> {
        Ok(Self {
            pipeline: TriggerPipeline::new(config)?,
            workers: num_cpus::get().max(1),
        })
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn config(&self) -> &PipelineConfig {
        self.pipeline.config()
    }

    pub async fn run(&self, table: Arc<ModuleTable>) -> Result<PipelineOutput, PipelineError> {
        let plan = self.pipeline.plan(&table)?;

        // --- 1. Batching ---
        // Round-robin keeps neighboring anchors, which cost about the same, on different workers.
        let mut batches: Vec<Batch> = vec![Vec::new(); self.workers.min(plan.anchors.len()).max(1)];
        let batch_count = batches.len();
        for (cluster_index, node) in plan.anchors.iter().enumerate() {
            batches[cluster_index % batch_count].push((cluster_index, node.clone()));
        }

        // --- 2. Concurrent Building ---
        let tasks = batches.into_iter().enumerate().map(|(worker, batch)| {
            let table = Arc::clone(&table);
            let params = self.pipeline.params().clone();
            tokio::task::spawn_blocking(move || build_batch(worker, batch, &table, &params))
        });
        let finished = try_join_all(tasks).await?;

        // --- 3. Reassembly ---
        let mut pending: BTreeMap<usize, Cluster> = BTreeMap::new();
        for batch in finished {
            pending.extend(batch?);
        }
        let clusters: ClusterCollection = pending.into_values().collect();

        Ok(assemble(plan, clusters))
    }
}

fn build_batch(
    worker: usize,
    batch: Batch,
    table: &ModuleTable,
    params: &ClusterParams,
) -> Result<Vec<(usize, Cluster)>, PipelineError> {
    let built = batch
        .iter()
        .map(|(cluster_index, node)| {
            build_for_anchor(*cluster_index, node, table, params).map(|cluster| (*cluster_index, cluster))
        })
        .collect::<Result<Vec<_>, _>>()?;
    debug!(worker, clusters = built.len(), "batch built");
    Ok(built)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnchorSelection;
    use crate::core_modules::module::SizeClass;
    use crate::core_modules::test_support::uniform_grid;

    fn config() -> PipelineConfig {
        let mut config = PipelineConfig::default();
        config.grid.increment_x = 60.0;
        config.grid.increment_y = 60.0;
        config.logic.capacity = 32;
        config
    }

    #[tokio::test]
    async fn matches_sequential_output() {
        let table = uniform_grid(14, 11, SizeClass::S40);
        let sequential = TriggerPipeline::new(config()).expect("valid config").run(&table).expect("sequential run");
        assert!(sequential.clusters().len() > 8);

        for workers in [1, 3, 8] {
            let parallel = ParallelPipeline::new(config())
                .expect("valid config")
                .with_workers(workers)
                .run(Arc::new(table.clone()))
                .await
                .expect("parallel run");
            assert_eq!(parallel, sequential, "{workers} workers");
        }
    }

    #[tokio::test]
    async fn skipped_anchors_are_reported() {
        let table = uniform_grid(10, 10, SizeClass::S42);
        let mut config = PipelineConfig::default();
        config.anchors = AnchorSelection::Range { start: 2, end: 6 };
        let output = ParallelPipeline::new(config)
            .expect("valid config")
            .run(Arc::new(table))
            .await
            .expect("parallel run");
        assert_eq!(output.anchors, vec![2, 3]);
        assert_eq!(output.skipped_anchors, vec![4..6]);
    }

    #[tokio::test]
    async fn empty_table_is_rejected() {
        let pipeline = ParallelPipeline::new(PipelineConfig::default()).expect("valid config");
        let result = pipeline.run(Arc::new(ModuleTable::new())).await;
        assert!(matches!(result, Err(PipelineError::EmptyTable)));
    }

    #[test]
    fn worker_count_is_at_least_one() {
        let pipeline = ParallelPipeline::new(PipelineConfig::default()).expect("valid config").with_workers(0);
        assert_eq!(pipeline.workers(), 1);
    }
}
