// THEORY:
// This file is the entry point for the `ecal_trigger` library crate. It exposes
// the trigger-logic engine for a segmented electromagnetic calorimeter: a table
// of square modules of three sizes, a lattice of virtual sampling nodes laid
// over it, and the bounded "logic" clusters grown around those nodes.
//
// The high-level interface is `TriggerPipeline` (and its concurrent twin
// `ParallelPipeline`), configured by a `PipelineConfig` and returning one
// `PipelineOutput` per run. The stage implementations live in `core_modules`
// and are public so that the viewer can draw intermediate results.

pub mod config;
pub mod core_modules;
pub mod error;
pub mod parallel_pipeline;
pub mod pipeline;
pub mod summary;

pub use crate::config::{AnchorSelection, DensityMode, LogicConfig, PipelineConfig};
pub use crate::core_modules::logic_cluster::{Cluster, ClusterCollection};
pub use crate::core_modules::module::{Module, ModuleTable, Point, SizeClass};
pub use crate::parallel_pipeline::ParallelPipeline;
pub use crate::pipeline::{PipelineOutput, TriggerPipeline};
pub use crate::summary::DetectorSummary;
