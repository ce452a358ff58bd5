// THEORY:
// Every failure the engine can report lives here. The split follows the stages
// of the pipeline: reading the layout, building a cluster, running the whole
// pipeline, loading configuration and reading back a report. Record-level
// parse problems are values (`InputParseError`) so the reader can log and skip
// them; everything else is fatal for the operation that produced it.

use std::path::PathBuf;
use thiserror::Error;

/// What was wrong with a single layout record.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseIssue {
    #[error("missing field `{0}`")]
    MissingField(&'static str),
    #[error("field `{field}` is not an integer: {token:?}")]
    InvalidNumber { field: &'static str, token: String },
    #[error("unknown module type {0} (expected 42, 40 or 38)")]
    UnknownSizeClass(i64),
    #[error("cell {0} already defined earlier in the file")]
    DuplicateCell(u32),
}

/// A malformed record in a layout or exclusion file. Recoverable: the record is skipped.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("line {line}: {issue}")]
pub struct InputParseError {
    pub line: usize,
    pub issue: ParseIssue,
}

/// Failures that stop a layout file from loading at all.
#[derive(Debug, Error)]
pub enum LayoutError {
    #[error("cannot read {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Failures of the cluster builder for a single anchor.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ClusterError {
    #[error("module table is empty, nothing to cluster")]
    EmptyInput,
    #[error("cluster holds {len} modules but its capacity is {capacity}")]
    CapacityViolation { len: usize, capacity: usize },
}

/// Failures of a pipeline run. Cluster failures carry the anchor they happened at.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid configuration")]
    Config(#[from] ConfigError),
    #[error("module table is empty")]
    EmptyTable,
    #[error("cluster {cluster_index} anchored at node {node_index} ({x:.1}, {y:.1}) failed")]
    Cluster {
        cluster_index: usize,
        node_index: usize,
        x: f64,
        y: f64,
        #[source]
        source: ClusterError,
    },
    #[error("cluster worker task failed")]
    Worker(#[from] tokio::task::JoinError),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("config is not valid TOML")]
    Toml(#[from] toml::de::Error),
    #[error("{0}")]
    Invalid(String),
}

/// Failures when reading an exported report back in.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("cannot read report {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("line {line}: {reason}")]
    Malformed { line: usize, reason: String },
}
