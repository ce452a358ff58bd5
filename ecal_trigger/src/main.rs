//! ecal_trigger - trigger-logic builder for the segmented calorimeter
//!
//! Usage:
//!   ecal_trigger run [--layout FILE] [--exclude FILE]... [--config FILE] [--report FILE]
//!   ecal_trigger inspect REPORT

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ecal_trigger::core_modules::layout_reader::{load_exclusions, load_layout};
use ecal_trigger::core_modules::report::{load_report, save_report};
use ecal_trigger::{DetectorSummary, ParallelPipeline, PipelineConfig, TriggerPipeline};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ecal_trigger", version, about = "Build trigger-logic clusters for the calorimeter")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Load a layout, grow the logic clusters and write the report
    Run {
        /// Module layout file (`type cell row col x y ncol` per line)
        #[arg(long, default_value = "ecal_layout.txt")]
        layout: PathBuf,

        /// Cell ids to remove before clustering; may be given more than once
        #[arg(long)]
        exclude: Vec<PathBuf>,

        /// TOML configuration; defaults apply when omitted
        #[arg(long)]
        config: Option<PathBuf>,

        /// Where to write the cluster report
        #[arg(short, long)]
        report: Option<PathBuf>,

        /// Build clusters on all CPUs
        #[arg(long)]
        parallel: bool,

        /// Worker count for --parallel (defaults to the number of CPUs)
        #[arg(long, requires = "parallel")]
        workers: Option<usize>,

        /// Print the detector summary
        #[arg(long)]
        summary: bool,
    },
    /// Read a report back and count the modules it covers
    Inspect {
        report: PathBuf,
    },
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&Path>) -> Result<PipelineConfig> {
    match path {
        Some(path) => {
            PipelineConfig::load(path).with_context(|| format!("Failed to load config {}", path.display()))
        }
        None => Ok(PipelineConfig::default()),
    }
}

#[allow(clippy::too_many_arguments)]
async fn run(
    layout: &Path,
    exclude: &[PathBuf],
    config: Option<&Path>,
    report: Option<&Path>,
    parallel: bool,
    workers: Option<usize>,
    summary: bool,
) -> Result<()> {
    let config = load_config(config)?;

    let load = load_layout(layout, &config.layout)
        .with_context(|| format!("Failed to load layout {}", layout.display()))?;
    if !load.skipped.is_empty() {
        warn!(skipped = load.skipped.len(), "some layout records were skipped");
    }

    let mut excluded = BTreeSet::new();
    for path in exclude {
        let list = load_exclusions(path).with_context(|| format!("Failed to load exclusions {}", path.display()))?;
        excluded.extend(list.cells);
    }
    let table = if excluded.is_empty() {
        load.table
    } else {
        let region = load.table.excluding(&excluded);
        info!(excluded = excluded.len(), remaining = region.len(), "exclusions applied");
        region
    };

    let output = if parallel {
        let mut pipeline = ParallelPipeline::new(config.clone()).context("Invalid pipeline configuration")?;
        if let Some(workers) = workers {
            pipeline = pipeline.with_workers(workers);
        }
        pipeline.run(Arc::new(table.clone())).await?
    } else {
        TriggerPipeline::new(config.clone())
            .context("Invalid pipeline configuration")?
            .run(&table)?
    };

    if summary {
        println!("{}", DetectorSummary::new(&table, &config.grid, &output.nodes));
    }

    println!(
        "{} clusters over {} sampling nodes, {} modules covered, {} shared",
        output.clusters.len(),
        output.nodes.len(),
        output.clusters.covered_modules().len(),
        output.colors.shared_modules()
    );

    if let Some(path) = report {
        save_report(path, &table, &output.clusters, &config.layout)
            .with_context(|| format!("Failed to write report {}", path.display()))?;
        println!("Report written to {}", path.display());
    }
    Ok(())
}

fn inspect(path: &Path) -> Result<()> {
    let report = load_report(path).with_context(|| format!("Failed to read report {}", path.display()))?;
    println!("Clusters: {}", report.sections.len());
    println!("Rows: {}", report.total_rows());
    println!("Number of unique modules used: {}", report.unique_cells().len());
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();

    match cli.command {
        Command::Run {
            layout,
            exclude,
            config,
            report,
            parallel,
            workers,
            summary,
        } => {
            run(
                &layout,
                &exclude,
                config.as_deref(),
                report.as_deref(),
                parallel,
                workers,
                summary,
            )
            .await
        }
        Command::Inspect { report } => inspect(&report),
    }
}
