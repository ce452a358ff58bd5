//! ecal_viewer - draw the calorimeter and its trigger logic to a PNG
//!
//! Usage:
//!   ecal_viewer [--layout FILE] [--exclude FILE]... [--config FILE] [--show TOGGLE,...] OUTPUT

use anyhow::{Context, Result, bail};
use clap::Parser;
use ecal_trigger::core_modules::layout_reader::{load_exclusions, load_layout};
use ecal_trigger::{PipelineConfig, TriggerPipeline};
use ecal_viewer::canvas::save_png;
use ecal_viewer::{RenderOptions, Scene, ViewState, ViewToggle, render};
use std::collections::BTreeSet;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ecal_viewer", version, about = "Render calorimeter trigger logic to PNG")]
struct Cli {
    /// PNG file to write
    output: PathBuf,

    /// Module layout file
    #[arg(long, default_value = "ecal_layout.txt")]
    layout: PathBuf,

    /// Cell ids to remove before clustering; may be given more than once
    #[arg(long)]
    exclude: Vec<PathBuf>,

    /// TOML configuration; defaults apply when omitted
    #[arg(long)]
    config: Option<PathBuf>,

    /// View toggles to switch on
    #[arg(long, value_enum, value_delimiter = ',')]
    show: Vec<ViewToggle>,

    /// Pixels per millimetre
    #[arg(long, default_value_t = 1.0)]
    scale: f64,
}

/// Largest picture the viewer will allocate, in pixels.
const MAX_PIXELS: u64 = 1 << 28;

fn check_scale(scale: f64) -> Result<f64> {
    if !scale.is_finite() || scale <= 0.0 {
        bail!("--scale must be a positive number of pixels per mm, got {scale}");
    }
    Ok(scale)
}

fn check_size((width, height): (u64, u64)) -> Result<()> {
    if width.saturating_mul(height) > MAX_PIXELS {
        bail!("a {width} x {height} picture is too large; lower --scale");
    }
    Ok(())
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();
    let scale = check_scale(cli.scale)?;

    let config = match &cli.config {
        Some(path) => {
            PipelineConfig::load(path).with_context(|| format!("Failed to load config {}", path.display()))?
        }
        None => PipelineConfig::default(),
    };

    let load = load_layout(&cli.layout, &config.layout)
        .with_context(|| format!("Failed to load layout {}", cli.layout.display()))?;
    let mut excluded = BTreeSet::new();
    for path in &cli.exclude {
        let list = load_exclusions(path).with_context(|| format!("Failed to load exclusions {}", path.display()))?;
        excluded.extend(list.cells);
    }
    let table = load.table.excluding(&excluded);

    let output = TriggerPipeline::new(config)
        .context("Invalid pipeline configuration")?
        .run(&table)?;

    let options = RenderOptions {
        scale,
        ..RenderOptions::default()
    };
    let scene = Scene {
        table: &table,
        output: &output,
    };
    check_size(scene.image_size(&options))?;
    let image = render(&scene, &ViewState::with(&cli.show), &options);
    save_png(&image, &cli.output).with_context(|| format!("Failed to write {}", cli.output.display()))?;
    info!(path = %cli.output.display(), width = image.width(), height = image.height(), "image written");
    Ok(())
}
