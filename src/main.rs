use std::{
    io::{self, Write},
    path::PathBuf,
};

use anyhow::Context;
use clap::Parser;
use config::TrainerConfig;
use data::{scan, ScanFailure, ScanReport};
use device::{DeviceProbe, DeviceProvider, WgpuProvider};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub mod config;
pub mod data;
pub mod device;
pub mod error;

/// Version of the burn runtime pinned in Cargo.toml.
const BURN_VERSION: &str = "0.15.0";

#[derive(Parser, Debug)]
#[command(name = "image-trainer")]
#[command(about = "Checks accelerators and the training image corpus", long_about = None)]
struct Cli {
    /// JSON trainer config to start from
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory holding the training images
    #[arg(short, long)]
    images_dir: Option<PathBuf>,

    /// Write the effective config to this file
    #[arg(long)]
    save_config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn setup_logging(verbose: bool) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "info" }));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .try_init()
        .context("failed to initialize logger")
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose)?;

    let mut config = match &cli.config {
        Some(path) => TrainerConfig::from_file(path)?,
        None => TrainerConfig::new(),
    };
    if let Some(images_dir) = cli.images_dir {
        config = config.with_images_dir(images_dir);
    }
    if let Some(path) = &cli.save_config {
        config.to_file(path)?;
        tracing::info!(path = %path.display(), "saved config");
    }

    let probe = DeviceProbe::new(WgpuProvider);
    run(&config, &probe, &mut io::stdout().lock()).context("failed to write report")?;

    Ok(())
}

fn run<P: DeviceProvider>(
    config: &TrainerConfig,
    probe: &DeviceProbe<P>,
    out: &mut impl Write,
) -> io::Result<()> {
    writeln!(out, "--- ML Trainer Script Starting ---")?;
    writeln!(out, "burn version: {BURN_VERSION}")?;

    write!(out, "{}", probe.initialize())?;

    let dir = config.images_dir.as_path();
    writeln!(out, "\nChecking for images in: {}", dir.display())?;
    let (report, failure) = match scan(dir) {
        Ok(report) => (report, None),
        Err(err) => (ScanReport::empty(dir), Some(err)),
    };
    match &failure {
        Some(err) => writeln!(out, "{}", ScanFailure(err))?,
        None => write!(out, "{report}")?,
    }
    tracing::info!(
        found = report.len(),
        readable = report.readable_count(),
        "corpus scan finished"
    );

    writeln!(out, "\n--- Placeholder Training Logic ---")?;
    writeln!(out, "This is where the actual model training code would go.")?;
    writeln!(
        out,
        "For example, loading data, preprocessing, defining a model, training, and saving."
    )?;

    writeln!(out, "\n--- ML Trainer Script Finished ---")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use image::{ImageFormat, RgbImage};
    use tempfile::tempdir;

    use super::*;
    use crate::device::DeviceInfo;

    struct NoGpus;

    impl DeviceProvider for NoGpus {
        fn physical_devices(&self) -> Vec<DeviceInfo> {
            Vec::new()
        }

        fn enable_memory_growth(&self, _device: &DeviceInfo) -> error::Result<()> {
            Ok(())
        }
    }

    fn transcript(images_dir: PathBuf) -> String {
        let config = TrainerConfig::new().with_images_dir(images_dir);
        let mut out = Vec::new();
        run(&config, &DeviceProbe::new(NoGpus), &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn reports_images_and_finishes() {
        let dir = tempdir().unwrap();
        RgbImage::new(2, 2)
            .save_with_format(dir.path().join("cat.png"), ImageFormat::Png)
            .unwrap();

        let text = transcript(dir.path().to_path_buf());

        assert!(text.starts_with("--- ML Trainer Script Starting ---\nburn version: 0.15.0\n"));
        assert!(text.contains("No GPUs available. Training will run on CPU.\n"));
        assert!(text.contains(&format!(
            "\nChecking for images in: {}\nFound 1 image(s):\n  - cat.png\n",
            dir.path().display()
        )));
        assert!(text.contains("--- Placeholder Training Logic ---"));
        assert!(text.ends_with("\n--- ML Trainer Script Finished ---\n"));
    }

    #[test]
    fn missing_directory_does_not_stop_the_run() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("training_images");

        let text = transcript(missing.clone());

        assert!(text.contains(&format!(
            "Checking for images in: {0}\nError: Directory {0} does not exist.\n",
            missing.display()
        )));
        assert!(!text.contains("Found "));
        assert!(text.ends_with("\n--- ML Trainer Script Finished ---\n"));
    }

    #[test]
    fn empty_directory_says_so() {
        let dir = tempdir().unwrap();

        let text = transcript(dir.path().to_path_buf());

        assert!(text.contains("No image files found in the directory.\n"));
        assert!(text.ends_with("\n--- ML Trainer Script Finished ---\n"));
    }
}
