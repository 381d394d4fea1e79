//! devmap CLI: memory maps, register layouts and linker plans for device descriptions.

mod commands;

use std::path::{Path, PathBuf};
use std::process;

use anyhow::Context;
use clap::{Parser, Subcommand};
use log::LevelFilter;
use simple_logger::SimpleLogger;

use commands::OutputFormat;
use devmap_pipeline::DevmapConfig;

#[derive(Parser)]
#[command(name = "devmap", version, about = "Device memory-map and register-layout compiler")]
struct Cli {
    /// More log output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    /// Configuration file (default: nearest devmap.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text, global = true)]
    format: OutputFormat,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the resolved memory map of a device
    Memmap {
        /// Device description (.json or .toml)
        device: PathBuf,
    },
    /// Show register-group layouts of a device
    Layout {
        /// Device description (.json or .toml)
        device: PathBuf,
        /// Only this peripheral
        #[arg(long)]
        peripheral: Option<String>,
    },
    /// Show the linker plan and vector table of a device
    Plan {
        /// Device description (.json or .toml)
        device: PathBuf,
    },
    /// Run the full pipeline over device files or directories
    Check {
        /// Files or directories of device descriptions
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        /// Worker threads (overrides [batch] jobs)
        #[arg(long, short)]
        jobs: Option<usize>,
    },
}

fn main() {
    let cli = Cli::parse();

    let result = init_logging(cli.verbose).and_then(|()| run(cli));
    if let Err(e) = result {
        eprintln!("error: {e:#}");
        process::exit(1);
    }
}

fn init_logging(verbose: u8) -> anyhow::Result<()> {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    SimpleLogger::new()
        .with_level(level)
        .init()
        .context("installing logger")
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let cwd = std::env::current_dir()?;
    let mut config = load_config(cli.config.as_deref(), &cwd)?;
    let format = cli.format;

    match cli.command {
        Commands::Memmap { device } => commands::memmap::run(&device, &config, format),
        Commands::Layout { device, peripheral } => {
            commands::layout::run(&device, peripheral.as_deref(), &config, format)
        }
        Commands::Plan { device } => commands::plan::run(&device, &config, format),
        Commands::Check { paths, jobs } => {
            if jobs.is_some() {
                config.batch.jobs = jobs;
            }
            commands::check::run(&paths, &config, format)
        }
    }
}

/// An explicit `--config` must exist; otherwise search upward, falling back to defaults.
fn load_config(explicit: Option<&Path>, cwd: &Path) -> anyhow::Result<DevmapConfig> {
    if let Some(path) = explicit {
        return DevmapConfig::load(path).with_context(|| format!("loading {}", path.display()));
    }
    match DevmapConfig::find_and_load(cwd)? {
        Some((config, dir)) => {
            log::info!("config: {}", dir.join(devmap_pipeline::CONFIG_FILE).display());
            Ok(config)
        }
        None => Ok(DevmapConfig::default()),
    }
}
