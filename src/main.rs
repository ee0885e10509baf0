//! Command-line entry point of the dark photon studies

use clap::{Parser, Subcommand};
use dark_photons::{commands, config::Configuration, Result};
use env_logger::Env;
use eyre::WrapErr;
use std::path::PathBuf;

/// Truth and reconstruction studies of dark photon decays
#[derive(Debug, Parser)]
#[command(version)]
struct Args {
    /// Configuration file [default: dark_photons.toml, if present]
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log debugging information
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    study: Study,
}

#[derive(Debug, Subcommand)]
enum Study {
    /// Truth-level kinematics of every sample of the input directory
    Truth,

    /// Reconstruction efficiency of dark photons as lepton jets
    Efficiency {
        /// Input sample, overriding the configured one
        #[arg(short, long)]
        input: Option<PathBuf>,
    },

    /// Matched and fake rates of reconstructed lepton jets
    FakeRate {
        /// Input sample, overriding the configured one
        #[arg(short, long)]
        input: Option<PathBuf>,
    },

    /// Opening angle vs. 2m/pT heatmaps
    Heatmap {
        /// Input samples, overriding the configured ones
        inputs: Vec<PathBuf>,
    },

    /// Comparison plots across finished runs
    Overlay {
        /// Only produce this overlay set
        #[arg(short, long)]
        name: Option<String>,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();
    let level = if args.verbose { "debug" } else { "info" };
    env_logger::init_from_env(Env::default().filter_or("DARK_PHOTONS_LOG", level));

    let cfg = Configuration::locate(args.config.as_deref())
        .wrap_err("Failed to load the configuration")?;

    match args.study {
        Study::Truth => {
            commands::run_truth(&cfg).wrap_err("Truth study failed")?;
        }
        Study::Efficiency { input } => {
            commands::run_efficiency(&cfg, input.as_deref()).wrap_err("Efficiency study failed")?;
        }
        Study::FakeRate { input } => {
            commands::run_fake_rate(&cfg, input.as_deref()).wrap_err("Fake rate study failed")?;
        }
        Study::Heatmap { inputs } => {
            commands::run_heatmap(&cfg, &inputs).wrap_err("Heatmap study failed")?;
        }
        Study::Overlay { name } => {
            commands::run_overlays(&cfg, name.as_deref()).wrap_err("Overlay production failed")?;
        }
    }

    // ...and we're done
    Ok(())
}
