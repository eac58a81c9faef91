//! `biomac` command line interface.
//!
//! # Usage
//!
//! ```bash
//! biomac run --config study.toml --data data/ --out results/
//! ```

use anyhow::{Context, Result};
use biomac::io;
use biomac_core::units::UnitRegistry;
use biomac_pathways::Study;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Unit harmonization and pathway aggregation for biofuel MAC studies
#[derive(Parser, Debug)]
#[command(name = "biomac")]
#[command(about = "Compute MFSP, carbon intensity and marginal abatement cost of biofuel pathways")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a study and write its tables
    Run {
        /// Study configuration (TOML)
        #[arg(short, long)]
        config: PathBuf,

        /// Directory holding the input CSV tables
        #[arg(short, long)]
        data: PathBuf,

        /// Output directory
        #[arg(short, long)]
        out: PathBuf,

        /// Skip the variability cases even when configured
        #[arg(long)]
        base_only: bool,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "biomac=info,biomac_pathways=info,biomac_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    match args.command {
        Command::Run {
            config,
            data,
            out,
            base_only,
        } => run(&config, &data, &out, base_only),
    }
}

fn run(config: &Path, data: &Path, out: &Path, base_only: bool) -> Result<()> {
    let config = io::load_config(config)?;
    info!(
        first_year = config.study.first_year,
        last_year = config.study.last_year,
        allocation = %config.study.allocation,
        "Loaded configuration"
    );

    let mut registry = UnitRegistry::new();
    for heating_value in io::load_heating_values(data)? {
        registry.register_heating_value(heating_value);
    }
    let inputs = io::load_inputs(data)?;

    let has_variability = !config.variability.is_empty();
    let study = Study::new(config, &registry);
    let outputs = study.run(&inputs).context("running base case")?;
    io::write_outputs(out, &outputs)?;

    if has_variability && !base_only {
        let cases = study
            .run_variability(&inputs)
            .context("running variability cases")?;
        io::write_variability(&out.join("variability"), &cases)?;
    }
    Ok(())
}
