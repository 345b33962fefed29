use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

use amalgam::{write_json, ConfigArgs, UnitArgs};
use amalgam_core::{merge_units, ExposureAnalyzer, InternalizePolicy, ReferenceModel};

#[derive(Parser)]
#[command(name = "amalgam")]
#[command(about = "Merge compiled units, internalizing types the public surface does not expose", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Enable debug output
    #[arg(short, long)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Merge the units and write the output unit
    Merge {
        #[command(flatten)]
        units: UnitArgs,

        #[command(flatten)]
        config: ConfigArgs,

        /// Output unit file (JSON)
        #[arg(short, long)]
        output: PathBuf,

        /// Name of the output unit (defaults to the primary unit's name)
        #[arg(short, long)]
        name: Option<String>,

        /// Also write the merge report (JSON)
        #[arg(short, long)]
        report: Option<PathBuf>,
    },

    /// Explain why a type stays public, or confirm that it is internalized
    Explain {
        #[command(flatten)]
        units: UnitArgs,

        #[command(flatten)]
        config: ConfigArgs,

        /// Full name of the type to explain
        full_name: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let level = if cli.debug {
        tracing::Level::TRACE
    } else if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .with_target(cli.debug) // Show target module in debug mode
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Merge {
            units,
            config,
            output,
            name,
            report,
        } => handle_merge(units, config, output, name, report),
        Commands::Explain {
            units,
            config,
            full_name,
        } => handle_explain(units, config, &full_name),
    }
}

fn handle_merge(
    units: UnitArgs,
    config: ConfigArgs,
    output: PathBuf,
    name: Option<String>,
    report: Option<PathBuf>,
) -> Result<()> {
    let options = config.resolve()?;
    let units = units.load()?;
    let output_name = name.unwrap_or_else(|| units[0].name.clone());

    let run = merge_units(units, &options, &output_name).context("Merge failed")?;

    write_json(&output, &run.output)?;
    info!(
        "Wrote {} ({} types, {} internalized, {} forwarded types) to {:?}",
        run.output.name,
        run.output.types.len(),
        run.report.internalized_count(),
        run.output.forwarded_types.len(),
        output
    );

    if let Some(path) = report {
        write_json(&path, &run.report)?;
        info!("Wrote merge report to {:?}", path);
    }

    Ok(())
}

fn handle_explain(units: UnitArgs, config: ConfigArgs, full_name: &str) -> Result<()> {
    let options = config.resolve()?;
    let policy = InternalizePolicy::from_options(&options)?;
    let model = ReferenceModel::new(units.load()?)?;

    let Some(unit) = model.defining_unit(full_name) else {
        println!("{} is not defined by any merged unit", full_name);
        return Ok(());
    };
    if unit.is_primary() {
        println!("{} is a primary type and stays public", full_name);
        return Ok(());
    }

    let exposure = ExposureAnalyzer::new(&model, &policy).analyze();
    match exposure.explain(full_name) {
        Some(chain) => {
            println!("{} stays public:", full_name);
            for step in chain {
                println!("  {} ({})", step.name, step.reason);
            }
            for exposed in exposure.exposed_by(full_name) {
                println!("  exposes {}", exposed);
            }
        }
        None => println!("{} is internalized ({})", full_name, policy),
    }

    Ok(())
}
