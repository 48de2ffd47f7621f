mod commands;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "bunnrensk",
    version,
    about = "Normalize tunnel-floor sediment lab reports and classify them by tilstandsklasse"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Map raw parameter labels to canonical codes
    Normalize {
        /// Labels as printed in the lab report
        #[arg(required = true)]
        labels: Vec<String>,

        /// Alias overlay(s) to apply on top of the base table (default: all)
        #[arg(long = "overlay", value_name = "NAME")]
        overlays: Vec<String>,
    },
    /// Parse raw value cells ("<0,5", "12,3", "n.d.")
    ParseValue {
        #[arg(required = true, allow_hyphen_values = true)]
        values: Vec<String>,
    },
    /// Convert a concentration to another unit (default: the canonical unit)
    Convert {
        value: String,
        from: String,

        /// Target unit
        #[arg(long)]
        to: Option<String>,

        /// Matrix when the unit does not reveal it
        #[arg(long, value_enum, default_value = "solid")]
        matrix: MatrixArg,
    },
    /// Inspect and validate threshold tables
    Thresholds {
        #[command(subcommand)]
        action: ThresholdsAction,
    },
    /// Normalize and classify a lab report or input table
    Run {
        /// Input file: CSV input rows, wide XLSX sheet or ALS PDF report
        input_file: PathBuf,

        /// Input format (default: from the file extension)
        #[arg(short, long, value_enum)]
        format: Option<InputFormat>,

        /// Samples table (CSV). Rows for other samples are reported as orphans
        #[arg(long, value_name = "FILE")]
        samples: Option<PathBuf>,

        /// Colour-coded or reported tiers (CSV: sample_id, argb and/or tilstandsklasse)
        #[arg(long, value_name = "FILE")]
        tiers: Option<PathBuf>,

        /// Pipeline config (TOML)
        #[arg(short, long, value_name = "FILE")]
        config: Option<PathBuf>,

        /// Project code, e.g. 09_moanetunnelen (overrides config)
        #[arg(long)]
        project: Option<String>,

        /// Analysis type of an ALS report: totalanalyse, ristetest, kolonnetest
        #[arg(long, default_value = "totalanalyse")]
        analysis_type: String,

        /// Write samples, results, classifications and decisions CSVs to this directory
        #[arg(short = 'O', long = "out", value_name = "DIR")]
        out: Option<PathBuf>,

        /// Output format: table (default) or json
        #[arg(short, long, default_value = "table")]
        output: String,

        /// Show every classified parameter, not just the limiting ones
        #[arg(long)]
        show_all: bool,

        /// Show per-parameter reasoning and every diagnostic
        #[arg(long)]
        verbose: bool,
    },
    /// Reclassify a results table written by `run --out`
    Classify {
        /// results.csv
        results_file: PathBuf,

        /// Samples table (CSV)
        #[arg(long, value_name = "FILE")]
        samples: Option<PathBuf>,

        /// Colour-coded or reported tiers (CSV)
        #[arg(long, value_name = "FILE")]
        tiers: Option<PathBuf>,

        /// Pipeline config (TOML)
        #[arg(short, long, value_name = "FILE")]
        config: Option<PathBuf>,

        /// Write the output tables to this directory
        #[arg(short = 'O', long = "out", value_name = "DIR")]
        out: Option<PathBuf>,

        /// Output format: table (default) or json
        #[arg(short, long, default_value = "table")]
        output: String,

        #[arg(long)]
        verbose: bool,
    },
}

#[derive(Subcommand)]
enum ThresholdsAction {
    /// Show the embedded threshold table
    List,
    /// Explain the limits of one parameter
    Explain {
        /// Canonical code or raw label, e.g. "As" or "Arsen (As)"
        parameter: String,
    },
    /// Validate a custom threshold table (JSON)
    Validate { file: PathBuf },
}

#[derive(Clone, Copy, ValueEnum)]
enum MatrixArg {
    Solid,
    Liquid,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum InputFormat {
    Csv,
    Xlsx,
    AlsPdf,
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("bunnrensk=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    init_logging();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Normalize { labels, overlays } => commands::lookup::normalize(&labels, &overlays),
        Commands::ParseValue { values } => commands::lookup::parse_values(&values),
        Commands::Convert {
            value,
            from,
            to,
            matrix,
        } => commands::lookup::convert(&value, &from, to.as_deref(), matrix.into()),
        Commands::Thresholds { action } => match action {
            ThresholdsAction::List => commands::thresholds::list(),
            ThresholdsAction::Explain { parameter } => commands::thresholds::explain(&parameter),
            ThresholdsAction::Validate { file } => commands::thresholds::validate(&file),
        },
        Commands::Run {
            input_file,
            format,
            samples,
            tiers,
            config,
            project,
            analysis_type,
            out,
            output,
            show_all,
            verbose,
        } => commands::run::run(commands::run::RunArgs {
            input_file,
            format,
            samples,
            tiers,
            config,
            project,
            analysis_type,
            out,
            output,
            show_all,
            verbose,
        }),
        Commands::Classify {
            results_file,
            samples,
            tiers,
            config,
            out,
            output,
            verbose,
        } => commands::run::classify(results_file, samples, tiers, config, out, &output, verbose),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

impl From<MatrixArg> for bunnrensk_core::model::Matrix {
    fn from(m: MatrixArg) -> Self {
        match m {
            MatrixArg::Solid => bunnrensk_core::model::Matrix::Solid,
            MatrixArg::Liquid => bunnrensk_core::model::Matrix::Liquid,
        }
    }
}
