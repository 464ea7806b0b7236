//! coda - compositional analysis of cortical layer proportions
//!
//! Command-line interface for the cortex-coda pipeline.

use clap::{Parser, Subcommand, ValueEnum};
use cortex_coda::data::{CompositionTable, Dataset, Factor};
use cortex_coda::effect::BootstrapConfig;
use cortex_coda::error::Result;
use cortex_coda::normalize::transform_table;
use cortex_coda::pipeline::{resolve_contrast, run_bootstrap, AnalysisConfig, Contrast, Pipeline};
use cortex_coda::zero::{adjust_table, ZeroConfig};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// CLI-friendly factor enum
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliFactor {
    Species,
    Cortex,
}

impl From<CliFactor> for Factor {
    fn from(factor: CliFactor) -> Self {
        match factor {
            CliFactor::Species => Factor::Species,
            CliFactor::Cortex => Factor::Cortex,
        }
    }
}

/// Compositional analysis of cell-population proportions
#[derive(Parser)]
#[command(name = "coda")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full analysis
    Run {
        /// Input table (TSV or CSV) with Species, Cortex, Layer, Prop_Ctx
        #[arg(short, long)]
        data: PathBuf,

        /// Analysis configuration YAML (defaults if omitted)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Output directory for ilr.tsv, bootstrap.tsv and report.json
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Zero-adjust and ILR-transform the compositions
    Ilr {
        /// Input table (TSV or CSV)
        #[arg(short, long)]
        data: PathBuf,

        /// Output path for the coordinate TSV
        #[arg(short, long)]
        output: PathBuf,

        /// Value given to each zero proportion
        #[arg(short, long, default_value = "1e-4")]
        epsilon: f64,
    },

    /// Bootstrap per-layer log-ratios between two labels
    Bootstrap {
        /// Input table (TSV or CSV)
        #[arg(short, long)]
        data: PathBuf,

        /// Factor carrying the two labels
        #[arg(short, long, value_enum, default_value = "species")]
        factor: CliFactor,

        /// Numerator label (first level if omitted)
        #[arg(long, requires = "label_b")]
        label_a: Option<String>,

        /// Denominator label (second level if omitted)
        #[arg(long, requires = "label_a")]
        label_b: Option<String>,

        /// Resamples per layer
        #[arg(short = 'n', long, default_value = "5000")]
        resamples: usize,

        /// Confidence level of the percentile interval
        #[arg(long, default_value = "0.95")]
        confidence: f64,

        /// Random seed for reproducible resampling
        #[arg(long)]
        seed: Option<u64>,

        /// Value given to each zero proportion
        #[arg(short, long, default_value = "1e-4")]
        epsilon: f64,

        /// Output path for the bootstrap TSV
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Write the default analysis configuration
    InitConfig {
        /// Output path for the YAML file
        #[arg(short, long)]
        output: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Run {
            data,
            config,
            output,
        } => cmd_run(&data, config.as_deref(), &output),

        Commands::Ilr {
            data,
            output,
            epsilon,
        } => cmd_ilr(&data, &output, epsilon),

        Commands::Bootstrap {
            data,
            factor,
            label_a,
            label_b,
            resamples,
            confidence,
            seed,
            epsilon,
            output,
        } => {
            let config = BootstrapConfig {
                n_resamples: resamples,
                confidence,
                seed,
                ..Default::default()
            };
            cmd_bootstrap(
                &data,
                factor.into(),
                label_a.zip(label_b),
                &config,
                epsilon,
                &output,
            )
        }

        Commands::InitConfig { output } => cmd_init_config(&output),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Zero-adjusted composition table from an input file.
fn load_table(data_path: &Path, epsilon: f64) -> Result<CompositionTable> {
    let data = Dataset::from_path(data_path)?;
    tracing::info!(rows = data.len(), path = ?data_path, "loaded data");
    let raw = CompositionTable::from_dataset(&data)?;
    tracing::info!(zeros_replaced = raw.n_zeros(), epsilon, "replaced zeros");
    adjust_table(&raw, &ZeroConfig::with_epsilon(epsilon))
}

/// Run the full analysis
fn cmd_run(data_path: &Path, config_path: Option<&Path>, output_dir: &Path) -> Result<()> {
    let config = match config_path {
        Some(path) => {
            tracing::info!(path = ?path, "loading configuration");
            AnalysisConfig::from_yaml(&std::fs::read_to_string(path)?)?
        }
        None => AnalysisConfig::default(),
    };

    let data = Dataset::from_path(data_path)?;
    tracing::info!(rows = data.len(), path = ?data_path, "loaded data");

    let report = Pipeline::from_config(config).run(&data)?;

    std::fs::create_dir_all(output_dir)?;
    report.write_ilr_tsv(output_dir.join("ilr.tsv"))?;
    report.bootstrap.to_tsv(output_dir.join("bootstrap.tsv"))?;
    report.write_json(output_dir.join("report.json"))?;

    println!("{}", report);
    tracing::info!(output = ?output_dir, "wrote ilr.tsv, bootstrap.tsv, report.json");
    Ok(())
}

/// Write ILR coordinates
fn cmd_ilr(data_path: &Path, output_path: &Path, epsilon: f64) -> Result<()> {
    let table = load_table(data_path, epsilon)?;
    let ilr = transform_table(&table)?;
    ilr.to_tsv(output_path)?;

    eprintln!(
        "Wrote {} compositions x {} coordinates to {:?}",
        ilr.n_rows(),
        ilr.n_coordinates(),
        output_path
    );
    Ok(())
}

/// Bootstrap log-ratios per layer
fn cmd_bootstrap(
    data_path: &Path,
    factor: Factor,
    labels: Option<(String, String)>,
    config: &BootstrapConfig,
    epsilon: f64,
    output_path: &Path,
) -> Result<()> {
    let table = load_table(data_path, epsilon)?;
    let requested = labels.map(|(label_a, label_b)| Contrast { label_a, label_b });
    let contrast = resolve_contrast(&table, factor, requested.as_ref())?;

    let summary = run_bootstrap(&table, factor, &contrast, config)?;
    summary.to_tsv(output_path)?;

    print!("{}", summary);
    Ok(())
}

/// Write the default configuration
fn cmd_init_config(output_path: &Path) -> Result<()> {
    let yaml = AnalysisConfig::default().to_yaml()?;
    std::fs::write(output_path, yaml)?;
    eprintln!("Wrote default configuration to {:?}", output_path);
    Ok(())
}
