use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use kira_gene_harvester::app::{App, FetchOptions, FetchResult};
use kira_gene_harvester::config::{Config, ConfigLoader, ResolvedConfig};
use kira_gene_harvester::domain::GeneId;
use kira_gene_harvester::ensembl::EnsemblHttpClient;
use kira_gene_harvester::error::HarvestError;
use kira_gene_harvester::output::{JsonOutput, LogProgress, OutputMode};
use kira_gene_harvester::release::EnsemblRelease;
use kira_gene_harvester::store::Store;

#[derive(Parser)]
#[command(name = "kira-gh")]
#[command(about = "Bulk-download per-gene annotation and sequences for an Ensembl release")]
#[command(version, author)]
struct Cli {
    /// Print machine-readable JSON instead of a summary
    #[arg(long, global = true)]
    json: bool,

    /// Path to a JSON config file (defaults to ./kira-gh.json when present)
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Fetch every gene of a release into batch files, then combine them")]
    Fetch(FetchArgs),
    #[command(about = "Combine existing batch files into one CSV")]
    Combine(OutputArgs),
    #[command(about = "Fetch a single gene and print its record")]
    Gene(GeneArgs),
    #[command(about = "Download and index a release, then report its gene count")]
    Genes(ReleaseArgs),
}

#[derive(Args, Clone, Default)]
struct ReleaseArgs {
    /// Ensembl release number
    #[arg(long)]
    release: Option<u32>,

    /// Ensembl species directory name, e.g. homo_sapiens
    #[arg(long)]
    species: Option<String>,

    /// Genome assembly name, e.g. GRCh38
    #[arg(long)]
    assembly: Option<String>,

    /// Base URL of the Ensembl FTP mirror
    #[arg(long)]
    ftp_base: Option<String>,
}

#[derive(Args, Clone, Default)]
struct OutputArgs {
    /// Directory holding batch files and the combined CSV
    #[arg(long)]
    output_dir: Option<String>,
}

#[derive(Args, Clone, Default)]
struct ServerArgs {
    /// Base URL of the Ensembl REST service
    #[arg(long)]
    server: Option<String>,

    /// Per-request timeout in seconds (client default when unset)
    #[arg(long)]
    timeout_secs: Option<u64>,
}

#[derive(Args, Clone)]
struct FetchArgs {
    #[command(flatten)]
    release: ReleaseArgs,

    #[command(flatten)]
    output: OutputArgs,

    #[command(flatten)]
    server: ServerArgs,

    /// Genes per batch file
    #[arg(long)]
    batch_size: Option<usize>,

    /// Batch index to resume from; earlier batches are skipped
    #[arg(long)]
    start_batch: Option<usize>,

    /// Leave the batch files uncombined
    #[arg(long)]
    no_combine: bool,
}

#[derive(Args, Clone)]
struct GeneArgs {
    gene_id: String,

    #[command(flatten)]
    server: ServerArgs,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(err) = report.downcast_ref::<HarvestError>() {
            return ExitCode::from(map_exit_code(err));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &HarvestError) -> u8 {
    match error {
        HarvestError::NoBatchFiles(_) | HarvestError::IndexMissing(_) => 2,
        HarvestError::EnsemblHttp(_)
        | HarvestError::EnsemblStatus { .. }
        | HarvestError::EnsemblParse(_)
        | HarvestError::ReleaseHttp(_)
        | HarvestError::ReleaseStatus { .. } => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mode = if cli.json {
        OutputMode::Json
    } else {
        OutputMode::Human
    };

    match cli.command {
        Commands::Fetch(args) => {
            let overrides = Config {
                batch_size: args.batch_size,
                start_batch: args.start_batch,
                ..config_overrides(&args.release, &args.output, &args.server)
            };
            let config = ConfigLoader::resolve(cli.config.as_deref(), overrides)?;
            let app = build_app(&config)?;
            let options = FetchOptions {
                plan: config.plan,
                combine: !args.no_combine,
            };
            match mode {
                OutputMode::Json => {
                    let result = app.fetch(options, &JsonOutput)?;
                    JsonOutput::print_fetch(&result).into_diagnostic()?;
                }
                OutputMode::Human => {
                    let result = app.fetch(options, &LogProgress)?;
                    print_fetch_summary(&result);
                }
            }
        }
        Commands::Combine(args) => {
            let overrides =
                config_overrides(&ReleaseArgs::default(), &args, &ServerArgs::default());
            let config = ConfigLoader::resolve(cli.config.as_deref(), overrides)?;
            let app = build_app(&config)?;
            match mode {
                OutputMode::Json => JsonOutput::print_combine(&app.combine(&JsonOutput)?)
                    .into_diagnostic()?,
                OutputMode::Human => {
                    let summary = app.combine(&LogProgress)?;
                    println!(
                        "combined {} rows from {} batch files into {}",
                        summary.rows,
                        summary.files.len(),
                        summary.path
                    );
                }
            }
        }
        Commands::Gene(args) => {
            let gene_id: GeneId = args.gene_id.parse()?;
            let overrides = config_overrides(
                &ReleaseArgs::default(),
                &OutputArgs::default(),
                &args.server,
            );
            let config = ConfigLoader::resolve(cli.config.as_deref(), overrides)?;
            let app = build_app(&config)?;
            let fetched = app.fetch_gene(&gene_id);
            for failure in &fetched.failures {
                tracing::warn!("{} unavailable: {}", failure.field, failure.reason);
            }
            JsonOutput::print_gene(&fetched).into_diagnostic()?;
        }
        Commands::Genes(args) => {
            let overrides = config_overrides(&args, &OutputArgs::default(), &ServerArgs::default());
            let config = ConfigLoader::resolve(cli.config.as_deref(), overrides)?;
            let app = build_app(&config)?;
            match mode {
                OutputMode::Json => {
                    let (result, _) = app.prepare_release(&JsonOutput)?;
                    JsonOutput::print_release(&result).into_diagnostic()?;
                }
                OutputMode::Human => {
                    let (result, _) = app.prepare_release(&LogProgress)?;
                    println!(
                        "{} {} release {}: {} genes",
                        result.species, result.assembly, result.release, result.genes
                    );
                }
            }
        }
    }
    Ok(())
}

fn config_overrides(release: &ReleaseArgs, output: &OutputArgs, server: &ServerArgs) -> Config {
    Config {
        release: release.release,
        species: release.species.clone(),
        assembly: release.assembly.clone(),
        ftp_base: release.ftp_base.clone(),
        output_dir: output.output_dir.clone(),
        server: server.server.clone(),
        request_timeout_secs: server.timeout_secs,
        ..Config::default()
    }
}

fn build_app(config: &ResolvedConfig) -> miette::Result<App<EnsemblHttpClient, EnsemblRelease>> {
    let store = Store::new(config.output_dir.clone())?;
    let client = EnsemblHttpClient::new(&config.server, config.request_timeout)?;
    let release = EnsemblRelease::new(config.release.clone(), store.clone(), &config.ftp_base)?;
    Ok(App::new(store, client, release))
}

fn print_fetch_summary(result: &FetchResult) {
    let green = "\x1b[32m";
    let yellow = "\x1b[33m";
    let cyan = "\x1b[36m";
    let reset = "\x1b[0m";

    println!(
        "{cyan}kira-gh summary: {} {} release {}{reset}",
        result.release.species, result.release.assembly, result.release.release
    );
    println!(
        "{green}genes fetched: {} of {} (batches {}..{}){reset}",
        result.run.genes_fetched,
        result.run.total_genes,
        result.run.start_batch,
        result.run.total_batches
    );
    for batch in &result.run.batches {
        let color = if batch.degraded_rows > 0 { yellow } else { green };
        println!(
            "{color}  batch {:>4}: {} rows, {} degraded -> {}{reset}",
            batch.index, batch.rows, batch.degraded_rows, batch.path
        );
    }
    if let Some(combined) = &result.combined {
        println!(
            "{cyan}combined {} rows from {} files -> {}{reset}",
            combined.rows,
            combined.files.len(),
            combined.path
        );
    }
}
