use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};

use diagnostics::*;
use loglake::{
    IngestOptions, LakeConfig, MergeOutcome, PartitionSink, ScopedTimer, SourceConfig,
    build_source_store, create_example_config, ingest_source, load_config, merge_partitions,
};

const LOG_FILE: &str = "loglake.log";

#[derive(Parser)]
#[command(author, version, about = "Date-partitioned NDJSON log ingestion and merge", long_about = None)]
#[command(name = "loglake")]
struct Cli {
    /// Path to the YAML run configuration
    #[arg(short, long, default_value = "loglake.yaml", global = true)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write an example configuration file
    Init,
    /// Download remote log objects into per-date Parquet partitions
    Ingest(RangeArgs),
    /// Flatten and merge per-date partitions into one combined table
    Merge(RangeArgs),
}

#[derive(Args)]
struct RangeArgs {
    /// Only run for this configured source (default: all)
    #[arg(short, long)]
    source: Option<String>,

    /// Inclusive start date (YYYYMMDD), overriding the source config
    #[arg(long, value_parser = parse_date_key)]
    start_date: Option<String>,

    /// Inclusive end date (YYYYMMDD), overriding the source config
    #[arg(long, value_parser = parse_date_key)]
    end_date: Option<String>,
}

fn parse_date_key(raw: &str) -> Result<String, String> {
    if loglake::datekey::is_valid_date_key(raw) {
        Ok(raw.to_string())
    } else {
        Err(format!("'{raw}' is not a valid YYYYMMDD date"))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Init => {
            diagnostics::init(None);
            run_init(&cli.config)
        }
        Commands::Ingest(args) => {
            let config = load_config(&cli.config)
                .with_context(|| format!("Failed to load configuration: {}", cli.config.display()))?;
            let log_file = config.log_dir.join(LOG_FILE);
            diagnostics::init(Some(log_file.as_path()));
            let _timer = ScopedTimer::start("Ingestion");
            run_ingest(&config, &args).await
        }
        Commands::Merge(args) => {
            let config = load_config(&cli.config)
                .with_context(|| format!("Failed to load configuration: {}", cli.config.display()))?;
            let log_file = config.log_dir.join(LOG_FILE);
            diagnostics::init(Some(log_file.as_path()));
            let _timer = ScopedTimer::start("Merge");
            run_merge(&config, &args)
        }
    }
}

fn run_init(path: &Path) -> Result<()> {
    if path.exists() {
        let name = path.display().to_string();
        info!("Configuration file already exists: {name}", name);
        info!("Delete it first if you want to create a new one.");
        return Ok(());
    }
    create_example_config(path)
        .with_context(|| format!("Failed to create configuration file: {}", path.display()))?;
    let name = path.display().to_string();
    info!("Created example configuration file: {name}", name);
    info!("Edit it to point at your log containers, then run: loglake ingest");
    Ok(())
}

fn select_sources<'a>(config: &'a LakeConfig, name: Option<&str>) -> Result<Vec<&'a SourceConfig>> {
    match name {
        Some(wanted) => {
            let selected: Vec<&SourceConfig> = config
                .sources
                .iter()
                .filter(|s| s.name == wanted)
                .collect();
            if selected.is_empty() {
                bail!("No configured source named '{wanted}'");
            }
            Ok(selected)
        }
        None => Ok(config.sources.iter().collect()),
    }
}

async fn run_ingest(config: &LakeConfig, args: &RangeArgs) -> Result<()> {
    let mut total_write_failures = 0;

    for source in select_sources(config, args.source.as_deref())? {
        let name = source.name.as_str();
        info!("Ingesting source {name}", name);

        let url = source.resolve_url()?;
        let handle = build_source_store(&url)
            .with_context(|| format!("Failed to open remote store for source {}", source.name))?;
        let mut sink = PartitionSink::new(config.data_dir.join(&source.name));
        let options = IngestOptions {
            start_date: args.start_date.clone().or_else(|| source.start_date.clone()),
            end_date: args.end_date.clone().or_else(|| source.end_date.clone()),
            max_attempts: config.max_attempts,
        };

        let report = ingest_source(
            handle.store.as_ref(),
            handle.prefix.as_ref(),
            &mut sink,
            &options,
        )
        .await
        .with_context(|| format!("Ingestion failed for source {}", source.name))?;

        let objects = report.objects;
        let records = report.records;
        let unroutable = report.unroutable;
        info!(
            "Source {name}: {objects} objects, {records} records, {unroutable} unroutable",
            name,
            objects,
            records,
            unroutable,
        );
        total_write_failures += report.write_failures;
    }

    if total_write_failures > 0 {
        bail!("{total_write_failures} partition write(s) failed");
    }
    Ok(())
}

fn run_merge(config: &LakeConfig, args: &RangeArgs) -> Result<()> {
    for source in select_sources(config, args.source.as_deref())? {
        let name = source.name.as_str();
        let start = args.start_date.as_deref().or(source.start_date.as_deref());
        let end = args.end_date.as_deref().or(source.end_date.as_deref());
        let outcome = merge_partitions(&config.data_dir.join(&source.name), start, end)
            .with_context(|| format!("Merge failed for source {}", source.name))?;
        match outcome {
            MergeOutcome::Empty => info!("No data to combine for source {name}", name),
            MergeOutcome::Written { partitions, rows } => {
                info!(
                    "Source {name}: combined {partitions} partitions into {rows} rows",
                    name,
                    partitions,
                    rows,
                );
            }
        }
    }
    Ok(())
}
