//! Sierra MARC export CLI.
//!
//! Thin driver over [`sierra_export::Exporter`]: parses connection and
//! export options, initializes logging, runs one export mode, and exits
//! non-zero with a descriptive message on any fatal error.

use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::{ArgGroup, Parser};
use sierra_export::{
    ExportOptions, Exporter, LogProgress, MissingTagPolicy, PgConfig, SierraSource,
};
use std::path::PathBuf;
use std::process;
use tracing::error;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "sierra-export",
    version,
    about = "Export Sierra bibliographic records as MARC21 (ISO 2709) files",
    group(ArgGroup::new("mode").required(true))
)]
struct Cli {
    /// Sierra database host
    #[arg(long)]
    host: String,

    /// Sierra database port
    #[arg(long, default_value_t = 1032)]
    port: u16,

    /// Sierra database name
    #[arg(long, default_value = "iii")]
    dbname: String,

    /// Sierra database user
    #[arg(long)]
    user: String,

    /// Sierra database password
    #[arg(long, env = "SIERRA_DB_PASSWORD", hide_env_values = true)]
    password: String,

    /// Output directory
    #[arg(long, default_value = ".")]
    out: PathBuf,

    /// Base name of the output files
    #[arg(long, default_value = "export")]
    stem: String,

    /// Write one file per batch instead of a single growing file
    #[arg(long)]
    split: bool,

    /// Records per batch
    #[arg(long, default_value_t = sierra_export::DEFAULT_BATCH_SIZE)]
    batch_size: usize,

    /// Fold untagged source fields into a 999 field instead of dropping
    /// them
    #[arg(long)]
    untagged_to_999: bool,

    /// Export records modified after this time (RFC 3339)
    #[arg(long, group = "mode", value_name = "TIMESTAMP")]
    since: Option<DateTime<Utc>>,

    /// Export deletion placeholders for records deleted after this time
    /// (RFC 3339)
    #[arg(long, group = "mode", value_name = "TIMESTAMP")]
    deleted_since: Option<DateTime<Utc>>,

    /// Export every active bibliographic record
    #[arg(long, group = "mode")]
    full: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(&cli) {
        error!(error = %e, "export failed");
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let config = PgConfig {
        host: cli.host.clone(),
        port: cli.port,
        dbname: cli.dbname.clone(),
        user: cli.user.clone(),
        password: cli.password.clone(),
    };
    let mut source = SierraSource::connect(config)
        .with_context(|| format!("connecting to Sierra at {}:{}", cli.host, cli.port))?;

    let exporter = Exporter::new(ExportOptions {
        output_dir: cli.out.clone(),
        file_stem: cli.stem.clone(),
        split_files: cli.split,
        batch_size: cli.batch_size,
        missing_tag_policy: if cli.untagged_to_999 {
            MissingTagPolicy::Synthesize999
        } else {
            MissingTagPolicy::Skip
        },
    });

    let mut progress = LogProgress;
    let summary = if cli.full {
        exporter.export_all_active(&mut source, &mut progress)?
    } else if let Some(since) = cli.deleted_since {
        exporter.export_deleted_since(&mut source, since, &mut progress)?
    } else if let Some(since) = cli.since {
        exporter.export_modified_since(&mut source, since, &mut progress)?
    } else {
        anyhow::bail!("one of --since, --deleted-since, or --full is required");
    };

    println!(
        "Wrote {} records ({} deleted, {} skipped) to {} file(s)",
        summary.written,
        summary.deleted,
        summary.skipped,
        summary.files.len()
    );
    Ok(())
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
