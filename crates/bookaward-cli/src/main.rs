use std::path::PathBuf;

use anyhow::{Context, Result};
use bookaward_core::UrlOutcome;
use bookaward_sync::{RunReport, SyncConfig, SyncPipeline};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "bookaward")]
#[command(about = "Scrape book award pages and sync them into Airtable")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Process every URL in the manifest.
    Run {
        /// Manifest path; defaults to BOOKAWARD_MANIFEST or input_template.txt.
        #[arg(long)]
        manifest: Option<PathBuf>,
        /// Extract and dump only; never write to the store.
        #[arg(long)]
        extract_only: bool,
        /// Rewrite each manifest line's status comment.
        #[arg(long)]
        annotate: bool,
    },
    /// Search the web for award pages and process the hits.
    Search {
        #[arg(long)]
        extract_only: bool,
    },
    /// Reconcile and write records from an earlier data dump.
    UpdateFromDump {
        #[arg(long)]
        dump: Option<PathBuf>,
    },
    /// Delete one store record by id.
    DeleteRecord { id: String },
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn print_report(report: &RunReport) -> Result<()> {
    for (url, outcome) in &report.outcomes {
        let marker = match outcome {
            UrlOutcome::Failed(_) => "!",
            UrlOutcome::SkippedLowConfidence => "-",
            _ => "+",
        };
        println!("{marker} {url}: {}", outcome.label());
    }
    println!(
        "run {} complete: completed={} failed={} skipped={}",
        report.run_id, report.summary.completed, report.summary.failed, report.summary.skipped
    );
    if std::env::var_os("BOOKAWARD_REPORT_JSON").is_some() {
        println!(
            "{}",
            serde_json::to_string_pretty(report).context("serializing run report")?
        );
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    init_tracing();

    let cli = Cli::parse();
    let config = SyncConfig::from_env();

    match cli.command.unwrap_or(Commands::Run {
        manifest: None,
        extract_only: false,
        annotate: false,
    }) {
        Commands::Run {
            manifest,
            extract_only,
            annotate,
        } => {
            let manifest = manifest.unwrap_or_else(|| config.manifest_path.clone());
            let mut pipeline = SyncPipeline::from_config(&config, extract_only)
                .context("configuring pipeline")?;
            let report = pipeline.run_manifest(&manifest, annotate).await?;
            print_report(&report)?;
        }
        Commands::Search { extract_only } => {
            let mut pipeline = SyncPipeline::from_config(&config, extract_only)
                .context("configuring pipeline")?;
            let report = pipeline.run_search().await?;
            print_report(&report)?;
        }
        Commands::UpdateFromDump { dump } => {
            let dump = dump.unwrap_or_else(|| config.data_dump_path.clone());
            let mut pipeline =
                SyncPipeline::from_config(&config, false).context("configuring pipeline")?;
            let report = pipeline.run_update_only(&dump).await?;
            print_report(&report)?;
        }
        Commands::DeleteRecord { id } => {
            let pipeline =
                SyncPipeline::from_config(&config, false).context("configuring pipeline")?;
            pipeline.delete_record(&id).await?;
            println!("deleted {id}");
        }
    }

    Ok(())
}
