use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use gleaner_client::{ContentFetcher, HttpFetcher, PageHarvester, ReqwestImageDownloader};
use gleaner_core::config::Dialect;
use gleaner_core::export::{self, ExportFormat};
use gleaner_core::registry::JobRegistry;
use gleaner_core::traits::{Authenticator, Fetcher, NullSink};
use gleaner_core::{JobOutcome, JobStatus, ScrapeConfig};

#[derive(Parser)]
#[command(name = "gleaner", version, about = "Declarative web-record extractor")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a scrape job described by a JSON config file
    Run {
        /// Path to the job configuration (JSON)
        #[arg(short, long)]
        config: PathBuf,

        /// Directory for exported results
        #[arg(short, long, default_value = "output")]
        output_dir: PathBuf,

        /// Directory for downloaded images
        #[arg(long, default_value = "images")]
        images_dir: PathBuf,
    },

    /// Test a single selector against a URL and preview the matches
    Probe {
        /// Target URL
        #[arg(short, long)]
        url: String,

        /// Selector to evaluate
        #[arg(short, long)]
        selector: String,

        /// Selector dialect: "css" or "xpath"
        #[arg(short, long, default_value = "css")]
        dialect: String,

        /// Attribute to read instead of text content
        #[arg(short, long)]
        attribute: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Setup tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("gleaner=info".parse()?))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            output_dir,
            images_dir,
        } => cmd_run(&config, &output_dir, &images_dir).await?,
        Commands::Probe {
            url,
            selector,
            dialect,
            attribute,
        } => cmd_probe(&url, &selector, &dialect, attribute.as_deref()).await?,
    }

    Ok(())
}

async fn cmd_run(config_path: &Path, output_dir: &Path, images_dir: &Path) -> Result<()> {
    let raw = std::fs::read_to_string(config_path)
        .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;
    let config: ScrapeConfig =
        serde_json::from_str(&raw).context("Invalid JSON in config file")?;

    let cancel = CancellationToken::new();
    let transport = HttpFetcher::new()
        .with_user_agents(config.user_agents.clone().unwrap_or_default());
    let fetcher = ContentFetcher::new(transport, &config, cancel.clone());

    #[cfg(feature = "browser")]
    {
        let wants_rendering = config
            .rendering
            .as_ref()
            .is_some_and(|r| r.enabled && gleaner_client::engine_available(r.engine));
        if wants_rendering {
            match gleaner_client::BrowserRenderer::launch().await {
                Ok(renderer) => {
                    tracing::info!("Rendering backend ready");
                    return run_job(
                        config,
                        fetcher.with_renderer(renderer),
                        cancel,
                        output_dir,
                        images_dir,
                    )
                    .await;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Renderer init failed; falling back to plain fetch");
                }
            }
        }
    }
    #[cfg(not(feature = "browser"))]
    if config.rendering.as_ref().is_some_and(|r| r.enabled) {
        tracing::warn!("Rendering requested but this build has no browser support");
    }

    run_job(config, fetcher, cancel, output_dir, images_dir).await
}

async fn run_job<F>(
    config: ScrapeConfig,
    fetcher: F,
    cancel: CancellationToken,
    output_dir: &Path,
    images_dir: &Path,
) -> Result<()>
where
    F: Fetcher + Authenticator + 'static,
{
    let format = config.output_format;
    let harvester = PageHarvester::new(&config);
    let downloader = ReqwestImageDownloader::new(images_dir).map_err(|e| anyhow::anyhow!(e))?;

    let registry = JobRegistry::new();
    let id = registry
        .submit_with_token(config, cancel, fetcher, harvester, downloader, NullSink)
        .map_err(|e| anyhow::anyhow!(e))?;
    tracing::info!(job_id = %id, "Job submitted");

    // Ctrl-C cancels the job instead of tearing the process down mid-fetch.
    {
        let registry = registry.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!(job_id = %id, "Interrupt received, cancelling job");
                registry.cancel(id);
            }
        });
    }

    let mut last_reported = 0;
    let snapshot = loop {
        let snapshot = registry
            .snapshot(id)
            .context("job disappeared from the registry")?;
        if snapshot.progress.current > last_reported {
            last_reported = snapshot.progress.current;
            tracing::info!(
                "[{}/{}] {}",
                snapshot.progress.current,
                snapshot.progress.total,
                snapshot.progress.url
            );
        }
        if snapshot.status.is_terminal() {
            break snapshot;
        }
        tokio::time::sleep(Duration::from_millis(200)).await;
    };

    match snapshot.status {
        JobStatus::Completed => {
            let outcome = snapshot.outcome.context("completed job has no outcome")?;
            let path = export_outcome(&outcome, format, output_dir)?;
            tracing::info!(
                records = outcome.records.len(),
                pages_failed = outcome.stats.pages_failed,
                duration_secs = outcome.duration_seconds,
                output = %path.display(),
                "Job completed"
            );
            println!("{}", serde_json::to_string_pretty(&outcome.stats)?);
            Ok(())
        }
        JobStatus::Cancelled => bail!("job cancelled"),
        JobStatus::Failed => bail!(
            "job failed: {}",
            snapshot.error.unwrap_or_else(|| "unknown error".into())
        ),
        other => bail!("job ended in unexpected state: {other}"),
    }
}

/// Write the records in the requested format; table-shaped formats get
/// the header+rows contract for their external writer.
fn export_outcome(
    outcome: &JobOutcome,
    format: ExportFormat,
    output_dir: &Path,
) -> Result<PathBuf> {
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create {}", output_dir.display()))?;

    let timestamp = chrono::Utc::now().format("%Y%m%d_%H%M%S");
    let path = if format.is_table_shaped() {
        let table = export::to_table(&outcome.records, format);
        let path = output_dir.join(format!("scraped_data_{timestamp}.{}.table.json", format.extension()));
        std::fs::write(&path, serde_json::to_string_pretty(&table)?)?;
        tracing::info!(
            "Table contract written; hand it to the {} writer",
            format.extension()
        );
        path
    } else {
        let rendered = match format {
            ExportFormat::Json => export::to_json_string(&outcome.records),
            ExportFormat::Csv => export::to_csv_string(&outcome.records),
            ExportFormat::Xml => export::to_xml_string(&outcome.records),
            _ => unreachable!("table formats handled above"),
        }
        .map_err(|e| anyhow::anyhow!(e))?;
        let path = output_dir.join(format!("scraped_data_{timestamp}.{}", format.extension()));
        std::fs::write(&path, rendered)?;
        path
    };

    Ok(path)
}

async fn cmd_probe(url: &str, selector: &str, dialect: &str, attribute: Option<&str>) -> Result<()> {
    let dialect = match dialect.to_lowercase().as_str() {
        "css" => Dialect::Css,
        "xpath" => Dialect::Xpath,
        other => bail!("unknown dialect '{other}' (expected css or xpath)"),
    };

    let fetcher = HttpFetcher::new();
    let result = gleaner_client::probe_selector(&fetcher, url, selector, dialect, attribute)
        .await
        .map_err(|e| anyhow::anyhow!(e))?;

    if result.preview.is_empty() {
        println!("No matches for '{selector}' on {url}");
        return Ok(());
    }

    println!("{} match(es) for '{selector}':", result.count);
    for (i, value) in result.preview.iter().enumerate() {
        println!("  [{}] {}", i + 1, value);
    }

    Ok(())
}
