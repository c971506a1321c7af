//! scholarmail - Google Scholar document acquisition and author email mining
//!
//! Downloads the PDFs linked from an author's Scholar profile, then mines the
//! documents for the email address that most likely belongs to the author.
//!
//! ## Usage
//!
//! ### CLI Mode
//! ```bash
//! scholarmail acquire --authors authors.csv
//! scholarmail emails --identifier 57190000000 --name "Alahyane M"
//! ```
//!
//! ### HTTP Server Mode
//! ```bash
//! scholarmail serve --port 3000
//! ```

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use scholarmail::{
    acquisition::Acquirer,
    authors::{is_safe_identifier, load_authors},
    browser::chromium::ChromiumLauncher,
    config::{Config, DownloadDetection, ExtractorKind},
    extract::extractor_from_config,
    pipeline::{build_report, run_extraction, save_report, EmailReport},
    server::{router, AppState},
};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::{fmt, EnvFilter};

// ============================================================================
// CLI Definition
// ============================================================================

/// Google Scholar document acquisition and author email mining
#[derive(Parser)]
#[command(name = "scholarmail")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// JSON configuration file (default: ~/.scholarmail.json when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Download profile documents for every author in a CSV file
    Acquire {
        /// Author CSV (column 0 = identifier, column 1 = display name)
        #[arg(short, long)]
        authors: PathBuf,

        /// Root directory for per-author documents
        #[arg(long)]
        download_root: Option<PathBuf>,

        /// Run the browser without a window
        #[arg(long)]
        headless: bool,

        /// Chrome/Chromium executable
        #[arg(long)]
        chrome: Option<PathBuf>,

        /// Download detection: any document in the directory, or only new ones
        #[arg(long, value_enum)]
        detection: Option<DownloadDetection>,
    },

    /// Extract and rank emails for one author
    Emails {
        /// Author identifier (directory name under the download root)
        #[arg(long)]
        identifier: String,

        /// Author display name
        #[arg(long)]
        name: String,

        #[command(flatten)]
        extraction: ExtractionArgs,
    },

    /// Extract and rank emails for every author in a CSV file
    EmailsBatch {
        /// Author CSV (column 0 = identifier, column 1 = display name)
        #[arg(short, long)]
        authors: PathBuf,

        #[command(flatten)]
        extraction: ExtractionArgs,
    },

    /// Run as HTTP server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "3000")]
        port: u16,

        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Root directory for per-author documents
        #[arg(long)]
        download_root: Option<PathBuf>,
    },
}

#[derive(Args)]
struct ExtractionArgs {
    /// Root directory for per-author documents
    #[arg(long)]
    download_root: Option<PathBuf>,

    /// Text extraction backend
    #[arg(long, value_enum)]
    extractor: Option<ExtractorKind>,

    /// Apache Tika server URL
    #[arg(long)]
    tika_url: Option<String>,

    /// Directory for <identifier>_emails.csv reports
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Also write <identifier>_emails.json
    #[arg(long)]
    json: bool,
}

impl ExtractionArgs {
    fn apply(&self, config: &mut Config) {
        if let Some(root) = &self.download_root {
            config.download_root = root.clone();
        }
        if let Some(kind) = self.extractor {
            config.extractor = kind;
        }
        if let Some(url) = &self.tika_url {
            config.tika_url = url.clone();
        }
    }
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.debug { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.to_string()));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .init();

    let mut config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;

    match cli.command {
        Commands::Acquire {
            authors,
            download_root,
            headless,
            chrome,
            detection,
        } => {
            if let Some(root) = download_root {
                config.download_root = root;
            }
            if headless {
                config.browser.headless = true;
            }
            if chrome.is_some() {
                config.browser.chrome_executable = chrome;
            }
            if let Some(mode) = detection {
                config.download_detection = mode;
            }
            run_acquire(config, authors).await
        }
        Commands::Emails {
            identifier,
            name,
            extraction,
        } => {
            extraction.apply(&mut config);
            run_emails(config, identifier, name, extraction).await
        }
        Commands::EmailsBatch { authors, extraction } => {
            extraction.apply(&mut config);
            run_emails_batch(config, authors, extraction).await
        }
        Commands::Serve {
            port,
            host,
            download_root,
        } => {
            if let Some(root) = download_root {
                config.download_root = root;
            }
            run_server(config, host, port).await
        }
    }
}

// ============================================================================
// Acquisition
// ============================================================================

async fn run_acquire(config: Config, authors_path: PathBuf) -> Result<()> {
    config.validate().context("Invalid configuration")?;
    let authors = load_authors(&authors_path)
        .with_context(|| format!("Failed to read authors from {:?}", authors_path))?;
    std::fs::create_dir_all(&config.download_root).context("Failed to create download root")?;

    println!("Acquiring documents for {} authors", authors.len());
    println!("Download root: {}", config.download_root.display());

    let launcher =
        ChromiumLauncher::new(config.browser.clone()).context("Failed to prepare browser profile")?;
    let summary = Acquirer::new(&launcher, &config).run(&authors).await;

    println!(
        "\nDone: {} acquired, {} skipped, {} failed",
        summary.processed, summary.skipped, summary.failed
    );
    Ok(())
}

// ============================================================================
// Extraction & Ranking
// ============================================================================

async fn run_emails(
    config: Config,
    identifier: String,
    name: String,
    args: ExtractionArgs,
) -> Result<()> {
    config.validate().context("Invalid configuration")?;
    if !is_safe_identifier(&identifier) {
        bail!("Identifier '{}' must name a single directory under the download root", identifier);
    }
    let extractor = extractor_from_config(&config).context("Failed to build text extractor")?;

    let report = build_report(&config.download_root, &identifier, &name, extractor.as_ref())
        .await
        .with_context(|| format!("Failed to build email report for {}", identifier))?;

    print_report(&report);

    if let Some(dir) = &args.output {
        for path in save_report(dir, &report, args.json).context("Failed to save report")? {
            println!("Saved: {:?}", path);
        }
    }
    Ok(())
}

async fn run_emails_batch(config: Config, authors_path: PathBuf, args: ExtractionArgs) -> Result<()> {
    config.validate().context("Invalid configuration")?;
    let authors = load_authors(&authors_path)
        .with_context(|| format!("Failed to read authors from {:?}", authors_path))?;
    let extractor = extractor_from_config(&config).context("Failed to build text extractor")?;

    let (summary, reports) = run_extraction(
        &config.download_root,
        &authors,
        extractor.as_ref(),
        args.output.as_deref(),
        args.json,
    )
    .await;

    for report in &reports {
        print_report(report);
    }
    println!(
        "\nDone: {} processed, {} skipped, {} failed",
        summary.processed, summary.skipped, summary.failed
    );
    Ok(())
}

fn print_report(report: &EmailReport) {
    println!("\n--- {} ({}) ---", report.identifier, report.name);
    println!("Documents scanned: {}", report.documents_scanned);
    if !report.failures.is_empty() {
        println!("Unreadable documents: {}", report.failures.len());
    }

    match &report.most_frequent {
        Some(top) => println!("Most frequent: {} ({} occurrences)", top.email, top.count),
        None => {
            println!("No email found.");
            return;
        }
    }

    for entry in &report.ranked {
        println!(
            "  {:>4}  {:.4}  {}",
            entry.count,
            report.similarity_of(&entry.email),
            entry.email
        );
    }

    if let Some(closest) = &report.closest {
        println!("Closest to name: {} (score {:.4})", closest.email, closest.score);
    }
}

// ============================================================================
// HTTP Server
// ============================================================================

async fn run_server(config: Config, host: String, port: u16) -> Result<()> {
    info!(host = %host, port = port, "Starting HTTP server");
    config.validate().context("Invalid configuration")?;

    let extractor = extractor_from_config(&config).context("Failed to build text extractor")?;
    let app = router(Arc::new(AppState { config, extractor }));

    let addr: SocketAddr = format!("{}:{}", host, port)
        .parse()
        .context("Invalid host:port")?;

    let listener = tokio::net::TcpListener::bind(addr).await?;
    println!("Listening on http://{}", addr);

    axum::serve(listener, app)
        .await
        .context("Server error")?;

    Ok(())
}
