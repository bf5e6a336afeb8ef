use anyhow::Result;
use cicd_core::config::{self, AppConfig};
use cicd_core::models::ScanRecord;
use cicd_core::pipeline;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    let mut cfg = config::load(cli.config.as_deref())?;
    if cli.debug {
        cfg.scan.debug = true;
    }

    match cli.command {
        Commands::Scan { directory, json } => run_scan(cfg, directory, json).await,
        Commands::Ask { question } => run_ask(cfg, question).await,
        Commands::Results { search, json } => run_results(cfg, search, json).await,
        Commands::Risks { json } => run_risks(cfg, json).await,
        Commands::Reset => pipeline::run_reset(&cfg).await,
    }
}

fn init_tracing(debug: bool) {
    let level = if debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .init();
}

#[derive(Parser)]
#[command(name = "cicd-scan")]
#[command(about = "CI/CD configuration security scanner with RAG Q&A", long_about = None)]
struct Cli {
    /// Path to config TOML
    #[arg(short, long)]
    config: Option<String>,

    /// Verbose diagnostic output
    #[arg(long, default_value_t = false)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan a directory of CI/CD configuration files
    Scan {
        /// Directory to scan; falls back to the configured default
        directory: Option<PathBuf>,
        /// Output JSON summary
        #[arg(long)]
        json: bool,
    },
    /// Ask a question over the scanned corpus
    Ask {
        /// Natural-language question
        question: String,
    },
    /// Browse stored scan results
    Results {
        /// Substring filter over file paths and risk names
        #[arg(long)]
        search: Option<String>,
        /// Output JSON
        #[arg(long)]
        json: bool,
    },
    /// Show aggregated risk counts
    Risks {
        /// Output JSON
        #[arg(long)]
        json: bool,
    },
    /// Drop and recreate both stores
    Reset,
}

async fn run_scan(cfg: AppConfig, directory: Option<PathBuf>, json: bool) -> Result<()> {
    let dir = directory.unwrap_or_else(|| PathBuf::from(&cfg.scan.directory));
    anyhow::ensure!(dir.exists(), "Directory does not exist: {}", dir.display());

    let summary = pipeline::run_scan(&cfg, &dir).await?;
    if json {
        let out = serde_json::json!({
            "status": "ok",
            "total_files": summary.total_files,
            "processed_files": summary.processed_files,
            "skipped_files": summary.skipped_files,
            "records": summary.results.len(),
            "risk_count": summary.risk_count,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        println!(
            "scan: {} files, {} processed, {} skipped, {} records stored",
            summary.total_files,
            summary.processed_files,
            summary.skipped_files,
            summary.results.len()
        );
        for record in &summary.results {
            println!("  {} ({} risks)", record.file_path, record.risks.len());
        }
    }
    Ok(())
}

async fn run_ask(cfg: AppConfig, question: String) -> Result<()> {
    let answer = pipeline::run_ask(&cfg, &question).await?;
    println!("{answer}");
    Ok(())
}

async fn run_results(cfg: AppConfig, search: Option<String>, json: bool) -> Result<()> {
    let ctx = pipeline::AppContext::init(&cfg).await?;
    let records = match search {
        Some(term) => ctx.store.search(&term).await?,
        None => ctx.store.load_all().await?,
    };
    if json {
        println!("{}", serde_json::to_string_pretty(&records)?);
    } else {
        for record in &records {
            print_record(record);
        }
        println!("{} result(s)", records.len());
    }
    Ok(())
}

fn print_record(record: &ScanRecord) {
    println!("{} [{}]", record.file_path, record.timestamp.to_rfc3339());
    if record.risks.is_empty() {
        println!("  no corroborated risks");
    }
    for risk in &record.risks {
        println!("  {} ({})", risk.risk_name, risk.severity);
    }
}

async fn run_risks(cfg: AppConfig, json: bool) -> Result<()> {
    let count = pipeline::load_risk_count(&cfg).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&count)?);
        return Ok(());
    }
    if count.is_empty() {
        println!("No risks recorded. Run a scan first.");
        return Ok(());
    }
    println!("{:<55} {:>5} {:>7} {:>5}", "Risk", "Low", "Medium", "High");
    for (name, tally) in &count.0 {
        println!(
            "{:<55} {:>5} {:>7} {:>5}",
            name, tally.low, tally.medium, tally.high
        );
    }
    Ok(())
}
