use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use logsleuth::config::{Config, LoggingConfig};
use logsleuth::detect::engine::AnalysisEngine;
use logsleuth::record::LogRecord;

#[derive(Parser)]
#[command(
    name = "logsleuth",
    about = "Hybrid log anomaly detection and root-cause ranking",
    version,
    long_about = None
)]
struct Cli {
    /// Config file (TOML); falls back to $LOGSLEUTH_CONFIG, then /etc/logsleuth/logsleuth.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP analysis service
    Serve {
        /// Bind address (overrides server.bind)
        #[arg(long)]
        bind: Option<String>,
    },

    /// Analyze a JSON-lines file of log records
    Analyze {
        /// Input file, one JSON record per line; `-` reads stdin
        #[arg(long)]
        input: PathBuf,

        /// JSON output for machine parsing
        #[arg(long)]
        json: bool,

        /// Skip root-cause classification
        #[arg(long)]
        no_root_cause: bool,
    },

    /// Inspect or reset the persisted outlier model
    Model {
        #[command(subcommand)]
        action: ModelAction,
    },
}

#[derive(Subcommand)]
enum ModelAction {
    /// Show whether the model is fitted and on how many samples
    Status {
        /// JSON output for machine parsing
        #[arg(long)]
        json: bool,
    },

    /// Delete the persisted model; the next batch fits a fresh one
    Reset,
}

/// Stderr subscriber used only while the config itself is being resolved,
/// so load and fallback messages are not lost. Honours `RUST_LOG`.
fn bootstrap_subscriber() -> impl tracing::Subscriber + Send + Sync {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish()
}

fn init_tracing(cfg: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cfg.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if cfg.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn read_records(input: &Path) -> Result<Vec<LogRecord>> {
    let reader: Box<dyn BufRead> = if input == Path::new("-") {
        Box::new(BufReader::new(std::io::stdin()))
    } else {
        let file = std::fs::File::open(input)
            .with_context(|| format!("failed to open input: {}", input.display()))?;
        Box::new(BufReader::new(file))
    };

    let mut records = Vec::new();
    for (n, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record: LogRecord = serde_json::from_str(&line)
            .with_context(|| format!("invalid log record on line {}", n + 1))?;
        records.push(record);
    }
    Ok(records)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = tracing::subscriber::with_default(bootstrap_subscriber(), || {
        Config::resolve(cli.config.as_deref())
    })?;
    init_tracing(&config.logging);

    match cli.command {
        Commands::Serve { bind } => {
            if let Some(bind) = bind {
                config.server.bind = bind;
            }
            tracing::info!(bind = %config.server.bind, "Starting logsleuth service");
            logsleuth::serve(config).await?;
        }
        Commands::Analyze {
            input,
            json,
            no_root_cause,
        } => {
            let records = read_records(&input)?;
            tracing::info!(input = %input.display(), records = records.len(), "Analyzing batch");
            let engine = AnalysisEngine::new(&config)?;
            let analysis = engine.analyze(&records, !no_root_cause);

            if json {
                println!("{}", serde_json::to_string_pretty(&analysis)?);
            } else {
                println!("{:<20} | {:<7} | {:<5} | Root causes", "Log", "Anomaly", "Score");
                println!("{:-<20}-|-{:-<7}-|-{:-<5}-|-{:-<40}", "", "", "", "");
                for r in &analysis.results {
                    let flag = if r.is_anomaly { "YES" } else { "no" };
                    println!(
                        "{:<20} | {:<7} | {:<5.2} | {}",
                        r.log_id,
                        flag,
                        r.score,
                        r.root_causes.join("; ")
                    );
                    for rec in &r.recommendations {
                        println!("{:<20} | {:<7} | {:<5} |   -> {}", "", "", "", rec);
                    }
                }
                let s = &analysis.summary;
                println!(
                    "\n{} records, {} anomalies, max score {:.2}",
                    s.total, s.anomalies, s.max_score
                );
            }
        }
        Commands::Model { action } => {
            let engine = AnalysisEngine::new(&config)?;
            match action {
                ModelAction::Status { json } => {
                    let status = engine.model_status();
                    if json {
                        println!("{}", serde_json::to_string_pretty(&status)?);
                    } else if status.fitted {
                        println!(
                            "Model: fitted on {} samples at {}",
                            status.trained_samples.unwrap_or_default(),
                            status
                                .trained_at
                                .map(|t| t.to_rfc3339())
                                .unwrap_or_default()
                        );
                    } else {
                        println!("Model: unfitted (fits on the next batch)");
                    }
                }
                ModelAction::Reset => {
                    engine.reset_model()?;
                    println!("Model reset.");
                }
            }
        }
    }

    Ok(())
}
