//! mysql-pg-migrate CLI - MySQL dump to PostgreSQL migration with xlsx export.

use clap::{Parser, Subcommand};
use mysql_pg_migrate::{Config, MigrateError, Orchestrator};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{info, Level};
use tracing_subscriber::fmt::format::FmtSpan;

const DEFAULT_CONFIG_PATH: &str = "config.yaml";

#[derive(Parser)]
#[command(name = "mysql-pg-migrate")]
#[command(about = "Load a MySQL dump, copy it to PostgreSQL and export an xlsx report")]
#[command(version)]
struct Cli {
    /// Path to YAML configuration file [default: config.yaml if present]
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Output JSON result to stdout
    #[arg(long, global = true)]
    output_json: bool,

    /// Log format: text or json
    #[arg(long, default_value = "text", global = true)]
    log_format: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info", global = true)]
    verbosity: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full migration (default)
    Run {
        /// Override the SQL dump to load
        #[arg(long)]
        dump_file: Option<PathBuf>,

        /// Override the workbook output path
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Override the number of rows per chunk
        #[arg(long)]
        chunk_size: Option<usize>,
    },

    /// Test database connections
    HealthCheck,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> Result<(), MigrateError> {
    let cli = Cli::parse();

    setup_logging(&cli.verbosity, &cli.log_format)
        .map_err(|e| MigrateError::Config(e.to_string()))?;

    let mut config = load_config(cli.config.as_deref())?;
    let command = cli.command.unwrap_or(Commands::Run {
        dump_file: None,
        output: None,
        chunk_size: None,
    });

    match command {
        Commands::Run {
            dump_file,
            output,
            chunk_size,
        } => {
            // Apply overrides
            if let Some(path) = dump_file {
                config.migration.dump_file = path;
            }
            if let Some(path) = output {
                config.report.output_path = path;
            }
            if let Some(size) = chunk_size {
                config.migration.chunk_size = size;
            }

            let orchestrator = Orchestrator::new(config)?;
            let result = orchestrator.run().await?;

            if cli.output_json {
                println!("{}", result.to_json()?);
            } else {
                println!("\nMigration completed!");
                println!("  Run ID: {}", result.run_id);
                println!("  Duration: {:.2}s", result.duration_seconds);
                println!(
                    "  Statements: {} executed, {} skipped",
                    result.statements_executed,
                    result.statements_skipped.len()
                );
                println!("  Tables: {}", result.tables_total);
                println!("  Rows: {}", result.rows_transferred);
                println!("  Throughput: {} rows/sec", result.rows_per_second);
                println!(
                    "  Report: {} ({} sheets)",
                    result.report_path.display(),
                    result.report_sheets + 1
                );
            }
        }

        Commands::HealthCheck => {
            let orchestrator = Orchestrator::new(config)?;
            let result = orchestrator.health_check().await?;

            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!("Health Check Results:");
                println!(
                    "  Source (MySQL): {} ({}ms)",
                    if result.source_connected { "OK" } else { "FAILED" },
                    result.source_latency_ms
                );
                if let Some(ref err) = result.source_error {
                    println!("    Error: {}", err);
                }
                println!(
                    "  Target (PostgreSQL): {} ({}ms)",
                    if result.target_connected { "OK" } else { "FAILED" },
                    result.target_latency_ms
                );
                if let Some(ref err) = result.target_error {
                    println!("    Error: {}", err);
                }
                println!(
                    "\n  Overall: {}",
                    if result.healthy { "HEALTHY" } else { "UNHEALTHY" }
                );
            }

            if !result.healthy {
                return Err(MigrateError::connectivity(
                    "health-check",
                    "one or more servers are unreachable",
                ));
            }
        }
    }

    Ok(())
}

/// Resolve the configuration: file, then `.env` and process environment.
///
/// An explicit path must exist. Without one, `config.yaml` is used when
/// present and built-in defaults otherwise.
fn load_config(path: Option<&Path>) -> Result<Config, MigrateError> {
    let mut config = match path {
        Some(path) => {
            let config = Config::load(path)?;
            info!("Loaded configuration from {:?}", path);
            config
        }
        None if Path::new(DEFAULT_CONFIG_PATH).exists() => {
            let config = Config::load(DEFAULT_CONFIG_PATH)?;
            info!("Loaded configuration from {}", DEFAULT_CONFIG_PATH);
            config
        }
        None => {
            info!("No configuration file, using defaults");
            Config::default()
        }
    };

    if dotenvy::dotenv().is_ok() {
        info!("Loaded environment from .env");
    }
    config.apply_env();
    Ok(config)
}

fn setup_logging(verbosity: &str, format: &str) -> Result<(), String> {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        other => return Err(format!("Unknown verbosity '{}'", other)),
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_span_events(FmtSpan::CLOSE)
        .with_writer(std::io::stderr)
        .with_target(false);

    match format {
        "json" => subscriber.json().init(),
        "text" => subscriber.init(),
        other => return Err(format!("Unknown log format '{}'", other)),
    }

    Ok(())
}
