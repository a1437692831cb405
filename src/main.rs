use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use smartfloors::config::{Config, LoggingConfig};
use smartfloors::pipeline::TickReport;

#[derive(Parser)]
#[command(
    name = "smartfloors",
    about = "Floor telemetry simulator with forecasting and preventive alerts",
    version,
    long_about = None
)]
struct Cli {
    /// Path to a TOML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the daemon (tick loop + API server)
    Serve {
        /// Bind address, overrides the config file
        #[arg(long)]
        bind: Option<String>,
    },

    /// Run a fixed number of ticks and print readings and alerts
    Simulate {
        /// Number of ticks to run
        #[arg(long, default_value = "1")]
        ticks: u32,

        /// Number of floors, overrides the config file
        #[arg(long)]
        floors: Option<u32>,

        /// RNG seed for a reproducible run
        #[arg(long)]
        seed: Option<u64>,

        /// JSON output for machine parsing
        #[arg(long)]
        json: bool,
    },

    /// Print the effective configuration as TOML
    Config,
}

fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

/// Scoped subscriber for config resolution, before the configured one exists.
fn bootstrap_subscriber() -> impl tracing::Subscriber + Send + Sync {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter("info"))
        .with_writer(std::io::stderr)
        .finish()
}

fn init_tracing(logging: &LoggingConfig) {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter(&logging.level))
        .with_writer(std::io::stderr);
    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
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
                config.api.bind = bind;
                config.validate()?;
            }
            tracing::info!(bind = %config.api.bind, "Starting SmartFloors daemon");
            smartfloors::serve(config).await?;
        }
        Commands::Simulate {
            ticks,
            floors,
            seed,
            json,
        } => {
            if let Some(floors) = floors {
                config.building.floors = floors;
            }
            if seed.is_some() {
                config.simulation.seed = seed;
            }
            config.validate()?;

            let reports = smartfloors::simulate(&config, ticks).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&reports)?);
            } else {
                for (i, report) in reports.iter().enumerate() {
                    print_report(i + 1, report);
                }
            }
        }
        Commands::Config => {
            print!("{}", config.to_toml()?);
        }
    }

    Ok(())
}

fn print_report(tick: usize, report: &TickReport) {
    println!(
        "\n=== Tick {} @ {} ===",
        tick,
        report.timestamp.format("%Y-%m-%d %H:%M:%S UTC")
    );
    println!(
        "{:<10} | {:>9} | {:>8} | {:>8} | {:>10}",
        "Floor", "Occupancy", "Temp °C", "Humid %", "Power kWh"
    );
    println!("{:-<10}-|-{:-<9}-|-{:-<8}-|-{:-<8}-|-{:-<10}", "", "", "", "", "");
    for r in &report.readings {
        println!(
            "{:<10} | {:>9} | {:>8.1} | {:>8} | {:>10.2}",
            r.name, r.occupancy, r.temperature, r.humidity, r.power_consumption
        );
    }

    let alerts: Vec<_> = report
        .observed_alerts
        .iter()
        .chain(&report.predictive_alerts)
        .collect();
    if alerts.is_empty() {
        println!("No alerts.");
        return;
    }
    println!("\nAlerts:");
    for alert in alerts {
        println!(
            " [{}] {} ({:?})",
            alert.severity.to_string().to_uppercase(),
            alert.floor_name,
            alert.kind
        );
        for anomaly in &alert.anomalies {
            println!("   - {}", anomaly.message);
            println!("     -> {}", anomaly.recommendation);
        }
    }
}
