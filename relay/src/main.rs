mod config;
mod observability;

use clap::{Parser, Subcommand};
use config::Config;
use lead_relay::metrics_defs::ALL_METRICS;
use std::path::PathBuf;
use std::process;

#[derive(Parser)]
#[command(about = "Server-side relay for lead conversion events")]
struct Cli {
    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand)]
enum CliCommand {
    /// Run the lead relay and its admin listener
    LeadRelay {
        #[arg(long)]
        config_file: PathBuf,
    },
    /// Print every metric the relay emits
    ListMetrics,
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        CliCommand::LeadRelay { config_file } => {
            if let Err(e) = run_lead_relay(&config_file) {
                eprintln!("Lead relay error: {e}");
                process::exit(1);
            }
        }
        CliCommand::ListMetrics => {
            for def in ALL_METRICS {
                println!("{}\t{}\t{}", def.name, def.metric_type.as_str(), def.description);
            }
        }
    }
}

fn run_lead_relay(config_file: &std::path::Path) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = Config::from_file(config_file)?;
    let lead_relay_config = config.lead_relay(|name| std::env::var(name).ok())?;
    let _guard = observability::init(&config.common.logging, config.common.metrics.as_ref())?;

    tracing::info!(
        host = %lead_relay_config.listener.host,
        port = lead_relay_config.listener.port,
        "Starting lead relay"
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(lead_relay::run(lead_relay_config))?;

    Ok(())
}
