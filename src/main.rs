use clap::Parser;
use miette::{IntoDiagnostic, Result};
use refswap::interfaces::config::DeploymentConfig;
use refswap::interfaces::csv::request_reader::RequestReader;
use refswap::interfaces::csv::settlement_writer::{SettlementWriter, write_balances};
use refswap::interfaces::script;
use std::fs::File;
use std::io;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Deployment JSON: controller address, commission config, quotes and balances
    config: PathBuf,

    /// Request script CSV
    input: PathBuf,

    /// Write final ledger balances as CSV to this path
    #[arg(long)]
    balances_out: Option<PathBuf>,

    /// Log filter, e.g. `info` or `refswap=debug`. Falls back to RUST_LOG, then `warn`.
    #[arg(long)]
    log_level: Option<String>,
}

fn init_tracing(level: Option<&str>) {
    let filter = match level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_level.as_deref());

    let world = DeploymentConfig::from_path(&cli.config)
        .into_diagnostic()?
        .deploy()
        .await
        .into_diagnostic()?;

    let file = File::open(&cli.input).into_diagnostic()?;
    let reader = RequestReader::new(file);
    let stdout = io::stdout();
    let mut writer = SettlementWriter::new(stdout.lock());

    for record in reader.requests() {
        match record {
            Ok(record) => match script::apply(&world.controller, &record).await {
                Ok(Some(settlement)) => writer.write(&settlement).into_diagnostic()?,
                Ok(None) => {}
                Err(e) => eprintln!("Error processing request: {}", e),
            },
            Err(e) => {
                eprintln!("Error reading request: {}", e);
            }
        }
    }
    writer.finish().into_diagnostic()?;

    if let Some(path) = cli.balances_out {
        let file = File::create(path).into_diagnostic()?;
        write_balances(file, &world.ledger.balances().await).into_diagnostic()?;
    }

    Ok(())
}
