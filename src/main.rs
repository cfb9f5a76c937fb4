use anyhow::Context;
use clap::Parser;
use cncterm::{init_logging, Config, Session};
use std::path::PathBuf;
use tokio::io::BufReader;

/// Interactive terminal for CNC controllers
#[derive(Debug, Parser)]
#[command(name = "cncterm", version, about)]
struct Args {
    /// Configuration file (.toml or .json)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, value_name = "LEVEL", default_value = "warn")]
    log_level: String,

    /// Write the effective configuration to FILE and exit
    #[arg(long, value_name = "FILE")]
    dump_config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level)?;
    tracing::debug!("cncterm {} built {}", cncterm::VERSION, cncterm::BUILD_DATE);

    let config = Config::load_or_default(args.config.as_deref())
        .context("Failed to load configuration")?;

    if let Some(path) = args.dump_config {
        config
            .save_to_file(&path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        println!("Configuration written to {}", path.display());
        return Ok(());
    }

    let mut session = Session::new(config).context("Failed to start session")?;
    session
        .run(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
        .await?;

    Ok(())
}
