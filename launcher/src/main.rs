use std::path::PathBuf;

use clap::Parser;
use color_eyre::eyre::{self, Context};
use session::Session;
use tracing_subscriber::filter::EnvFilter;

/// Launch or attach to a goja debug harness and print the DAP endpoint for
/// a debugging front end.
#[derive(Debug, Parser)]
struct Args {
    /// Path to a VS Code-style launch configuration file
    launch_configuration: PathBuf,

    /// Name of the configuration entry to run
    #[clap(short, long)]
    name: String,
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    color_eyre::install().context("installing color_eyre")?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let config = session_config::load_from_path(&args.name, &args.launch_configuration)
        .context("loading launch configuration")?
        .ok_or_else(|| eyre::eyre!("no configuration named {:?}", args.name))?;

    let mut session = Session::new();
    let endpoint = session
        .begin(&config)
        .await
        .context("beginning debug session")?;
    tracing::info!(%endpoint, "session ready");
    println!("DAP server ready at {endpoint}");

    tokio::signal::ctrl_c()
        .await
        .context("waiting for interrupt")?;
    session.end();

    Ok(())
}
