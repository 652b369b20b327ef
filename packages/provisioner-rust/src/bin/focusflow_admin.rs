//! `focusflow-admin`: provisioning and maintenance for the FocusFlow backend.

use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use focusflow_provisioner::cli::{self, Cli};
use focusflow_provisioner::client::AppwriteClient;
use tracing::error;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    // No .env is fine; the variables may come from the shell.
    if let Err(err) = dotenvy::dotenv() {
        if !err.not_found() {
            return Err(err).context("loading .env");
        }
    }
    let lookup = cli::with_handoff(|name: &str| std::env::var(name).ok())
        .context("loading the environment hand-off file")?;

    cli::execute(cli.command, &lookup, |config| {
        Ok(AppwriteClient::connect(config)?)
    })
    .await
}
