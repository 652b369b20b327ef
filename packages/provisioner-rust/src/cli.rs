//! Command-line surface of `focusflow-admin`.
//!
//! All behavior comes from environment variables. Configuration is resolved
//! before any client is constructed, so missing credentials fail fast
//! without touching the network.

use std::collections::BTreeMap;

use anyhow::Context;
use clap::{Parser, Subcommand};
use focusflow_core::{catalog, Status};
use tracing::{debug, info, warn};

use crate::client::ControlPlane;
use crate::config::{env_file_path, ClientConfig, ProvisionerConfig};
use crate::handoff::{self, EnvHandoff, HandoffError};
use crate::orchestrator::Provisioner;
use crate::tasks;

#[derive(Debug, Parser)]
#[command(
    name = "focusflow-admin",
    about = "Provision and maintain the FocusFlow Appwrite backend",
    version,
    after_help = "Configuration is read from APPWRITE_* environment variables (and .env)."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Create the database, collections, attributes and indexes, then write
    /// the environment hand-off file
    Provision,
    /// Add one catalog attribute to an existing collection
    AddAttribute {
        /// Catalog collection id, e.g. `tasks`
        collection: String,
        /// Attribute key, e.g. `priority`
        key: String,
    },
    /// List the collections of the configured database
    ListCollections,
    /// Delete every user account in the project (after a short safety window)
    DeleteUsers,
    /// Print the schema catalog as JSON; needs no credentials
    Schema,
}

/// The schema catalog, pretty-printed.
///
/// # Errors
///
/// Only if serialization fails.
pub fn schema_json() -> anyhow::Result<String> {
    serde_json::to_string_pretty(&catalog::focusflow()).context("serializing the schema catalog")
}

/// Layers the hand-off file written by `provision` under `lookup`.
///
/// Variables set through `lookup` win; anything unset (or blank) is taken
/// from the file named by `FOCUSFLOW_ENV_FILE` (default `.env.local`). A
/// missing file is not an error.
///
/// # Errors
///
/// [`HandoffError`] if the file exists but cannot be read or parsed.
pub fn with_handoff<F>(lookup: F) -> Result<impl Fn(&str) -> Option<String>, HandoffError>
where
    F: Fn(&str) -> Option<String>,
{
    let path = env_file_path(&lookup);
    let saved = match handoff::read_values(&path) {
        Ok(values) => {
            debug!(path = %path.display(), keys = values.len(), "loaded hand-off file");
            values
        }
        Err(err) if err.is_not_found() => BTreeMap::new(),
        Err(err) => return Err(err),
    };
    Ok(move |name: &str| {
        lookup(name)
            .filter(|value| !value.trim().is_empty())
            .or_else(|| saved.get(name).cloned())
    })
}

/// Runs `command`, reading configuration through `lookup` and building the
/// remote client with `connect` only once the configuration is valid.
///
/// # Errors
///
/// Configuration errors, fatal provisioning errors, and task errors.
/// Per-entity failures in a provisioning report are only warned about.
pub async fn execute<F, K, C>(command: Command, lookup: &F, connect: K) -> anyhow::Result<()>
where
    F: Fn(&str) -> Option<String>,
    K: FnOnce(&ClientConfig) -> anyhow::Result<C>,
    C: ControlPlane,
{
    if command == Command::Schema {
        println!("{}", schema_json()?);
        return Ok(());
    }

    let config = ProvisionerConfig::from_lookup(lookup)?;
    info!(
        endpoint = %config.client.endpoint,
        project = %config.client.project_id,
        database = %config.database_id,
        "configuration loaded"
    );
    let cp = connect(&config.client).context("building the control-plane client")?;

    match command {
        Command::Provision => provision(&cp, &config).await,
        Command::AddAttribute { collection, key } => {
            let outcome =
                tasks::add_attribute(&cp, &config, &catalog::focusflow(), &collection, &key)
                    .await?;
            info!("{} {collection}.{key}: {outcome:?}", Status::for_outcome(&outcome));
            Ok(())
        }
        Command::ListCollections => {
            tasks::list_collections(&cp, &config).await?;
            Ok(())
        }
        Command::DeleteUsers => {
            let summary = tasks::delete_users(&cp, &config).await?;
            if summary.failed > 0 {
                warn!("{} {} deletion(s) failed", Status::Warning, summary.failed);
            }
            Ok(())
        }
        Command::Schema => Ok(()),
    }
}

async fn provision<C: ControlPlane>(cp: &C, config: &ProvisionerConfig) -> anyhow::Result<()> {
    let schema = catalog::focusflow();
    let mut provisioner = Provisioner::new(cp, config);
    let result = provisioner.run(&schema).await;
    let report = match result {
        Ok(report) => report,
        Err(err) => {
            return Err(err).with_context(|| {
                format!(
                    "provisioning aborted during {} ({})",
                    provisioner.phase(),
                    provisioner.report().summary()
                )
            })
        }
    };

    if !report.is_clean() {
        warn!(
            "{} {} entit{} could not be created:",
            Status::Warning,
            report.failures().len(),
            if report.failures().len() == 1 { "y" } else { "ies" }
        );
        for (entity, reason) in report.failures() {
            warn!("  {entity}: {reason}");
        }
    }

    let handoff = EnvHandoff::from_config(config);
    if let Ok(previous) = EnvHandoff::read_from(&config.env_file) {
        let changed = handoff.drift(&previous);
        if !changed.is_empty() {
            warn!(
                "{} {} differs from this configuration: {}",
                Status::Warning,
                config.env_file.display(),
                changed.join(", ")
            );
        }
    }
    handoff.write_to(&config.env_file)?;
    info!(
        "{} wrote environment hand-off to {}",
        Status::Success,
        config.env_file.display()
    );
    Ok(())
}
