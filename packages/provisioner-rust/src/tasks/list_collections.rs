use focusflow_core::Status;
use tracing::{info, warn};

use super::TaskError;
use crate::client::{CollectionSummary, ControlPlane};
use crate::config::ProvisionerConfig;

/// Remote collections plus the catalog collections that are absent remotely.
#[derive(Debug, Clone, Default)]
pub struct CollectionListing {
    pub collections: Vec<CollectionSummary>,
    /// Remote ids (after configuration overrides) with no matching collection.
    pub missing: Vec<String>,
}

/// Lists every collection in the configured database.
///
/// # Errors
///
/// [`TaskError::Remote`] if the listing call fails.
pub async fn list_collections<C>(
    cp: &C,
    config: &ProvisionerConfig,
) -> Result<CollectionListing, TaskError>
where
    C: ControlPlane + ?Sized,
{
    let collections = cp.list_collections(&config.database_id).await?;
    info!(
        "found {} collection(s) in database {}",
        collections.len(),
        config.database_id
    );
    for c in &collections {
        info!("  {} ({}): {} attribute(s)", c.id, c.name, c.attributes);
    }

    let missing: Vec<String> = config
        .collections
        .iter()
        .map(|(_, remote)| remote)
        .filter(|remote| !collections.iter().any(|c| c.id == *remote))
        .map(str::to_string)
        .collect();
    for id in &missing {
        warn!("{} catalog collection {id} is missing", Status::Warning);
    }

    Ok(CollectionListing {
        collections,
        missing,
    })
}
