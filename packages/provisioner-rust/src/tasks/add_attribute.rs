use focusflow_core::{DatabaseSpec, Outcome, Status};
use tracing::{info, warn};

use super::TaskError;
use crate::apply::apply_attribute;
use crate::client::ControlPlane;
use crate::config::ProvisionerConfig;
use crate::readiness::await_attributes;

/// Adds a single catalog attribute to an existing collection and waits for
/// it to become available.
///
/// # Errors
///
/// [`TaskError::UnknownCollection`] or [`TaskError::UnknownAttribute`] when
/// the pair is not in `catalog`. Remote failures end up in the returned
/// [`Outcome`] instead.
pub async fn add_attribute<C>(
    cp: &C,
    config: &ProvisionerConfig,
    catalog: &DatabaseSpec,
    collection: &str,
    key: &str,
) -> Result<Outcome, TaskError>
where
    C: ControlPlane + ?Sized,
{
    let spec = catalog
        .collection(collection)
        .ok_or_else(|| TaskError::UnknownCollection(collection.to_string()))?;
    let attribute = spec
        .find_attribute(key)
        .ok_or_else(|| TaskError::UnknownAttribute {
            collection: collection.to_string(),
            key: key.to_string(),
        })?;

    let collection_id = config.collection_id(&spec.id);
    let outcome = apply_attribute(cp, &config.database_id, collection_id, attribute).await;
    if !outcome.is_success() {
        return Ok(outcome);
    }

    let readiness = await_attributes(
        cp,
        &config.database_id,
        collection_id,
        &[key],
        &config.pacing.readiness,
    )
    .await;
    if readiness.all_ready() {
        info!("{} {collection_id}.{key} is available", Status::Success);
    } else {
        warn!(
            "{} {collection_id}.{key} was created but is not available yet: {}",
            Status::Warning,
            readiness.reason(key).unwrap_or("unknown")
        );
    }
    Ok(outcome)
}
