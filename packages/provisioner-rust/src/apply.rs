//! Attribute and index appliers.
//!
//! Each applier issues exactly one creation call and classifies the result.
//! Conflicts count as success; every other error is logged with the entity
//! key and returned as [`Outcome::Failed`] so one bad entry never blocks the
//! rest of the schema.

use focusflow_core::{AttributeSpec, IndexSpec, Outcome, Status};
use tracing::{error, info};

use crate::client::{ControlPlane, ControlPlaneError};

/// Folds a creation result into an [`Outcome`] and narrates it.
pub(crate) fn classify(what: &str, result: Result<(), ControlPlaneError>) -> Outcome {
    match result {
        Ok(()) => {
            info!("{} created {what}", Status::Success);
            Outcome::Created
        }
        Err(ControlPlaneError::Conflict { .. }) => {
            info!("{} {what} already exists", Status::Info);
            Outcome::AlreadyExists
        }
        Err(err) => {
            error!("{} failed to create {what}: {err}", Status::Error);
            Outcome::failed(err.to_string())
        }
    }
}

/// Creates one attribute, normalizing it first so a required attribute is
/// never sent with a default.
pub async fn apply_attribute<C>(
    cp: &C,
    database_id: &str,
    collection_id: &str,
    attribute: &AttributeSpec,
) -> Outcome
where
    C: ControlPlane + ?Sized,
{
    let attribute = attribute.normalized();
    let result = cp
        .create_attribute(database_id, collection_id, &attribute)
        .await;
    classify(
        &format!(
            "{} attribute {collection_id}.{}",
            attribute.kind.type_name(),
            attribute.key
        ),
        result,
    )
}

/// Creates one index. Its attributes must already be available.
pub async fn apply_index<C>(
    cp: &C,
    database_id: &str,
    collection_id: &str,
    index: &IndexSpec,
) -> Outcome
where
    C: ControlPlane + ?Sized,
{
    let result = cp.create_index(database_id, collection_id, index).await;
    classify(
        &format!("{} index {collection_id}/{}", index.kind.as_str(), index.key),
        result,
    )
}
