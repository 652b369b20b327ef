//! Control-plane client abstraction.
//!
//! [`ControlPlane`] is the single seam between provisioning logic and the
//! remote service. [`AppwriteClient`] talks to a real Appwrite endpoint; unit
//! tests substitute a recording fake.

pub mod appwrite;

#[cfg(test)]
pub(crate) mod fake;

use async_trait::async_trait;
use focusflow_core::{AttributeSpec, CollectionSpec, IndexSpec};
use serde::Deserialize;

pub use appwrite::AppwriteClient;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Failure of a single control-plane call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ControlPlaneError {
    /// HTTP 409: the entity already exists.
    #[error("already exists: {message}")]
    Conflict { message: String },
    /// Any other non-success response.
    #[error("remote error {status} ({kind}): {message}")]
    Remote {
        status: u16,
        kind: String,
        message: String,
    },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("could not decode response: {0}")]
    Decode(String),
}

impl ControlPlaneError {
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    /// Worth polling again: the network hiccuped or the entity is not visible yet.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Remote { status, .. } => *status == 404 || *status == 429 || *status >= 500,
            Self::Conflict { .. } | Self::Decode(_) => false,
        }
    }
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

/// Lifecycle state of an attribute on the remote store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeStatus {
    Available,
    Processing,
    Deleting,
    Stuck,
    Failed,
    Other(String),
}

impl AttributeStatus {
    /// The attribute will never become available without intervention.
    #[must_use]
    pub fn is_terminal_failure(&self) -> bool {
        matches!(self, Self::Stuck | Self::Failed)
    }
}

impl From<&str> for AttributeStatus {
    fn from(raw: &str) -> Self {
        match raw {
            "available" => Self::Available,
            "processing" => Self::Processing,
            "deleting" => Self::Deleting,
            "stuck" => Self::Stuck,
            "failed" => Self::Failed,
            other => Self::Other(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CollectionSummary {
    #[serde(rename = "$id")]
    pub id: String,
    pub name: String,
    #[serde(default, deserialize_with = "count_entries")]
    pub attributes: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UserSummary {
    #[serde(rename = "$id")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
}

fn count_entries<'de, D>(deserializer: D) -> Result<usize, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let entries = Vec::<serde_json::Value>::deserialize(deserializer)?;
    Ok(entries.len())
}

// ---------------------------------------------------------------------------
// ControlPlane trait
// ---------------------------------------------------------------------------

/// Administrative operations against the remote store.
///
/// Every method issues exactly one logical request (list methods may page
/// internally). Callers await each call before issuing the next.
#[async_trait]
pub trait ControlPlane: Send + Sync {
    async fn create_database(&self, database_id: &str, name: &str) -> Result<(), ControlPlaneError>;

    /// Creates `collection` under `collection_id`, which may differ from
    /// `collection.id` when the operator overrides it.
    async fn create_collection(
        &self,
        database_id: &str,
        collection_id: &str,
        collection: &CollectionSpec,
    ) -> Result<(), ControlPlaneError>;

    /// Creates one attribute. Callers are expected to pass a normalized spec.
    async fn create_attribute(
        &self,
        database_id: &str,
        collection_id: &str,
        attribute: &AttributeSpec,
    ) -> Result<(), ControlPlaneError>;

    async fn attribute_status(
        &self,
        database_id: &str,
        collection_id: &str,
        key: &str,
    ) -> Result<AttributeStatus, ControlPlaneError>;

    async fn create_index(
        &self,
        database_id: &str,
        collection_id: &str,
        index: &IndexSpec,
    ) -> Result<(), ControlPlaneError>;

    async fn list_collections(
        &self,
        database_id: &str,
    ) -> Result<Vec<CollectionSummary>, ControlPlaneError>;

    async fn list_users(&self) -> Result<Vec<UserSummary>, ControlPlaneError>;

    async fn delete_user(&self, user_id: &str) -> Result<(), ControlPlaneError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(ControlPlaneError::Transport("reset".into()).is_transient());
        let not_found = ControlPlaneError::Remote {
            status: 404,
            kind: "attribute_not_found".into(),
            message: "Attribute not found".into(),
        };
        assert!(not_found.is_transient());
        let bad = ControlPlaneError::Remote {
            status: 400,
            kind: "attribute_value_invalid".into(),
            message: "bad".into(),
        };
        assert!(!bad.is_transient());
        assert!(!ControlPlaneError::Conflict { message: String::new() }.is_transient());
    }

    #[test]
    fn attribute_status_parsing() {
        assert_eq!(AttributeStatus::from("available"), AttributeStatus::Available);
        assert_eq!(AttributeStatus::from("processing"), AttributeStatus::Processing);
        assert!(AttributeStatus::from("failed").is_terminal_failure());
        assert!(AttributeStatus::from("stuck").is_terminal_failure());
        assert_eq!(
            AttributeStatus::from("weird"),
            AttributeStatus::Other("weird".to_string())
        );
    }

    #[test]
    fn collection_summary_counts_attributes() {
        let json = serde_json::json!({
            "$id": "tasks",
            "name": "Tasks",
            "attributes": [{"key": "a"}, {"key": "b"}],
            "indexes": []
        });
        let summary: CollectionSummary = serde_json::from_value(json).unwrap();
        assert_eq!(summary.id, "tasks");
        assert_eq!(summary.attributes, 2);
    }
}
