//! One-shot maintenance tasks run from the admin CLI.

mod add_attribute;
mod delete_users;
mod list_collections;

pub use add_attribute::add_attribute;
pub use delete_users::{delete_users, DeletionSummary};
pub use list_collections::{list_collections, CollectionListing};

use crate::client::ControlPlaneError;

#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    #[error("collection `{0}` is not part of the catalog")]
    UnknownCollection(String),
    #[error("attribute `{key}` is not defined on collection `{collection}`")]
    UnknownAttribute { collection: String, key: String },
    #[error(transparent)]
    Remote(#[from] ControlPlaneError),
}
