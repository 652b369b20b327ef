//! In-memory [`ControlPlane`] that records every call.
//!
//! Behaves like a tiny remote store: creating something twice yields a
//! conflict, attributes can be held in `processing` for a number of polls,
//! and any entity can be made to fail with an injected error.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use focusflow_core::{AttributeSpec, CollectionSpec, IndexSpec};
use parking_lot::Mutex;
use tokio::time::Instant;

use super::{AttributeStatus, CollectionSummary, ControlPlane, ControlPlaneError, UserSummary};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Call {
    CreateDatabase(String),
    CreateCollection(String),
    CreateAttribute {
        collection: String,
        key: String,
        required: bool,
        has_default: bool,
    },
    AttributeStatus {
        collection: String,
        key: String,
    },
    CreateIndex {
        collection: String,
        key: String,
    },
    ListCollections,
    ListUsers,
    DeleteUser(String),
}

#[derive(Default)]
struct State {
    calls: Vec<(Instant, Call)>,
    databases: HashSet<String>,
    collections: Vec<(String, String)>,
    attributes: HashSet<(String, String)>,
    indexes: HashSet<(String, String)>,
    failures: HashMap<String, ControlPlaneError>,
    processing: HashMap<(String, String), usize>,
    stuck: HashSet<(String, String)>,
    users: Vec<UserSummary>,
}

#[derive(Default)]
pub(crate) struct FakeControlPlane {
    state: Mutex<State>,
}

pub(crate) fn remote_error(status: u16, message: &str) -> ControlPlaneError {
    ControlPlaneError::Remote {
        status,
        kind: "general_argument_invalid".to_string(),
        message: message.to_string(),
    }
}

fn pair(a: &str, b: &str) -> (String, String) {
    (a.to_string(), b.to_string())
}

impl FakeControlPlane {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Makes every call touching `target` fail with `error`.
    ///
    /// Targets: `database:<id>`, `collection:<id>`, `attribute:<coll>.<key>`,
    /// `index:<coll>/<key>`, `user:<id>`, `list:users`, `list:collections`.
    pub(crate) fn fail(self, target: &str, error: ControlPlaneError) -> Self {
        self.state.lock().failures.insert(target.to_string(), error);
        self
    }

    /// Answers `processing` for the first `polls` status checks of an attribute.
    pub(crate) fn processing_for(self, collection: &str, key: &str, polls: usize) -> Self {
        self.state
            .lock()
            .processing
            .insert(pair(collection, key), polls);
        self
    }

    /// Answers `stuck` for every status check of an attribute.
    pub(crate) fn stuck(self, collection: &str, key: &str) -> Self {
        self.state.lock().stuck.insert(pair(collection, key));
        self
    }

    pub(crate) fn with_users(self, ids: &[&str]) -> Self {
        self.state.lock().users = ids
            .iter()
            .map(|id| UserSummary {
                id: (*id).to_string(),
                name: format!("User {id}"),
                email: format!("{id}@example.com"),
            })
            .collect();
        self
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.state.lock().calls.iter().map(|(_, c)| c.clone()).collect()
    }

    pub(crate) fn timed_calls(&self) -> Vec<(Instant, Call)> {
        self.state.lock().calls.clone()
    }

    pub(crate) fn remaining_users(&self) -> usize {
        self.state.lock().users.len()
    }

    fn begin(&self, call: Call, target: &str) -> Result<(), ControlPlaneError> {
        let mut state = self.state.lock();
        state.calls.push((Instant::now(), call));
        match state.failures.get(target) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

fn conflict(what: &str) -> ControlPlaneError {
    ControlPlaneError::Conflict {
        message: format!("{what} already exists"),
    }
}

#[async_trait]
impl ControlPlane for FakeControlPlane {
    async fn create_database(&self, database_id: &str, _name: &str) -> Result<(), ControlPlaneError> {
        self.begin(
            Call::CreateDatabase(database_id.to_string()),
            &format!("database:{database_id}"),
        )?;
        if self.state.lock().databases.insert(database_id.to_string()) {
            Ok(())
        } else {
            Err(conflict("database"))
        }
    }

    async fn create_collection(
        &self,
        _database_id: &str,
        collection_id: &str,
        collection: &CollectionSpec,
    ) -> Result<(), ControlPlaneError> {
        self.begin(
            Call::CreateCollection(collection_id.to_string()),
            &format!("collection:{collection_id}"),
        )?;
        let mut state = self.state.lock();
        if state.collections.iter().any(|(id, _)| id == collection_id) {
            return Err(conflict("collection"));
        }
        state
            .collections
            .push(pair(collection_id, &collection.name));
        Ok(())
    }

    async fn create_attribute(
        &self,
        _database_id: &str,
        collection_id: &str,
        attribute: &AttributeSpec,
    ) -> Result<(), ControlPlaneError> {
        self.begin(
            Call::CreateAttribute {
                collection: collection_id.to_string(),
                key: attribute.key.clone(),
                required: attribute.required,
                has_default: attribute.default_value().is_some(),
            },
            &format!("attribute:{collection_id}.{}", attribute.key),
        )?;
        if attribute.required && attribute.default_value().is_some() {
            return Err(remote_error(
                400,
                "Cannot set default value for required attribute",
            ));
        }
        if self
            .state
            .lock()
            .attributes
            .insert(pair(collection_id, &attribute.key))
        {
            Ok(())
        } else {
            Err(conflict("attribute"))
        }
    }

    async fn attribute_status(
        &self,
        _database_id: &str,
        collection_id: &str,
        key: &str,
    ) -> Result<AttributeStatus, ControlPlaneError> {
        self.begin(
            Call::AttributeStatus {
                collection: collection_id.to_string(),
                key: key.to_string(),
            },
            &format!("status:{collection_id}.{key}"),
        )?;
        let mut state = self.state.lock();
        let id = pair(collection_id, key);
        if !state.attributes.contains(&id) {
            return Err(ControlPlaneError::Remote {
                status: 404,
                kind: "attribute_not_found".to_string(),
                message: "Attribute with the requested ID could not be found.".to_string(),
            });
        }
        if state.stuck.contains(&id) {
            return Ok(AttributeStatus::Stuck);
        }
        match state.processing.get_mut(&id) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                Ok(AttributeStatus::Processing)
            }
            _ => Ok(AttributeStatus::Available),
        }
    }

    async fn create_index(
        &self,
        _database_id: &str,
        collection_id: &str,
        index: &IndexSpec,
    ) -> Result<(), ControlPlaneError> {
        self.begin(
            Call::CreateIndex {
                collection: collection_id.to_string(),
                key: index.key.clone(),
            },
            &format!("index:{collection_id}/{}", index.key),
        )?;
        if self
            .state
            .lock()
            .indexes
            .insert(pair(collection_id, &index.key))
        {
            Ok(())
        } else {
            Err(conflict("index"))
        }
    }

    async fn list_collections(
        &self,
        _database_id: &str,
    ) -> Result<Vec<CollectionSummary>, ControlPlaneError> {
        self.begin(Call::ListCollections, "list:collections")?;
        let state = self.state.lock();
        Ok(state
            .collections
            .iter()
            .map(|(id, name)| CollectionSummary {
                id: id.clone(),
                name: name.clone(),
                attributes: state.attributes.iter().filter(|(c, _)| c == id).count(),
            })
            .collect())
    }

    async fn list_users(&self) -> Result<Vec<UserSummary>, ControlPlaneError> {
        self.begin(Call::ListUsers, "list:users")?;
        Ok(self.state.lock().users.clone())
    }

    async fn delete_user(&self, user_id: &str) -> Result<(), ControlPlaneError> {
        self.begin(Call::DeleteUser(user_id.to_string()), &format!("user:{user_id}"))?;
        let mut state = self.state.lock();
        let before = state.users.len();
        state.users.retain(|u| u.id != user_id);
        if state.users.len() == before {
            Err(remote_error(404, "User with the requested ID could not be found."))
        } else {
            Ok(())
        }
    }
}
