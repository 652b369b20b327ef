//! Provisioning orchestrator.
//!
//! Walks a [`DatabaseSpec`] strictly in order:
//!
//! `Idle -> CreateDatabase -> { CreateCollection -> CreateAttributes -> AwaitSettle -> CreateIndexes }* -> Done`
//!
//! Every remote call is awaited before the next one is issued. Unexpected
//! errors while creating the database or a collection abort the run;
//! attribute and index errors are recorded in the report and the run goes on.

use std::fmt;
use std::time::Duration;

use focusflow_core::{
    CollectionSpec, DatabaseSpec, EntityRef, Outcome, ProvisionReport, SchemaError, Status,
};
use tracing::{debug, error, info, warn};

use crate::apply::{apply_attribute, apply_index, classify};
use crate::client::{ControlPlane, ControlPlaneError};
use crate::config::ProvisionerConfig;
use crate::readiness::await_attributes;

/// Errors that stop a provisioning run.
#[derive(Debug, thiserror::Error)]
pub enum ProvisionError {
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error("unexpected error creating {entity}: {source}")]
    Fatal {
        entity: EntityRef,
        #[source]
        source: ControlPlaneError,
    },
}

/// Position of the orchestrator in its linear state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phase {
    Idle,
    CreateDatabase,
    CreateCollection { collection: String },
    CreateAttributes { collection: String },
    AwaitSettle { collection: String },
    CreateIndexes { collection: String },
    Done,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => f.write_str("idle"),
            Self::CreateDatabase => f.write_str("create-database"),
            Self::CreateCollection { collection } => write!(f, "create-collection({collection})"),
            Self::CreateAttributes { collection } => write!(f, "create-attributes({collection})"),
            Self::AwaitSettle { collection } => write!(f, "await-settle({collection})"),
            Self::CreateIndexes { collection } => write!(f, "create-indexes({collection})"),
            Self::Done => f.write_str("done"),
        }
    }
}

/// Drives one provisioning run against a [`ControlPlane`].
pub struct Provisioner<'a, C: ControlPlane + ?Sized> {
    cp: &'a C,
    config: &'a ProvisionerConfig,
    phase: Phase,
    report: ProvisionReport,
}

impl<'a, C: ControlPlane + ?Sized> Provisioner<'a, C> {
    #[must_use]
    pub fn new(cp: &'a C, config: &'a ProvisionerConfig) -> Self {
        Self {
            cp,
            config,
            phase: Phase::Idle,
            report: ProvisionReport::new(),
        }
    }

    /// Current phase. After a fatal error this is the phase that failed.
    #[must_use]
    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    /// Outcomes recorded so far, including those of an aborted run.
    #[must_use]
    pub fn report(&self) -> &ProvisionReport {
        &self.report
    }

    fn enter(&mut self, phase: Phase) {
        debug!(from = %self.phase, to = %phase, "phase transition");
        self.phase = phase;
    }

    async fn pace(&self) {
        let delay = self.config.pacing.call_delay;
        if delay > Duration::ZERO {
            tokio::time::sleep(delay).await;
        }
    }

    /// Provisions `spec` and returns the per-entity report.
    ///
    /// The database id and collection ids sent to the remote store come from
    /// the configuration, so the catalog ids can be overridden per deployment.
    ///
    /// # Errors
    ///
    /// - [`ProvisionError::Schema`] if `spec` fails validation (no call is made).
    /// - [`ProvisionError::Fatal`] if creating the database or a collection
    ///   fails with anything other than a conflict.
    pub async fn run(&mut self, spec: &DatabaseSpec) -> Result<ProvisionReport, ProvisionError> {
        spec.validate()?;

        self.enter(Phase::CreateDatabase);
        let database_id = self.config.database_id.clone();
        let result = self.cp.create_database(&database_id, &spec.name).await;
        self.fatal_on_unexpected(EntityRef::Database { id: database_id }, result)?;

        for collection in &spec.collections {
            self.provision_collection(collection).await?;
        }

        self.enter(Phase::Done);
        info!("{} provisioning finished: {}", Status::Success, self.report.summary());
        Ok(self.report.clone())
    }

    /// Records the outcome of a database/collection call, aborting on
    /// anything but success or conflict.
    fn fatal_on_unexpected(
        &mut self,
        entity: EntityRef,
        result: Result<(), ControlPlaneError>,
    ) -> Result<(), ProvisionError> {
        match result {
            Err(source) if !source.is_conflict() => {
                error!("{} unexpected error creating {entity}: {source}", Status::Error);
                self.report
                    .record(entity.clone(), Outcome::failed(source.to_string()));
                Err(ProvisionError::Fatal { entity, source })
            }
            result => {
                let outcome = classify(&entity.to_string(), result);
                self.report.record(entity, outcome);
                Ok(())
            }
        }
    }

    async fn provision_collection(&mut self, collection: &CollectionSpec) -> Result<(), ProvisionError> {
        let cp = self.cp;
        let database_id = self.config.database_id.clone();
        let collection_id = self.config.collection_id(&collection.id).to_string();

        self.enter(Phase::CreateCollection {
            collection: collection_id.clone(),
        });
        let result = cp
            .create_collection(&database_id, &collection_id, collection)
            .await;
        self.fatal_on_unexpected(
            EntityRef::Collection {
                id: collection_id.clone(),
            },
            result,
        )?;

        self.enter(Phase::CreateAttributes {
            collection: collection_id.clone(),
        });
        let mut unavailable = Vec::new();
        for attribute in &collection.attributes {
            self.pace().await;
            let outcome = apply_attribute(cp, &database_id, &collection_id, attribute).await;
            if !outcome.is_success() {
                unavailable.push(attribute.key.as_str());
            }
            self.report.record(
                EntityRef::Attribute {
                    collection: collection_id.clone(),
                    key: attribute.key.clone(),
                },
                outcome,
            );
        }

        if collection.indexes.is_empty() {
            return Ok(());
        }

        self.enter(Phase::AwaitSettle {
            collection: collection_id.clone(),
        });
        let keys: Vec<&str> = collection
            .indexed_attribute_keys()
            .into_iter()
            .filter(|key| !unavailable.contains(key))
            .collect();
        let readiness = await_attributes(
            cp,
            &database_id,
            &collection_id,
            &keys,
            &self.config.pacing.readiness,
        )
        .await;

        self.enter(Phase::CreateIndexes {
            collection: collection_id.clone(),
        });
        for index in &collection.indexes {
            let entity = EntityRef::Index {
                collection: collection_id.clone(),
                key: index.key.clone(),
            };
            let failed = index
                .attributes
                .iter()
                .find(|a| unavailable.contains(&a.as_str()));
            let blocked = index.attributes.iter().find(|a| !readiness.is_ready(a));
            let outcome = if let Some(attr) = failed {
                let reason = format!("attribute `{attr}` could not be created");
                warn!("{} skipping {entity}: {reason}", Status::Warning);
                Outcome::Failed { reason }
            } else if let Some(attr) = blocked {
                let reason = format!(
                    "attribute `{attr}` is not available: {}",
                    readiness.reason(attr).unwrap_or("unknown")
                );
                warn!("{} skipping {entity}: {reason}", Status::Warning);
                Outcome::Failed { reason }
            } else {
                self.pace().await;
                apply_index(cp, &database_id, &collection_id, index).await
            };
            self.report.record(entity, outcome);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use focusflow_core::catalog;
    use focusflow_core::{AttributeSpec, IndexSpec};

    use super::*;
    use crate::client::fake::{remote_error, Call, FakeControlPlane};
    use crate::config::{ClientConfig, CollectionIds, Pacing};

    fn config(pacing: Pacing) -> ProvisionerConfig {
        ProvisionerConfig {
            client: ClientConfig::new("http://localhost/v1", "proj", "key").unwrap(),
            database_id: "focusflow".to_string(),
            collections: CollectionIds::default(),
            pacing,
            env_file: ".env.test".into(),
        }
    }

    fn small_spec() -> DatabaseSpec {
        DatabaseSpec {
            id: "focusflow".to_string(),
            name: "FocusFlow".to_string(),
            collections: vec![
                CollectionSpec::new("tasks", "Tasks")
                    .attribute(AttributeSpec::string("userId", 36).required())
                    .attribute(AttributeSpec::string("title", 255).required())
                    .attribute(AttributeSpec::datetime("dueDate"))
                    .index(IndexSpec::key("tasks_user_idx", ["userId"]))
                    .index(IndexSpec::key("tasks_due_idx", ["userId", "dueDate"])),
                CollectionSpec::new("notes", "Notes")
                    .attribute(AttributeSpec::string("userId", 36).required())
                    .index(IndexSpec::key("notes_user_idx", ["userId"])),
            ],
        }
    }

    #[tokio::test]
    async fn full_catalog_provisions_cleanly_and_is_idempotent() {
        let cp = FakeControlPlane::new();
        let cfg = config(Pacing::immediate());
        let spec = catalog::focusflow();

        let first = Provisioner::new(&cp, &cfg).run(&spec).await.unwrap();
        assert!(first.is_clean());
        assert_eq!(first.already_existing(), 0);
        assert_eq!(first.created(), first.entries.len());

        let second = Provisioner::new(&cp, &cfg).run(&spec).await.unwrap();
        assert!(second.is_clean());
        assert_eq!(second.created(), 0);
        assert_eq!(second.already_existing(), first.entries.len());
        let first_entities: Vec<_> = first.entries.iter().map(|(e, _)| e).collect();
        let second_entities: Vec<_> = second.entries.iter().map(|(e, _)| e).collect();
        assert_eq!(first_entities, second_entities);
    }

    #[tokio::test]
    async fn indexes_wait_for_every_attribute_of_their_collection() {
        let cp = FakeControlPlane::new();
        let cfg = config(Pacing::immediate());
        Provisioner::new(&cp, &cfg).run(&small_spec()).await.unwrap();

        let calls = cp.calls();
        for collection in ["tasks", "notes"] {
            let last_attribute = calls
                .iter()
                .rposition(|c| matches!(c, Call::CreateAttribute { collection: col, .. } if col == collection))
                .unwrap();
            let first_index = calls
                .iter()
                .position(|c| matches!(c, Call::CreateIndex { collection: col, .. } if col == collection))
                .unwrap();
            assert!(last_attribute < first_index, "{collection}: index before attribute");
        }
        assert_eq!(calls[0], Call::CreateDatabase("focusflow".to_string()));
        assert_eq!(calls[1], Call::CreateCollection("tasks".to_string()));
    }

    #[tokio::test]
    async fn attribute_and_index_errors_do_not_abort() {
        let cp = FakeControlPlane::new()
            .fail("attribute:tasks.title", remote_error(400, "Invalid key"))
            .fail("index:tasks/tasks_user_idx", remote_error(500, "Server error"));
        let cfg = config(Pacing::immediate());
        let mut provisioner = Provisioner::new(&cp, &cfg);
        let report = provisioner.run(&small_spec()).await.unwrap();

        assert_eq!(provisioner.phase(), &Phase::Done);
        assert_eq!(report.failures().len(), 2);
        // notes still got provisioned after the tasks failures
        assert_eq!(
            report.outcome_of(&EntityRef::Index {
                collection: "notes".to_string(),
                key: "notes_user_idx".to_string(),
            }),
            Some(&Outcome::Created)
        );
    }

    #[tokio::test]
    async fn conflict_on_database_and_collection_is_not_fatal() {
        let cp = FakeControlPlane::new();
        cp.create_database("focusflow", "FocusFlow").await.unwrap();
        cp.create_collection("focusflow", "tasks", &CollectionSpec::new("tasks", "Tasks"))
            .await
            .unwrap();
        let cfg = config(Pacing::immediate());
        let report = Provisioner::new(&cp, &cfg).run(&small_spec()).await.unwrap();
        assert_eq!(
            report.outcome_of(&EntityRef::Database {
                id: "focusflow".to_string()
            }),
            Some(&Outcome::AlreadyExists)
        );
        assert_eq!(
            report.outcome_of(&EntityRef::Collection {
                id: "tasks".to_string()
            }),
            Some(&Outcome::AlreadyExists)
        );
    }

    #[tokio::test]
    async fn unexpected_database_error_is_fatal() {
        let cp = FakeControlPlane::new().fail("database:focusflow", remote_error(401, "Unauthorized"));
        let cfg = config(Pacing::immediate());
        let mut provisioner = Provisioner::new(&cp, &cfg);
        let err = provisioner.run(&small_spec()).await.unwrap_err();
        assert!(matches!(
            err,
            ProvisionError::Fatal {
                entity: EntityRef::Database { .. },
                ..
            }
        ));
        assert_eq!(provisioner.phase(), &Phase::CreateDatabase);
        assert_eq!(cp.calls().len(), 1);
    }

    #[tokio::test]
    async fn unexpected_collection_error_stops_the_run() {
        let cp = FakeControlPlane::new().fail("collection:tasks", remote_error(500, "boom"));
        let cfg = config(Pacing::immediate());
        let mut provisioner = Provisioner::new(&cp, &cfg);
        let err = provisioner.run(&small_spec()).await.unwrap_err();
        assert!(err.to_string().contains("collection tasks"));
        assert_eq!(
            provisioner.phase(),
            &Phase::CreateCollection {
                collection: "tasks".to_string()
            }
        );
        let calls = cp.calls();
        assert!(!calls.iter().any(|c| matches!(c, Call::CreateAttribute { .. })));
        assert!(!calls.contains(&Call::CreateCollection("notes".to_string())));
        assert!(!provisioner.report().is_clean());
    }

    #[tokio::test]
    async fn invalid_schema_makes_no_calls() {
        let cp = FakeControlPlane::new();
        let cfg = config(Pacing::immediate());
        let mut spec = small_spec();
        spec.collections[0]
            .indexes
            .push(IndexSpec::key("broken", ["missing"]));
        let err = Provisioner::new(&cp, &cfg).run(&spec).await.unwrap_err();
        assert!(matches!(err, ProvisionError::Schema(_)));
        assert!(cp.calls().is_empty());
    }

    #[tokio::test]
    async fn index_over_unavailable_attribute_is_skipped() {
        let cp = FakeControlPlane::new().stuck("tasks", "dueDate");
        let cfg = config(Pacing::immediate());
        let report = Provisioner::new(&cp, &cfg).run(&small_spec()).await.unwrap();
        let skipped = report
            .outcome_of(&EntityRef::Index {
                collection: "tasks".to_string(),
                key: "tasks_due_idx".to_string(),
            })
            .unwrap();
        assert!(matches!(skipped, Outcome::Failed { reason } if reason.contains("dueDate")));
        assert!(!cp
            .calls()
            .iter()
            .any(|c| matches!(c, Call::CreateIndex { key, .. } if key == "tasks_due_idx")));
    }

    #[tokio::test]
    async fn index_over_failed_attribute_is_skipped_without_polling() {
        let cp = FakeControlPlane::new().fail("attribute:tasks.dueDate", remote_error(400, "invalid"));
        let cfg = config(Pacing::immediate());
        let report = Provisioner::new(&cp, &cfg).run(&small_spec()).await.unwrap();

        let skipped = report
            .outcome_of(&EntityRef::Index {
                collection: "tasks".to_string(),
                key: "tasks_due_idx".to_string(),
            })
            .unwrap();
        assert!(matches!(
            skipped,
            Outcome::Failed { reason } if reason.contains("dueDate") && reason.contains("could not be created")
        ));

        let calls = cp.calls();
        assert!(!calls.contains(&Call::AttributeStatus {
            collection: "tasks".to_string(),
            key: "dueDate".to_string(),
        }));
        assert!(calls.contains(&Call::AttributeStatus {
            collection: "tasks".to_string(),
            key: "userId".to_string(),
        }));
        assert!(!calls
            .iter()
            .any(|c| matches!(c, Call::CreateIndex { key, .. } if key == "tasks_due_idx")));
        assert!(calls.contains(&Call::CreateIndex {
            collection: "tasks".to_string(),
            key: "tasks_user_idx".to_string(),
        }));
    }

    #[tokio::test]
    async fn configured_ids_are_used_remotely() {
        let cp = FakeControlPlane::new();
        let mut cfg = ProvisionerConfig::from_lookup(&|name: &str| match name {
            "APPWRITE_PROJECT_ID" => Some("proj".to_string()),
            "APPWRITE_API_KEY" => Some("key".to_string()),
            "APPWRITE_DATABASE_ID" => Some("ff_staging".to_string()),
            "APPWRITE_TASKS_COLLECTION_ID" => Some("tasks_v2".to_string()),
            _ => None,
        })
        .unwrap();
        cfg.pacing = Pacing::immediate();
        Provisioner::new(&cp, &cfg).run(&small_spec()).await.unwrap();
        let calls = cp.calls();
        assert_eq!(calls[0], Call::CreateDatabase("ff_staging".to_string()));
        assert_eq!(calls[1], Call::CreateCollection("tasks_v2".to_string()));
        assert!(calls.contains(&Call::CreateIndex {
            collection: "tasks_v2".to_string(),
            key: "tasks_user_idx".to_string(),
        }));
    }

    #[tokio::test(start_paused = true)]
    async fn calls_are_spaced_by_the_call_delay() {
        let cp = FakeControlPlane::new();
        let mut pacing = Pacing::immediate();
        pacing.call_delay = Duration::from_secs(1);
        let cfg = config(pacing);
        Provisioner::new(&cp, &cfg).run(&small_spec()).await.unwrap();

        let attribute_times: Vec<_> = cp
            .timed_calls()
            .into_iter()
            .filter(|(_, c)| matches!(c, Call::CreateAttribute { .. }))
            .map(|(t, _)| t)
            .collect();
        for pair in attribute_times.windows(2) {
            assert!(pair[1] - pair[0] >= Duration::from_secs(1));
        }
    }
}
