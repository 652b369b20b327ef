//! Per-entity provisioning outcomes and the aggregated run report.

use std::fmt;

use serde::Serialize;

/// Result of asking the remote store to create one entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    /// The entity did not exist and was created.
    Created,
    /// The remote store reported a conflict: the entity is already there.
    AlreadyExists,
    /// Any other failure, with the remote message.
    Failed { reason: String },
}

impl Outcome {
    /// `Created` and `AlreadyExists` both leave the entity in place.
    #[must_use]
    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Failed { .. })
    }

    #[must_use]
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed {
            reason: reason.into(),
        }
    }
}

/// Which remote entity an [`Outcome`] refers to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "entity", rename_all = "snake_case")]
pub enum EntityRef {
    Database { id: String },
    Collection { id: String },
    Attribute { collection: String, key: String },
    Index { collection: String, key: String },
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Database { id } => write!(f, "database {id}"),
            Self::Collection { id } => write!(f, "collection {id}"),
            Self::Attribute { collection, key } => write!(f, "attribute {collection}.{key}"),
            Self::Index { collection, key } => write!(f, "index {collection}/{key}"),
        }
    }
}

/// Console status marker used when narrating progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Success,
    Info,
    Warning,
    Error,
}

impl Status {
    #[must_use]
    pub fn for_outcome(outcome: &Outcome) -> Self {
        match outcome {
            Outcome::Created => Self::Success,
            Outcome::AlreadyExists => Self::Info,
            Outcome::Failed { .. } => Self::Error,
        }
    }

    #[must_use]
    pub fn marker(self) -> &'static str {
        match self {
            Self::Success => "✅",
            Self::Info => "ℹ️",
            Self::Warning => "⚠️",
            Self::Error => "❌",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.marker())
    }
}

/// Ordered record of every outcome produced during one provisioning run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProvisionReport {
    pub entries: Vec<(EntityRef, Outcome)>,
}

impl ProvisionReport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, entity: EntityRef, outcome: Outcome) {
        self.entries.push((entity, outcome));
    }

    #[must_use]
    pub fn created(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Created))
    }

    #[must_use]
    pub fn already_existing(&self) -> usize {
        self.count(|o| matches!(o, Outcome::AlreadyExists))
    }

    /// Entities that ended in `Failed`, with the reason.
    #[must_use]
    pub fn failures(&self) -> Vec<(&EntityRef, &str)> {
        self.entries
            .iter()
            .filter_map(|(entity, outcome)| match outcome {
                Outcome::Failed { reason } => Some((entity, reason.as_str())),
                _ => None,
            })
            .collect()
    }

    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.entries.iter().all(|(_, o)| o.is_success())
    }

    #[must_use]
    pub fn outcome_of(&self, entity: &EntityRef) -> Option<&Outcome> {
        self.entries
            .iter()
            .find(|(e, _)| e == entity)
            .map(|(_, o)| o)
    }

    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "{} created, {} already existed, {} failed",
            self.created(),
            self.already_existing(),
            self.entries.len() - self.created() - self.already_existing()
        )
    }

    fn count(&self, pred: impl Fn(&Outcome) -> bool) -> usize {
        self.entries.iter().filter(|(_, o)| pred(o)).count()
    }
}
