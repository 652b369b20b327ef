//! Environment-driven configuration for every admin command.
//!
//! All values come from environment variables (an optional `.env` file is
//! loaded by the binary first). Configuration is resolved through a lookup
//! function so that tests never touch the real process environment.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use focusflow_core::catalog::ids;
use reqwest::Url;

pub const ENDPOINT_VAR: &str = "APPWRITE_ENDPOINT";
pub const PROJECT_ID_VAR: &str = "APPWRITE_PROJECT_ID";
pub const API_KEY_VAR: &str = "APPWRITE_API_KEY";
pub const DATABASE_ID_VAR: &str = "APPWRITE_DATABASE_ID";
pub const ENV_FILE_VAR: &str = "FOCUSFLOW_ENV_FILE";

pub const DEFAULT_ENDPOINT: &str = "https://cloud.appwrite.io/v1";
pub const DEFAULT_ENV_FILE: &str = ".env.local";

/// `(catalog collection id, environment variable)` pairs.
pub const COLLECTION_VARS: [(&str, &str); 8] = [
    (ids::TASKS, "APPWRITE_TASKS_COLLECTION_ID"),
    (ids::POMODORO, "APPWRITE_POMODORO_COLLECTION_ID"),
    (ids::NOTES, "APPWRITE_NOTES_COLLECTION_ID"),
    (ids::FOLDERS, "APPWRITE_FOLDERS_COLLECTION_ID"),
    (ids::SETTINGS, "APPWRITE_SETTINGS_COLLECTION_ID"),
    (ids::CALENDAR_EVENTS, "APPWRITE_CALENDAR_EVENTS_COLLECTION_ID"),
    (ids::TIME_BLOCKS, "APPWRITE_TIME_BLOCKS_COLLECTION_ID"),
    (ids::PRODUCTIVITY_GOALS, "APPWRITE_PRODUCTIVITY_GOALS_COLLECTION_ID"),
];

/// Configuration problems detected before any remote call is made.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variables: {}", names.join(", "))]
    Missing { names: Vec<&'static str> },
    #[error("invalid APPWRITE_ENDPOINT `{value}`: {reason}")]
    InvalidEndpoint { value: String, reason: String },
}

/// Reads a variable, treating empty and whitespace-only values as unset.
fn read<F>(lookup: &F, name: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(name)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Location of the environment hand-off file: `FOCUSFLOW_ENV_FILE`, or
/// `.env.local` in the working directory.
pub fn env_file_path<F>(lookup: &F) -> PathBuf
where
    F: Fn(&str) -> Option<String>,
{
    read(lookup, ENV_FILE_VAR).map_or_else(|| PathBuf::from(DEFAULT_ENV_FILE), PathBuf::from)
}

// ---------------------------------------------------------------------------
// ClientConfig
// ---------------------------------------------------------------------------

/// Everything needed to authenticate against the control-plane API.
#[derive(Clone)]
pub struct ClientConfig {
    /// Base URL including the API version path, without a trailing slash.
    pub endpoint: String,
    pub project_id: String,
    api_key: String,
}

impl ClientConfig {
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidEndpoint`] if `endpoint` is not an
    /// `http`/`https` URL, or [`ConfigError::Missing`] if a value is empty.
    pub fn new(
        endpoint: &str,
        project_id: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        let project_id = project_id.into();
        let api_key = api_key.into();
        let mut missing = Vec::new();
        if project_id.trim().is_empty() {
            missing.push(PROJECT_ID_VAR);
        }
        if api_key.trim().is_empty() {
            missing.push(API_KEY_VAR);
        }
        if !missing.is_empty() {
            return Err(ConfigError::Missing { names: missing });
        }
        Ok(Self {
            endpoint: validate_endpoint(endpoint)?,
            project_id,
            api_key,
        })
    }

    /// Resolves the client configuration from a variable lookup.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Missing`] naming every absent variable, or
    /// [`ConfigError::InvalidEndpoint`].
    pub fn from_lookup<F>(lookup: &F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let endpoint = read(lookup, ENDPOINT_VAR).unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());
        let project_id = read(lookup, PROJECT_ID_VAR).unwrap_or_default();
        let api_key = read(lookup, API_KEY_VAR).unwrap_or_default();
        Self::new(&endpoint, project_id, api_key)
    }

    #[must_use]
    pub fn api_key(&self) -> &str {
        &self.api_key
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("endpoint", &self.endpoint)
            .field("project_id", &self.project_id)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

fn validate_endpoint(raw: &str) -> Result<String, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidEndpoint {
        value: raw.to_string(),
        reason,
    };
    let url = Url::parse(raw).map_err(|e| invalid(e.to_string()))?;
    match url.scheme() {
        "http" | "https" => Ok(raw.trim_end_matches('/').to_string()),
        other => Err(invalid(format!("unsupported scheme `{other}`"))),
    }
}

// ---------------------------------------------------------------------------
// CollectionIds
// ---------------------------------------------------------------------------

/// Remote collection id for each catalog collection.
///
/// Defaults to the catalog ids; each can be overridden through its
/// `APPWRITE_*_COLLECTION_ID` variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionIds {
    entries: Vec<(&'static str, String)>,
}

impl CollectionIds {
    fn from_lookup<F>(lookup: &F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let entries = COLLECTION_VARS
            .iter()
            .map(|(catalog_id, var)| {
                let id = read(lookup, var).unwrap_or_else(|| (*catalog_id).to_string());
                (*catalog_id, id)
            })
            .collect();
        Self { entries }
    }

    /// Remote id for a catalog collection id, or `None` for unknown ids.
    #[must_use]
    pub fn resolve(&self, catalog_id: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(c, _)| *c == catalog_id)
            .map(|(_, id)| id.as_str())
    }

    /// `(catalog id, remote id)` pairs in catalog order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &str)> {
        self.entries.iter().map(|(c, id)| (*c, id.as_str()))
    }
}

impl Default for CollectionIds {
    fn default() -> Self {
        Self::from_lookup(&|_: &str| None)
    }
}

// ---------------------------------------------------------------------------
// Pacing
// ---------------------------------------------------------------------------

/// Bounded exponential back-off used while waiting for attributes to become
/// available before indexing them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadinessPolicy {
    pub min_delay: Duration,
    pub max_delay: Duration,
    /// Retries after the first poll.
    pub max_attempts: usize,
}

impl Default for ReadinessPolicy {
    fn default() -> Self {
        Self {
            min_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(5),
            max_attempts: 10,
        }
    }
}

/// Delays inserted between remote calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pacing {
    /// Courtesy delay between consecutive mutating calls (rate limiting).
    pub call_delay: Duration,
    pub readiness: ReadinessPolicy,
    /// Wait between listing users and deleting the first one.
    pub delete_safety_window: Duration,
}

impl Pacing {
    /// No delays at all and a single readiness poll. Meant for tests and dry runs.
    #[must_use]
    pub fn immediate() -> Self {
        Self {
            call_delay: Duration::ZERO,
            readiness: ReadinessPolicy {
                min_delay: Duration::ZERO,
                max_delay: Duration::ZERO,
                max_attempts: 0,
            },
            delete_safety_window: Duration::ZERO,
        }
    }
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            call_delay: Duration::from_secs(1),
            readiness: ReadinessPolicy::default(),
            delete_safety_window: Duration::from_secs(5),
        }
    }
}

// ---------------------------------------------------------------------------
// ProvisionerConfig
// ---------------------------------------------------------------------------

/// Full configuration shared by the provisioner and the maintenance tasks.
#[derive(Debug, Clone)]
pub struct ProvisionerConfig {
    pub client: ClientConfig,
    pub database_id: String,
    pub collections: CollectionIds,
    pub pacing: Pacing,
    /// Where `provision` writes the environment hand-off file.
    pub env_file: PathBuf,
}

impl ProvisionerConfig {
    /// # Errors
    ///
    /// Propagates [`ClientConfig::from_lookup`] failures.
    pub fn from_lookup<F>(lookup: &F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            client: ClientConfig::from_lookup(lookup)?,
            database_id: read(lookup, DATABASE_ID_VAR)
                .unwrap_or_else(|| ids::DATABASE.to_string()),
            collections: CollectionIds::from_lookup(lookup),
            pacing: Pacing::default(),
            env_file: env_file_path(lookup),
        })
    }

    /// Reads the real process environment.
    ///
    /// # Errors
    ///
    /// See [`ProvisionerConfig::from_lookup`].
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(&|name: &str| std::env::var(name).ok())
    }

    /// Remote collection id for a catalog id, falling back to the catalog id.
    #[must_use]
    pub fn collection_id<'a>(&'a self, catalog_id: &'a str) -> &'a str {
        self.collections.resolve(catalog_id).unwrap_or(catalog_id)
    }
}
