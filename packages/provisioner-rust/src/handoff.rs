//! Environment file handed from `provision` to the web app and later runs.
//!
//! The file has a fixed set of keys in a fixed order. `VITE_`-prefixed keys
//! are read by the front-end build; the `APPWRITE_` keys are read back by
//! this tool. The API key is only ever written under `APPWRITE_API_KEY` so
//! the front-end bundle never sees it.

use std::collections::BTreeMap;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::config::{
    ClientConfig, ConfigError, ProvisionerConfig, API_KEY_VAR, COLLECTION_VARS, DATABASE_ID_VAR,
    ENDPOINT_VAR, PROJECT_ID_VAR,
};

const HEADER: &str = "# Generated by `focusflow-admin provision`. Re-run it to regenerate.";

#[derive(Debug, thiserror::Error)]
pub enum HandoffError {
    #[error("could not write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed env file: {0}")]
    Malformed(#[source] dotenvy::Error),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl HandoffError {
    /// The file to read does not exist.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Read { source, .. } if source.kind() == io::ErrorKind::NotFound)
    }
}

/// Typed content of the hand-off file.
#[derive(Debug, Clone)]
pub struct EnvHandoff {
    pub client: ClientConfig,
    pub database_id: String,
    /// `(environment variable suffix source, remote collection id)` in catalog order.
    pub collections: Vec<(&'static str, String)>,
}

impl EnvHandoff {
    #[must_use]
    pub fn from_config(config: &ProvisionerConfig) -> Self {
        Self {
            client: config.client.clone(),
            database_id: config.database_id.clone(),
            collections: COLLECTION_VARS
                .iter()
                .map(|(catalog_id, var)| (*var, config.collection_id(catalog_id).to_string()))
                .collect(),
        }
    }

    /// Key/value pairs in file order.
    #[must_use]
    pub fn entries(&self) -> Vec<(String, String)> {
        let mut shared = vec![
            (ENDPOINT_VAR.to_string(), self.client.endpoint.clone()),
            (PROJECT_ID_VAR.to_string(), self.client.project_id.clone()),
            (DATABASE_ID_VAR.to_string(), self.database_id.clone()),
        ];
        shared.extend(
            self.collections
                .iter()
                .map(|(var, id)| ((*var).to_string(), id.clone())),
        );

        let mut out: Vec<(String, String)> = shared
            .iter()
            .map(|(k, v)| (format!("VITE_{k}"), v.clone()))
            .collect();
        out.extend(shared);
        out.push((API_KEY_VAR.to_string(), self.client.api_key().to_string()));
        out
    }

    #[must_use]
    pub fn render(&self) -> String {
        let mut text = String::from(HEADER);
        text.push('\n');
        for (key, value) in self.entries() {
            text.push_str(&key);
            text.push('=');
            text.push_str(&value);
            text.push('\n');
        }
        text
    }

    /// Writes the file atomically: the content goes to a fresh temp file in
    /// the same directory, which is synced and then renamed over `path`. The
    /// temp file is created owner-only (0600 on Unix) with a random name and
    /// is removed if anything fails before the rename.
    ///
    /// # Errors
    ///
    /// Returns [`HandoffError::Write`] on any I/O failure.
    pub fn write_to(&self, path: &Path) -> Result<(), HandoffError> {
        let wrap = |source: io::Error| HandoffError::Write {
            path: path.to_path_buf(),
            source,
        };
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let mut tmp = NamedTempFile::new_in(dir).map_err(wrap)?;
        tmp.write_all(self.render().as_bytes()).map_err(wrap)?;
        tmp.flush().map_err(wrap)?;
        tmp.as_file().sync_all().map_err(wrap)?;
        tmp.persist(path).map_err(|e| wrap(e.error))?;
        Ok(())
    }

    /// Keys whose values differ from `previous`, including keys only one side has.
    #[must_use]
    pub fn drift(&self, previous: &Self) -> Vec<String> {
        let old: BTreeMap<String, String> = previous.entries().into_iter().collect();
        self.entries()
            .into_iter()
            .filter(|(key, value)| old.get(key) != Some(value))
            .map(|(key, _)| key)
            .collect()
    }

    /// Parses a previously rendered file. Only the `APPWRITE_` keys are used.
    ///
    /// # Errors
    ///
    /// Returns [`HandoffError::Malformed`] for lines that are not `KEY=value`,
    /// or [`HandoffError::Config`] when required keys are missing.
    pub fn parse(text: &str) -> Result<Self, HandoffError> {
        let values = collect_values(dotenvy::from_read_iter(text.as_bytes()))?;
        Self::from_values(&values)
    }

    /// # Errors
    ///
    /// See [`read_values`] and [`EnvHandoff::parse`].
    pub fn read_from(path: &Path) -> Result<Self, HandoffError> {
        Self::from_values(&read_values(path)?)
    }

    fn from_values(values: &BTreeMap<String, String>) -> Result<Self, HandoffError> {
        let lookup = |name: &str| values.get(name).cloned();
        let config = ProvisionerConfig::from_lookup(&lookup)?;
        Ok(Self::from_config(&config))
    }
}

/// Every `KEY=value` pair in an env file, with quotes, comments and
/// `export` prefixes handled the way `dotenvy` loads them.
///
/// # Errors
///
/// [`HandoffError::Read`] if the file cannot be opened (see
/// [`HandoffError::is_not_found`]), [`HandoffError::Malformed`] otherwise.
pub fn read_values(path: &Path) -> Result<BTreeMap<String, String>, HandoffError> {
    let iter = dotenvy::from_path_iter(path).map_err(|err| match err {
        dotenvy::Error::Io(source) => HandoffError::Read {
            path: path.to_path_buf(),
            source,
        },
        other => HandoffError::Malformed(other),
    })?;
    collect_values(iter)
}

fn collect_values<I>(iter: I) -> Result<BTreeMap<String, String>, HandoffError>
where
    I: Iterator<Item = Result<(String, String), dotenvy::Error>>,
{
    iter.map(|item| item.map_err(HandoffError::Malformed))
        .collect()
}
