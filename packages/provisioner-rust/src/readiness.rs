//! Poll-until-ready check for attributes.
//!
//! The remote store activates attributes asynchronously and rejects indexes
//! over attributes that are still `processing`. Instead of sleeping a fixed
//! amount, each attribute an index depends on is polled with bounded
//! exponential back-off until it reports `available`.

use std::fmt;

use backon::{ExponentialBuilder, Retryable};
use tracing::{debug, warn};

use crate::client::{AttributeStatus, ControlPlane, ControlPlaneError};
use crate::config::ReadinessPolicy;

/// Why an attribute is not (yet) available.
#[derive(Debug)]
enum NotReady {
    Pending(AttributeStatus),
    Terminal(AttributeStatus),
    Remote(ControlPlaneError),
}

impl NotReady {
    fn is_retryable(&self) -> bool {
        match self {
            Self::Pending(_) => true,
            Self::Terminal(_) => false,
            Self::Remote(err) => err.is_transient(),
        }
    }
}

impl fmt::Display for NotReady {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending(status) | Self::Terminal(status) => write!(f, "status is {status:?}"),
            Self::Remote(err) => write!(f, "{err}"),
        }
    }
}

/// Which attributes became available and which did not (with the reason).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Readiness {
    pub ready: Vec<String>,
    pub not_ready: Vec<(String, String)>,
}

impl Readiness {
    #[must_use]
    pub fn is_ready(&self, key: &str) -> bool {
        self.ready.iter().any(|k| k == key)
    }

    #[must_use]
    pub fn all_ready(&self) -> bool {
        self.not_ready.is_empty()
    }

    /// Reason `key` is not ready, if it was checked and failed.
    #[must_use]
    pub fn reason(&self, key: &str) -> Option<&str> {
        self.not_ready
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, r)| r.as_str())
    }
}

impl ReadinessPolicy {
    fn backoff(&self) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(self.min_delay)
            .with_max_delay(self.max_delay)
            .with_max_times(self.max_attempts)
    }
}

async fn poll_once<C>(
    cp: &C,
    database_id: &str,
    collection_id: &str,
    key: &str,
) -> Result<(), NotReady>
where
    C: ControlPlane + ?Sized,
{
    match cp.attribute_status(database_id, collection_id, key).await {
        Ok(AttributeStatus::Available) => Ok(()),
        Ok(status) if status.is_terminal_failure() => Err(NotReady::Terminal(status)),
        Ok(status) => Err(NotReady::Pending(status)),
        Err(err) => Err(NotReady::Remote(err)),
    }
}

/// Waits until every key in `keys` is available, one attribute at a time.
///
/// Never fails as a whole: attributes that exhaust the retry budget or land
/// in a terminal state are reported in [`Readiness::not_ready`].
pub async fn await_attributes<C>(
    cp: &C,
    database_id: &str,
    collection_id: &str,
    keys: &[&str],
    policy: &ReadinessPolicy,
) -> Readiness
where
    C: ControlPlane + ?Sized,
{
    let mut readiness = Readiness::default();
    for &key in keys {
        let result = (|| async move { poll_once(cp, database_id, collection_id, key).await })
            .retry(policy.backoff())
            .sleep(tokio::time::sleep)
            .when(NotReady::is_retryable)
            .notify(|reason, delay| {
                debug!(
                    collection = collection_id,
                    key,
                    "attribute not ready ({reason}), polling again in {:.2}s",
                    delay.as_secs_f64()
                );
            })
            .await;
        match result {
            Ok(()) => readiness.ready.push(key.to_string()),
            Err(reason) => {
                warn!(
                    collection = collection_id,
                    key, "attribute never became available: {reason}"
                );
                readiness.not_ready.push((key.to_string(), reason.to_string()));
            }
        }
    }
    readiness
}
