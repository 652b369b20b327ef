use std::time::Duration;

use focusflow_core::Status;
use tracing::{error, info, warn};

use super::TaskError;
use crate::client::ControlPlane;
use crate::config::ProvisionerConfig;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeletionSummary {
    pub listed: usize,
    pub deleted: usize,
    pub failed: usize,
}

/// Deletes every user account in the project.
///
/// The users are listed first, then nothing happens for
/// `pacing.delete_safety_window` so the operator can interrupt. Deletions
/// are sequential and spaced by `pacing.call_delay`; a failed deletion is
/// logged and counted but does not stop the others.
///
/// # Errors
///
/// [`TaskError::Remote`] if the users cannot be listed.
pub async fn delete_users<C>(
    cp: &C,
    config: &ProvisionerConfig,
) -> Result<DeletionSummary, TaskError>
where
    C: ControlPlane + ?Sized,
{
    let users = cp.list_users().await?;
    let mut summary = DeletionSummary {
        listed: users.len(),
        ..DeletionSummary::default()
    };
    if users.is_empty() {
        info!("{} no users to delete", Status::Info);
        return Ok(summary);
    }

    info!("found {} user(s):", users.len());
    for user in &users {
        info!("  {} {} <{}>", user.id, user.name, user.email);
    }

    let window = config.pacing.delete_safety_window;
    warn!(
        "{} deleting ALL {} user(s) in {}s, press Ctrl+C to abort",
        Status::Warning,
        users.len(),
        window.as_secs()
    );
    tokio::time::sleep(window).await;

    for (i, user) in users.iter().enumerate() {
        if i > 0 && config.pacing.call_delay > Duration::ZERO {
            tokio::time::sleep(config.pacing.call_delay).await;
        }
        match cp.delete_user(&user.id).await {
            Ok(()) => {
                summary.deleted += 1;
                info!("{} deleted user {} ({})", Status::Success, user.id, user.email);
            }
            Err(err) => {
                summary.failed += 1;
                error!("{} failed to delete user {}: {err}", Status::Error, user.id);
            }
        }
    }

    info!(
        "deleted {} of {} user(s), {} failed",
        summary.deleted, summary.listed, summary.failed
    );
    Ok(summary)
}
