//! `FocusFlow` Provisioner: idempotent Appwrite schema setup, the
//! environment hand-off file, and admin maintenance tasks.

pub mod apply;
pub mod cli;
pub mod client;
pub mod config;
pub mod handoff;
pub mod orchestrator;
pub mod readiness;
pub mod tasks;

pub use client::{AppwriteClient, ControlPlane, ControlPlaneError};
pub use config::{ConfigError, Pacing, ProvisionerConfig, ReadinessPolicy};
pub use handoff::{EnvHandoff, HandoffError};
pub use orchestrator::{Phase, ProvisionError, Provisioner};
pub use tasks::TaskError;
