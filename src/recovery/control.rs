//! Restart mechanisms.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;

use crate::health::process::{run_bounded, CommandError};
use crate::recovery::plan::RecoveryExecutionError;

/// Restart mechanisms, tried in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartMethod {
    ServiceManager,
    Container,
    CustomCommand,
}

impl RestartMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            RestartMethod::ServiceManager => "systemctl",
            RestartMethod::Container => "docker",
            RestartMethod::CustomCommand => "custom_command",
        }
    }
}

impl fmt::Display for RestartMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct RestartTarget {
    pub service_name: String,
    pub command: Option<String>,
    pub force: bool,
}

/// Performs one restart attempt with one mechanism.
#[async_trait]
pub trait ServiceControl: Send + Sync {
    async fn restart(
        &self,
        method: RestartMethod,
        target: &RestartTarget,
        limit: Duration,
    ) -> Result<(), RecoveryExecutionError>;
}

/// Restarts through systemd, docker or a shell command.
#[derive(Debug, Default, Clone)]
pub struct SystemServiceControl;

impl SystemServiceControl {
    async fn run(method: RestartMethod, program: &str, args: &[&str], limit: Duration) -> Result<(), RecoveryExecutionError> {
        let output = run_bounded(program, args, limit).await.map_err(|e| match e {
            CommandError::Timeout { limit, .. } => RecoveryExecutionError::Timeout {
                method: method.to_string(),
                limit,
            },
            other => RecoveryExecutionError::Spawn {
                method: method.to_string(),
                detail: other.to_string(),
            },
        })?;

        if output.status.success() {
            Ok(())
        } else {
            Err(RecoveryExecutionError::CommandFailed {
                method: method.to_string(),
                detail: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }
}

#[async_trait]
impl ServiceControl for SystemServiceControl {
    async fn restart(
        &self,
        method: RestartMethod,
        target: &RestartTarget,
        limit: Duration,
    ) -> Result<(), RecoveryExecutionError> {
        let name = target.service_name.as_str();
        match method {
            RestartMethod::ServiceManager => {
                if target.force {
                    // Best effort; the restart below reports the real outcome.
                    let _ = Self::run(method, "systemctl", &["kill", "--signal=SIGKILL", name], limit).await;
                }
                Self::run(method, "systemctl", &["restart", name], limit).await
            }
            RestartMethod::Container => {
                let args: &[&str] = if target.force {
                    &["restart", "-t", "0", name]
                } else {
                    &["restart", name]
                };
                Self::run(method, "docker", args, limit).await
            }
            RestartMethod::CustomCommand => {
                let command = target.command.as_deref().ok_or_else(|| RecoveryExecutionError::Spawn {
                    method: method.to_string(),
                    detail: "no restart command configured".to_string(),
                })?;
                Self::run(method, "sh", &["-c", command], limit).await
            }
        }
    }
}
