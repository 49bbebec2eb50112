//! Process liveness probe backed by local system tools.

use std::process::{Output, Stdio};
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;

use crate::health::probe::ProcessProbe;
use crate::health::types::{ProbeError, ProcessCheck};

/// Failure to get an answer out of a local command.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("'{program}' timed out after {limit:?}")]
    Timeout { program: String, limit: Duration },
}

/// Run a command to completion under a deadline. The child is killed if dropped.
pub async fn run_bounded(program: &str, args: &[&str], limit: Duration) -> Result<Output, CommandError> {
    let child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| CommandError::Spawn {
            program: program.to_string(),
            source,
        })?;

    match tokio::time::timeout(limit, child.wait_with_output()).await {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(source)) => Err(CommandError::Spawn {
            program: program.to_string(),
            source,
        }),
        Err(_) => Err(CommandError::Timeout {
            program: program.to_string(),
            limit,
        }),
    }
}

/// Checks the service manager, the process table, then the container runtime.
#[derive(Debug, Clone)]
pub struct SystemProcessProbe {
    timeout: Duration,
}

impl SystemProcessProbe {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl ProcessProbe for SystemProcessProbe {
    async fn is_running(&self, process_name: &str) -> Result<ProcessCheck, ProbeError> {
        let filter = format!("name={}", process_name);
        let methods: [(&str, Vec<&str>); 3] = [
            ("systemctl", vec!["is-active", process_name]),
            ("pgrep", vec!["-x", process_name]),
            ("docker", vec!["ps", "-q", "-f", filter.as_str()]),
        ];

        let mut answered = false;
        let mut last_error = None;

        for (method, args) in methods {
            match run_bounded(method, &args, self.timeout).await {
                Ok(output) => {
                    answered = true;
                    let stdout = String::from_utf8_lossy(&output.stdout);
                    let running = if method == "systemctl" {
                        stdout.trim() == "active"
                    } else {
                        output.status.success() && !stdout.trim().is_empty()
                    };
                    if running {
                        return Ok(ProcessCheck {
                            running: true,
                            method: Some(method.to_string()),
                        });
                    }
                }
                Err(e) => {
                    tracing::debug!(process = %process_name, method, error = %e, "Liveness method unavailable");
                    last_error = Some(match e {
                        CommandError::Timeout { limit, .. } => ProbeError::Timeout(limit),
                        other => ProbeError::Failed(other.to_string()),
                    });
                }
            }
        }

        if answered {
            Ok(ProcessCheck {
                running: false,
                method: None,
            })
        } else {
            Err(last_error.unwrap_or_else(|| ProbeError::Failed("no liveness method answered".to_string())))
        }
    }
}
