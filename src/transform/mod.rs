//! # Transform Trigger
//!
//! Runs the downstream transformation once every partition has loaded. The command
//! is opaque to the pipeline: it either runs through `sh -c` on this host or through
//! `ssh` on a remote one, with configured environment variables made visible to it.
//! The trigger waits for completion, bounded by a wall-clock timeout, and hands back
//! whatever the command printed.

use async_trait::async_trait;
use serde::Serialize;
use std::collections::BTreeMap;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::{error, info, instrument};

use crate::config::{TransformConfig, TransformTarget};
use crate::error::{EtlError, EtlResult};
use crate::logging::duration_ms;

/// `ssh` exits with this status when it could not reach the remote host
const SSH_CONNECTION_FAILURE: i32 = 255;

/// Outcome of a completed transform run
#[derive(Debug, Clone, Serialize)]
pub struct TransformReport {
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub duration: Duration,
}

#[async_trait]
pub trait TransformTrigger: Send + Sync + std::fmt::Debug {
    async fn trigger(&self) -> EtlResult<TransformReport>;
}

#[derive(Debug, Clone)]
pub struct CommandTransform {
    target: TransformTarget,
    command: String,
    environment: BTreeMap<String, String>,
    timeout: Duration,
}

impl CommandTransform {
    pub fn new(target: TransformTarget, command: impl Into<String>, timeout: Duration) -> Self {
        Self {
            target,
            command: command.into(),
            environment: BTreeMap::new(),
            timeout,
        }
    }

    pub fn from_config(config: &TransformConfig) -> Self {
        Self {
            target: config.target.clone(),
            command: config.command.clone(),
            // layered config sources may lower-case keys; variable names are exported upper-case
            environment: config
                .environment
                .iter()
                .map(|(k, v)| (k.to_ascii_uppercase(), v.clone()))
                .collect(),
            timeout: config.timeout(),
        }
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.environment.insert(key.into(), value.into());
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn build_command(&self) -> EtlResult<Command> {
        if let Some(bad) = self.environment.keys().find(|k| !is_shell_identifier(k)) {
            return Err(EtlError::InvalidInput(format!(
                "transform environment variable name '{bad}' is not a valid shell identifier"
            )));
        }

        let command = match &self.target {
            TransformTarget::Local => {
                let mut command = Command::new("sh");
                command.arg("-c").arg(&self.command).envs(&self.environment);
                command
            }
            TransformTarget::Ssh {
                destination,
                options,
            } => {
                let mut command = Command::new("ssh");
                command
                    .arg("-o")
                    .arg("BatchMode=yes")
                    .args(options)
                    .arg(destination)
                    .arg(remote_command(&self.environment, &self.command));
                command
            }
        };
        Ok(command)
    }
}

#[async_trait]
impl TransformTrigger for CommandTransform {
    #[instrument(skip(self), fields(timeout_seconds = self.timeout.as_secs()))]
    async fn trigger(&self) -> EtlResult<TransformReport> {
        let mut command = self.build_command()?;
        command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        info!(target_kind = ?self.target, "Starting transform");
        let started = Instant::now();

        let child = command.spawn().map_err(|e| EtlError::TransformFailed {
            exit_code: None,
            stdout: String::new(),
            stderr: format!("failed to start transform command: {e}"),
        })?;

        // dropping the pending future on timeout kills the child
        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(output) => output.map_err(|e| EtlError::StorageError(e.to_string()))?,
            Err(_) => {
                error!("Transform exceeded its timeout and was killed");
                return Err(EtlError::Timeout {
                    operation: "transform".to_string(),
                    seconds: self.timeout.as_secs(),
                });
            }
        };

        let report = TransformReport {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            duration: started.elapsed(),
        };

        if output.status.success() {
            info!(
                duration_ms = duration_ms(report.duration),
                stdout_bytes = report.stdout.len(),
                "Transform completed"
            );
            return Ok(report);
        }

        error!(
            exit_code = ?report.exit_code,
            stderr = %report.stderr.trim_end(),
            "Transform failed"
        );
        if matches!(self.target, TransformTarget::Ssh { .. })
            && report.exit_code == Some(SSH_CONNECTION_FAILURE)
        {
            return Err(EtlError::ConnectivityError(format!(
                "ssh could not reach the transform host: {}",
                report.stderr.trim_end()
            )));
        }
        Err(EtlError::TransformFailed {
            exit_code: report.exit_code,
            stdout: report.stdout,
            stderr: report.stderr,
        })
    }
}

fn is_shell_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c == '_' || c.is_ascii_alphabetic())
        && chars.all(|c| c == '_' || c.is_ascii_alphanumeric())
}

fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

/// The command line handed to the remote shell, environment exported first
fn remote_command(environment: &BTreeMap<String, String>, command: &str) -> String {
    if environment.is_empty() {
        return command.to_string();
    }
    let exports = environment
        .iter()
        .map(|(key, value)| format!("{key}={}", shell_quote(value)))
        .collect::<Vec<_>>()
        .join(" ");
    format!("export {exports}; {command}")
}
