//! Remote script execution on gateway machines.
//!
//! The script is piped over ssh into a temporary file and run with sudo,
//! so nothing needs to be quoted into the remote command line.

use std::process::Stdio;

use anyhow::{Context, Result};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

/// Remote command the script is piped into.
const REMOTE_RUNNER: &str = "sh -c 'NATCMD=$(mktemp); cat >${NATCMD}; sudo sh -x ${NATCMD}'";

/// Captured result of running a script on one machine.
#[derive(Debug, Clone, Default)]
pub struct ExecOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl ExecOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Runs a script with elevated privilege on a host.
#[allow(async_fn_in_trait)]
pub trait RemoteExecutor {
    async fn execute(&self, host: &str, script: &str) -> Result<ExecOutput>;
}

/// Executes scripts through the system `ssh` client.
#[derive(Debug, Clone)]
pub struct SshExecutor {
    pub user: String,
    pub options: Vec<String>,
}

impl SshExecutor {
    pub fn new(user: impl Into<String>, options: Vec<String>) -> Self {
        Self {
            user: user.into(),
            options,
        }
    }

    fn args(&self, host: &str) -> Vec<String> {
        let mut args = self.options.clone();
        args.push(format!("{}@{}", self.user, host));
        args.push(REMOTE_RUNNER.to_string());
        args
    }
}

impl RemoteExecutor for SshExecutor {
    async fn execute(&self, host: &str, script: &str) -> Result<ExecOutput> {
        let args = self.args(host);
        debug!(host, user = %self.user, "running nat script over ssh");

        let mut child = Command::new("ssh")
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .context("failed to spawn ssh")?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(script.as_bytes())
                .await
                .with_context(|| format!("failed to send script to {host}"))?;
            // Dropping stdin closes it so the remote `cat` sees EOF.
        }

        let output = child
            .wait_with_output()
            .await
            .with_context(|| format!("ssh to {host} failed"))?;

        Ok(ExecOutput {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            exit_code: output.status.code().unwrap_or(-1),
        })
    }
}
