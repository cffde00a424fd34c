//! Cluster state sources: a snapshot file or a live `juju status` query.

use std::path::PathBuf;

use anyhow::{Context, Result};
use natgate_core::Snapshot;
use tokio::process::Command;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateSource {
    /// JSON or TOML snapshot on disk.
    File(PathBuf),
    /// Output of `juju status --format=json`.
    Juju { command: String, model: Option<String> },
}

impl StateSource {
    /// Fetch the snapshot. Any failure here is fatal to the run.
    pub async fn load(&self) -> Result<Snapshot> {
        match self {
            StateSource::File(path) => {
                info!(path = %path.display(), "loading state snapshot");
                natgate_core::Snapshot::load(path)
                    .with_context(|| format!("failed to load snapshot {}", path.display()))
            }
            StateSource::Juju { command, model } => {
                let args = juju_status_args(model.as_deref());
                info!(command = %command, ?model, "querying juju status");
                let output = Command::new(command)
                    .args(&args)
                    .output()
                    .await
                    .with_context(|| format!("failed to run {command}"))?;
                if !output.status.success() {
                    let stderr = String::from_utf8_lossy(&output.stderr);
                    anyhow::bail!(
                        "{command} status exited with {}: {}",
                        output.status,
                        stderr.trim()
                    );
                }
                let json = String::from_utf8_lossy(&output.stdout);
                let snapshot = natgate_core::juju::parse_status(&json)
                    .context("failed to parse juju status")?;
                debug!(
                    machines = snapshot.machines.len(),
                    units = snapshot.units.len(),
                    "loaded juju status"
                );
                Ok(snapshot)
            }
        }
    }
}

fn juju_status_args(model: Option<&str>) -> Vec<String> {
    let mut args = vec!["status".to_string(), "--format=json".to_string()];
    if let Some(model) = model {
        args.push("-m".to_string());
        args.push(model.to_string());
    }
    args
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_args() {
        assert_eq!(juju_status_args(None), vec!["status", "--format=json"]);
        assert_eq!(
            juju_status_args(Some("prod")),
            vec!["status", "--format=json", "-m", "prod"]
        );
    }

    #[tokio::test]
    async fn missing_snapshot_is_fatal() {
        let source = StateSource::File(PathBuf::from("/nonexistent/state.json"));
        let err = source.load().await.unwrap_err();
        assert!(format!("{err:#}").contains("failed to load snapshot"));
    }

    #[tokio::test]
    async fn missing_juju_binary_is_fatal() {
        let source = StateSource::Juju {
            command: "/nonexistent/juju".to_string(),
            model: None,
        };
        assert!(source.load().await.is_err());
    }
}
