//! Point-in-time view of cluster state.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::containment::MachineIndex;
use crate::error::{NatError, NatResult};
use crate::model::{Machine, Unit};

/// All machines and units known at the start of a run. Read-only for the
/// rest of the run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub machines: Vec<Machine>,
    #[serde(default)]
    pub units: Vec<Unit>,
}

impl Snapshot {
    pub fn from_json(json: &str) -> NatResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_toml(s: &str) -> NatResult<Self> {
        Ok(toml::from_str(s)?)
    }

    /// Load a snapshot file. `.toml` files are parsed as TOML, anything else
    /// as JSON.
    pub fn load(path: &Path) -> NatResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            NatError::State(format!("failed to read snapshot {}: {e}", path.display()))
        })?;
        let snapshot = match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Self::from_toml(&content)?,
            _ => Self::from_json(&content)?,
        };
        debug!(
            path = %path.display(),
            machines = snapshot.machines.len(),
            units = snapshot.units.len(),
            "loaded snapshot"
        );
        Ok(snapshot)
    }

    pub fn index(&self) -> MachineIndex<'_> {
        MachineIndex::new(&self.machines)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AddressScope, Port};

    #[test]
    fn parse_json_snapshot() {
        let json = r#"{
            "machines": [
                {"id": "0", "addresses": [{"value": "192.168.122.107", "scope": "public"}, "10.0.3.1"]},
                {"id": "0/lxc/2", "addresses": ["10.0.3.151"]}
            ],
            "units": [
                {"name": "owncloud/0", "machine": "0/lxc/2", "ports": ["80/tcp"]}
            ]
        }"#;
        let snap = Snapshot::from_json(json).unwrap();
        assert_eq!(snap.machines.len(), 2);
        assert_eq!(snap.machines[0].addresses[0].scope, AddressScope::Public);
        assert_eq!(snap.units[0].ports, vec![Port::tcp(80)]);
        assert!(snap.index().get("0/lxc/2").is_some());
    }

    #[test]
    fn parse_toml_snapshot() {
        let toml_str = r#"
[[machines]]
id = "0"
addresses = ["10.0.3.1"]

[[units]]
name = "mysql/0"
machine = "0"
ports = [3306]

[[units]]
name = "pending/0"
"#;
        let snap = Snapshot::from_toml(toml_str).unwrap();
        assert_eq!(snap.units[0].ports, vec![Port::tcp(3306)]);
        assert_eq!(snap.units[1].machine, None);
    }

    #[test]
    fn bad_snapshot_is_state_error() {
        assert!(matches!(Snapshot::from_json("{"), Err(NatError::State(_))));
        assert!(matches!(
            Snapshot::load(Path::new("/nonexistent/snapshot.json")),
            Err(NatError::State(_))
        ));
    }
}
