//! Snapshot construction from `juju status --format=json`.
//!
//! Only the fields needed for NAT planning are read. Containers are nested
//! under their parent machine and are flattened here. Subordinate units
//! have no machine of their own and inherit their principal's.

use std::collections::BTreeMap;

use serde::Deserialize;
use tracing::warn;

use crate::error::NatResult;
use crate::model::{Address, AddressScope, Machine, Port, Unit};
use crate::snapshot::Snapshot;

#[derive(Debug, Deserialize)]
struct Status {
    #[serde(default)]
    machines: BTreeMap<String, StatusMachine>,
    #[serde(default, alias = "services")]
    applications: BTreeMap<String, StatusApplication>,
}

#[derive(Debug, Deserialize)]
struct StatusMachine {
    #[serde(default, rename = "dns-name")]
    dns_name: Option<String>,
    #[serde(default, rename = "ip-addresses")]
    ip_addresses: Vec<String>,
    #[serde(default)]
    containers: BTreeMap<String, StatusMachine>,
}

#[derive(Debug, Deserialize)]
struct StatusApplication {
    #[serde(default)]
    units: BTreeMap<String, StatusUnit>,
}

#[derive(Debug, Deserialize)]
struct StatusUnit {
    #[serde(default)]
    machine: Option<String>,
    #[serde(default, rename = "open-ports")]
    open_ports: Vec<String>,
    #[serde(default)]
    subordinates: BTreeMap<String, StatusUnit>,
}

/// Parse juju status JSON into a snapshot.
pub fn parse_status(json: &str) -> NatResult<Snapshot> {
    let status: Status = serde_json::from_str(json)?;

    let mut machines = Vec::new();
    for (id, machine) in &status.machines {
        flatten_machine(id, machine, &mut machines);
    }

    let mut units = Vec::new();
    for app in status.applications.values() {
        let mut names: Vec<&String> = app.units.keys().collect();
        names.sort_by_key(|name| unit_number(name));
        for name in names {
            let unit = &app.units[name];
            push_unit(name, unit, None, &mut units);
        }
    }

    Ok(Snapshot { machines, units })
}

fn unit_number(name: &str) -> u64 {
    name.rsplit_once('/')
        .and_then(|(_, n)| n.parse().ok())
        .unwrap_or(u64::MAX)
}

fn flatten_machine(id: &str, machine: &StatusMachine, out: &mut Vec<Machine>) {
    let mut addresses: Vec<Address> = Vec::new();
    if let Some(dns) = machine.dns_name.as_deref().filter(|d| !d.is_empty()) {
        addresses.push(Address::with_scope(dns, AddressScope::Public));
    }
    for ip in &machine.ip_addresses {
        if !addresses.iter().any(|a| a.value == *ip) {
            addresses.push(Address::new(ip.as_str()));
        }
    }
    out.push(Machine::new(id, addresses));

    for (child_id, child) in &machine.containers {
        flatten_machine(child_id, child, out);
    }
}

fn push_unit(name: &str, unit: &StatusUnit, principal_machine: Option<&str>, out: &mut Vec<Unit>) {
    let machine = unit
        .machine
        .clone()
        .or_else(|| principal_machine.map(str::to_string));

    let mut ports = Vec::new();
    for spec in &unit.open_ports {
        match Port::parse_spec(spec) {
            Ok(parsed) => ports.extend(parsed),
            Err(e) => warn!(unit = name, port = %spec, error = %e, "ignoring open port"),
        }
    }

    out.push(Unit {
        name: name.to_string(),
        machine: machine.clone(),
        ports,
    });

    for (sub_name, sub) in &unit.subordinates {
        push_unit(sub_name, sub, machine.as_deref(), out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STATUS: &str = r#"{
        "model": {"name": "default"},
        "machines": {
            "0": {
                "dns-name": "192.168.122.107",
                "ip-addresses": ["192.168.122.107", "10.0.3.1"],
                "containers": {
                    "0/lxc/2": {
                        "dns-name": "10.0.3.151",
                        "ip-addresses": ["10.0.3.151"]
                    }
                }
            },
            "1": {"dns-name": "192.168.122.108"}
        },
        "applications": {
            "owncloud": {
                "units": {
                    "owncloud/10": {"machine": "1"},
                    "owncloud/0": {
                        "machine": "0/lxc/2",
                        "open-ports": ["80/tcp", "8000-8001/tcp", "bogus"],
                        "subordinates": {
                            "nrpe/0": {"open-ports": ["5666/tcp"]}
                        }
                    }
                }
            }
        }
    }"#;

    #[test]
    fn flattens_containers() {
        let snap = parse_status(STATUS).unwrap();
        let ids: Vec<&str> = snap.machines.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["0", "0/lxc/2", "1"]);

        let gw = &snap.machines[0];
        assert_eq!(gw.addresses.len(), 2);
        assert_eq!(gw.addresses[0].value, "192.168.122.107");
        assert_eq!(gw.addresses[0].scope, AddressScope::Public);
        assert_eq!(gw.addresses[1].value, "10.0.3.1");
    }

    #[test]
    fn units_and_subordinates() {
        let snap = parse_status(STATUS).unwrap();
        let names: Vec<&str> = snap.units.iter().map(|u| u.name.as_str()).collect();
        assert_eq!(names, vec!["owncloud/0", "nrpe/0", "owncloud/10"]);

        let owncloud = &snap.units[0];
        assert_eq!(owncloud.machine.as_deref(), Some("0/lxc/2"));
        assert_eq!(
            owncloud.ports,
            vec![Port::tcp(80), Port::tcp(8000), Port::tcp(8001)]
        );

        let nrpe = &snap.units[1];
        assert_eq!(nrpe.machine.as_deref(), Some("0/lxc/2"));
        assert_eq!(nrpe.ports, vec![Port::tcp(5666)]);
    }

    #[test]
    fn legacy_services_key() {
        let snap = parse_status(
            r#"{"machines": {}, "services": {"mysql": {"units": {"mysql/0": {"machine": "0"}}}}}"#,
        )
        .unwrap();
        assert_eq!(snap.units.len(), 1);
    }
}
