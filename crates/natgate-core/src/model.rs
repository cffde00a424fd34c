//! Snapshot data model: machines, their addresses, units and opened ports.
//!
//! Everything here is plain owned data loaded once per run. The engine only
//! ever borrows from it.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use serde::{Deserialize, Serialize};

use crate::error::{NatError, NatResult};

/// Address family of an [`Address`] value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressKind {
    Ipv4,
    Ipv6,
    Hostname,
}

impl AddressKind {
    /// Classify a raw address string.
    pub fn derive(value: &str) -> Self {
        match value.parse::<IpAddr>() {
            Ok(IpAddr::V4(_)) => AddressKind::Ipv4,
            Ok(IpAddr::V6(_)) => AddressKind::Ipv6,
            Err(_) => AddressKind::Hostname,
        }
    }
}

/// Reachability class of an address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AddressScope {
    Public,
    CloudLocal,
    MachineLocal,
    Unknown,
}

impl AddressScope {
    /// Derive a scope from the address value when the state source gives none.
    pub fn derive(value: &str) -> Self {
        match value.parse::<IpAddr>() {
            Ok(IpAddr::V4(ip)) => scope_v4(ip),
            Ok(IpAddr::V6(ip)) => scope_v6(ip),
            Err(_) => AddressScope::Unknown,
        }
    }
}

fn scope_v4(ip: Ipv4Addr) -> AddressScope {
    if ip.is_loopback() || ip.is_link_local() {
        AddressScope::MachineLocal
    } else if ip.is_private() {
        AddressScope::CloudLocal
    } else {
        AddressScope::Public
    }
}

fn scope_v6(ip: Ipv6Addr) -> AddressScope {
    let first = ip.segments()[0];
    if ip.is_loopback() || (first & 0xffc0) == 0xfe80 {
        AddressScope::MachineLocal
    } else if (first & 0xfe00) == 0xfc00 {
        AddressScope::CloudLocal
    } else {
        AddressScope::Public
    }
}

/// A single address declared by a machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawAddress")]
pub struct Address {
    pub value: String,
    pub kind: AddressKind,
    pub scope: AddressScope,
}

impl Address {
    /// Build an address, deriving kind and scope from the value.
    pub fn new(value: impl Into<String>) -> Self {
        let value = value.into();
        Self {
            kind: AddressKind::derive(&value),
            scope: AddressScope::derive(&value),
            value,
        }
    }

    /// Build an address with an explicit scope.
    pub fn with_scope(value: impl Into<String>, scope: AddressScope) -> Self {
        let mut addr = Self::new(value);
        addr.scope = scope;
        addr
    }

    pub fn is_ipv4(&self) -> bool {
        self.kind == AddressKind::Ipv4
    }

    pub fn is_loopback(&self) -> bool {
        self.value.starts_with("127.")
    }
}

/// Addresses may be written as a bare string or as a table with optional
/// `kind` and `scope` overrides.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawAddress {
    Bare(String),
    Full {
        value: String,
        #[serde(default)]
        kind: Option<AddressKind>,
        #[serde(default)]
        scope: Option<AddressScope>,
    },
}

impl From<RawAddress> for Address {
    fn from(raw: RawAddress) -> Self {
        match raw {
            RawAddress::Bare(value) => Address::new(value),
            RawAddress::Full { value, kind, scope } => {
                let mut addr = Address::new(value);
                if let Some(kind) = kind {
                    addr.kind = kind;
                }
                if let Some(scope) = scope {
                    addr.scope = scope;
                }
                addr
            }
        }
    }
}

/// A machine in the state snapshot, identified by a hierarchical path
/// such as `"0"` or `"0/lxc/2"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Machine {
    pub id: String,
    #[serde(default)]
    pub addresses: Vec<Address>,
}

impl Machine {
    pub fn new(id: impl Into<String>, addresses: Vec<Address>) -> Self {
        Self {
            id: id.into(),
            addresses,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    #[default]
    Tcp,
    Udp,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Tcp => "tcp",
            Protocol::Udp => "udp",
        }
    }
}

impl std::str::FromStr for Protocol {
    type Err = NatError;

    fn from_str(s: &str) -> NatResult<Self> {
        match s.to_ascii_lowercase().as_str() {
            "tcp" => Ok(Protocol::Tcp),
            "udp" => Ok(Protocol::Udp),
            _ => Err(NatError::InvalidPort(s.to_string())),
        }
    }
}

/// An opened port on a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawPort")]
pub struct Port {
    pub protocol: Protocol,
    pub number: u16,
}

impl Port {
    pub fn tcp(number: u16) -> Self {
        Self {
            protocol: Protocol::Tcp,
            number,
        }
    }

    pub fn udp(number: u16) -> Self {
        Self {
            protocol: Protocol::Udp,
            number,
        }
    }

    /// Parse a port specification like `"80"`, `"80/tcp"` or
    /// `"8000-8002/udp"`. Ranges expand to one port per number.
    pub fn parse_spec(spec: &str) -> NatResult<Vec<Port>> {
        let invalid = || NatError::InvalidPort(spec.to_string());
        let (range, protocol) = match spec.split_once('/') {
            Some((range, proto)) => (range, proto.parse::<Protocol>().map_err(|_| invalid())?),
            None => (spec, Protocol::Tcp),
        };
        let (from, to) = match range.split_once('-') {
            Some((from, to)) => (from, to),
            None => (range, range),
        };
        let from: u16 = from.trim().parse().map_err(|_| invalid())?;
        let to: u16 = to.trim().parse().map_err(|_| invalid())?;
        if from == 0 || to < from {
            return Err(invalid());
        }
        Ok((from..=to).map(|number| Port { protocol, number }).collect())
    }
}

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.number, self.protocol.as_str())
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawPort {
    Number(u16),
    Spec(String),
    Full {
        #[serde(default)]
        protocol: Protocol,
        number: u16,
    },
}

impl TryFrom<RawPort> for Port {
    type Error = NatError;

    fn try_from(raw: RawPort) -> NatResult<Self> {
        match raw {
            RawPort::Number(number) => Ok(Port::tcp(number)),
            RawPort::Full { protocol, number } => Ok(Port { protocol, number }),
            RawPort::Spec(spec) => {
                let mut ports = Port::parse_spec(&spec)?;
                if ports.len() != 1 {
                    return Err(NatError::InvalidPort(spec));
                }
                Ok(ports.remove(0))
            }
        }
    }
}

/// A deployed workload unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unit {
    pub name: String,
    /// Assigned machine id. `None` when the assignment is unknown.
    #[serde(default)]
    pub machine: Option<String>,
    #[serde(default)]
    pub ports: Vec<Port>,
}

impl Unit {
    pub fn new(name: impl Into<String>, machine: impl Into<String>, ports: Vec<Port>) -> Self {
        Self {
            name: name.into(),
            machine: Some(machine.into()),
            ports,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derive_kind() {
        assert_eq!(AddressKind::derive("10.0.3.1"), AddressKind::Ipv4);
        assert_eq!(AddressKind::derive("fe80::1"), AddressKind::Ipv6);
        assert_eq!(AddressKind::derive("node-0.maas"), AddressKind::Hostname);
    }

    #[test]
    fn derive_scope() {
        assert_eq!(AddressScope::derive("127.0.0.1"), AddressScope::MachineLocal);
        assert_eq!(AddressScope::derive("10.0.3.1"), AddressScope::CloudLocal);
        assert_eq!(AddressScope::derive("192.168.122.107"), AddressScope::CloudLocal);
        assert_eq!(AddressScope::derive("8.8.8.8"), AddressScope::Public);
        assert_eq!(AddressScope::derive("fd00::1"), AddressScope::CloudLocal);
        assert_eq!(AddressScope::derive("::1"), AddressScope::MachineLocal);
        assert_eq!(AddressScope::derive("example.com"), AddressScope::Unknown);
    }

    #[test]
    fn parse_single_port() {
        assert_eq!(Port::parse_spec("80").unwrap(), vec![Port::tcp(80)]);
        assert_eq!(Port::parse_spec("53/udp").unwrap(), vec![Port::udp(53)]);
        assert_eq!(Port::parse_spec("443/TCP").unwrap(), vec![Port::tcp(443)]);
    }

    #[test]
    fn parse_port_range() {
        let ports = Port::parse_spec("8000-8002/tcp").unwrap();
        assert_eq!(ports, vec![Port::tcp(8000), Port::tcp(8001), Port::tcp(8002)]);
    }

    #[test]
    fn parse_bad_ports() {
        assert!(Port::parse_spec("").is_err());
        assert!(Port::parse_spec("http").is_err());
        assert!(Port::parse_spec("80/sctp").is_err());
        assert!(Port::parse_spec("90-80").is_err());
        assert!(Port::parse_spec("0").is_err());
        assert!(Port::parse_spec("70000").is_err());
    }

    #[test]
    fn address_from_json_forms() {
        let addrs: Vec<Address> = serde_json::from_str(
            r#"["10.0.3.1", {"value": "192.168.122.107", "scope": "public"}]"#,
        )
        .unwrap();
        assert_eq!(addrs[0].scope, AddressScope::CloudLocal);
        assert_eq!(addrs[1].scope, AddressScope::Public);
        assert!(addrs[1].is_ipv4());
    }

    #[test]
    fn port_from_json_forms() {
        let ports: Vec<Port> =
            serde_json::from_str(r#"[80, "53/udp", {"protocol": "tcp", "number": 443}]"#).unwrap();
        assert_eq!(ports, vec![Port::tcp(80), Port::udp(53), Port::tcp(443)]);
    }
}
