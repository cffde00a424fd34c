//! Forward plans: the addresses, device and ports involved in exposing one
//! contained unit through its gateway.

use tracing::debug;

use crate::address::{match_networks, select_public_address};
use crate::containment::UnitContainment;
use crate::error::{NatError, NatResult};
use crate::model::Port;
use crate::portmap::PortMap;

/// Interface on the gateway that faces the outside network.
pub const DEFAULT_DEVICE: &str = "eth0";

/// A validated NAT plan for one unit.
#[derive(Debug, Clone)]
pub struct Forward<'a> {
    pub containment: UnitContainment<'a>,
    pub external_gateway_addr: String,
    pub internal_gateway_addr: String,
    pub internal_host_addr: String,
    pub internal_ports: Vec<Port>,
    pub external_gateway_device: String,
    pub port_map: PortMap,
}

impl<'a> Forward<'a> {
    /// Plan port exposure for a contained unit.
    pub fn new(containment: UnitContainment<'a>, port_map: PortMap) -> NatResult<Self> {
        Self::with_device(containment, port_map, DEFAULT_DEVICE)
    }

    /// Like [`Forward::new`] with a non-default external device.
    pub fn with_device(
        containment: UnitContainment<'a>,
        port_map: PortMap,
        device: &str,
    ) -> NatResult<Self> {
        let fwd = Self::build(containment, port_map, device)?;
        fwd.validate()?;
        Ok(fwd)
    }

    /// Plan outbound-only translation. Validation is the same as for
    /// exposure, so a unit without opened ports is rejected.
    pub fn outbound(containment: UnitContainment<'a>, device: &str) -> NatResult<Self> {
        Self::with_device(containment, PortMap::new(), device)
    }

    fn build(
        containment: UnitContainment<'a>,
        port_map: PortMap,
        device: &str,
    ) -> NatResult<Self> {
        let UnitContainment { unit, gateway, host } = containment;
        let (internal_host_addr, internal_gateway_addr) = match_networks(host, gateway)?;

        let external_gateway_addr = select_public_address(&gateway.addresses)
            .ok_or_else(|| NatError::NoExternalAddress(gateway.id.clone()))?
            .to_string();

        debug!(
            unit = %unit.name,
            gateway = %gateway.id,
            external = %external_gateway_addr,
            internal = %internal_host_addr,
            ports = unit.ports.len(),
            "planned forward"
        );

        Ok(Self {
            containment,
            external_gateway_addr,
            internal_gateway_addr,
            internal_host_addr,
            internal_ports: unit.ports.clone(),
            external_gateway_device: device.to_string(),
            port_map,
        })
    }

    /// Check that every field the rules need is present, in a fixed order,
    /// reporting the first missing one.
    pub fn validate(&self) -> NatResult<()> {
        if self.containment.gateway.id.is_empty() {
            return Err(NatError::GatewayUndefined);
        }
        if self.external_gateway_addr.is_empty() {
            return Err(NatError::MissingExternalAddress);
        }
        if self.external_gateway_device.is_empty() {
            return Err(NatError::MissingDevice);
        }
        if self.internal_host_addr.is_empty() {
            return Err(NatError::MissingHostAddress);
        }
        if self.internal_ports.is_empty() {
            return Err(NatError::NoPorts);
        }
        Ok(())
    }

    pub fn unit_name(&self) -> &str {
        &self.containment.unit.name
    }

    pub fn gateway_id(&self) -> &str {
        &self.containment.gateway.id
    }

    /// `(port, external port)` pairs in the order the unit opened them.
    pub fn exposed_ports(&self) -> impl Iterator<Item = (Port, u16)> + '_ {
        self.internal_ports
            .iter()
            .map(|p| (*p, self.port_map.external(p.number)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::containment::{resolve_containment, MachineIndex};
    use crate::model::{Address, AddressScope, Machine, Unit};

    fn owncloud_machines() -> Vec<Machine> {
        vec![
            Machine::new(
                "0",
                vec![
                    Address::with_scope("192.168.122.107", AddressScope::Public),
                    Address::new("10.0.3.1"),
                ],
            ),
            Machine::new("0/lxc/2", vec![Address::new("10.0.3.151")]),
        ]
    }

    #[test]
    fn owncloud_forward() {
        let ms = owncloud_machines();
        let index = MachineIndex::new(&ms);
        let unit = Unit::new("owncloud/0", "0/lxc/2", vec![Port::tcp(80)]);
        let uc = resolve_containment(&unit, &index).unwrap().contained().unwrap();

        let fwd = Forward::new(uc, PortMap::new()).unwrap();
        assert_eq!(fwd.internal_host_addr, "10.0.3.151");
        assert_eq!(fwd.internal_gateway_addr, "10.0.3.1");
        assert_eq!(fwd.external_gateway_addr, "192.168.122.107");
        assert_eq!(fwd.external_gateway_device, "eth0");
        assert_eq!(fwd.internal_ports, vec![Port::tcp(80)]);
        assert_eq!(fwd.gateway_id(), "0");
    }

    #[test]
    fn no_ports_fails_validation() {
        let ms = owncloud_machines();
        let index = MachineIndex::new(&ms);
        let unit = Unit::new("owncloud/0", "0/lxc/2", vec![]);
        let uc = resolve_containment(&unit, &index).unwrap().contained().unwrap();

        let err = Forward::new(uc, PortMap::new()).unwrap_err();
        assert!(matches!(err, NatError::NoPorts));
        assert_eq!(err.to_string(), "no ports to forward");

        let err = Forward::outbound(uc, DEFAULT_DEVICE).unwrap_err();
        assert!(matches!(err, NatError::NoPorts));
    }

    #[test]
    fn validate_rejects_empty_ports_even_when_complete() {
        let ms = owncloud_machines();
        let index = MachineIndex::new(&ms);
        let unit = Unit::new("owncloud/0", "0/lxc/2", vec![Port::tcp(80)]);
        let uc = resolve_containment(&unit, &index).unwrap().contained().unwrap();

        let mut fwd = Forward::new(uc, PortMap::new()).unwrap();
        fwd.internal_ports.clear();
        assert!(matches!(fwd.validate(), Err(NatError::NoPorts)));
    }

    #[test]
    fn validation_order() {
        let ms = owncloud_machines();
        let index = MachineIndex::new(&ms);
        let unit = Unit::new("owncloud/0", "0/lxc/2", vec![Port::tcp(80)]);
        let uc = resolve_containment(&unit, &index).unwrap().contained().unwrap();
        let fwd = Forward::new(uc, PortMap::new()).unwrap();

        let mut f = fwd.clone();
        f.external_gateway_addr.clear();
        f.internal_ports.clear();
        assert!(matches!(f.validate(), Err(NatError::MissingExternalAddress)));

        let mut f = fwd.clone();
        f.external_gateway_device.clear();
        assert!(matches!(f.validate(), Err(NatError::MissingDevice)));

        let mut f = fwd;
        f.internal_host_addr.clear();
        assert!(matches!(f.validate(), Err(NatError::MissingHostAddress)));
    }

    #[test]
    fn gateway_without_external_address() {
        let ms = vec![
            Machine::new(
                "0",
                vec![
                    Address::new("127.0.0.1"),
                    Address::with_scope("10.0.3.1", AddressScope::MachineLocal),
                ],
            ),
            Machine::new("0/lxc/2", vec![Address::new("10.0.3.151")]),
        ];
        let index = MachineIndex::new(&ms);
        let unit = Unit::new("owncloud/0", "0/lxc/2", vec![Port::tcp(80)]);
        let uc = resolve_containment(&unit, &index).unwrap().contained().unwrap();
        let err = Forward::new(uc, PortMap::new()).unwrap_err();
        assert_eq!(err.to_string(), "failed to get internal address: \"0\"");
    }

    #[test]
    fn matching_error_propagates() {
        let ms = vec![
            Machine::new("0", vec![Address::with_scope("203.0.113.9", AddressScope::Public)]),
            Machine::new("0/lxc/2", vec![Address::new("10.0.3.151")]),
        ];
        let index = MachineIndex::new(&ms);
        let unit = Unit::new("owncloud/0", "0/lxc/2", vec![Port::tcp(80)]);
        let uc = resolve_containment(&unit, &index).unwrap().contained().unwrap();
        assert!(matches!(
            Forward::new(uc, PortMap::new()),
            Err(NatError::NoCommonNetwork { .. })
        ));
    }

    #[test]
    fn exposed_ports_apply_port_map() {
        let ms = owncloud_machines();
        let index = MachineIndex::new(&ms);
        let unit = Unit::new("owncloud/0", "0/lxc/2", vec![Port::tcp(80), Port::tcp(443)]);
        let uc = resolve_containment(&unit, &index).unwrap().contained().unwrap();
        let fwd = Forward::new(uc, PortMap::parse("80:8080").unwrap()).unwrap();
        let exposed: Vec<_> = fwd.exposed_ports().collect();
        assert_eq!(exposed, vec![(Port::tcp(80), 8080), (Port::tcp(443), 443)]);
    }
}
