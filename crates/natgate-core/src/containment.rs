//! Containment resolution: which gateway machine hosts a unit's container.
//!
//! Nesting is encoded in machine ids. `"0/lxc/2"` is the second LXC
//! container on machine `"0"`, and `"0/lxc/2/kvm/1"` is nested once more.

use std::collections::HashMap;

use crate::error::{NatError, NatResult};
use crate::model::{Machine, Unit};

/// Parent of a machine id, or `None` for a top-level machine.
///
/// Strips the trailing `type/number` container segment.
pub fn parent_id(id: &str) -> Option<&str> {
    let (rest, _number) = id.rsplit_once('/')?;
    let (parent, _kind) = rest.rsplit_once('/')?;
    if parent.is_empty() {
        None
    } else {
        Some(parent)
    }
}

/// Immutable id → machine lookup, built once per run.
#[derive(Debug, Default)]
pub struct MachineIndex<'a> {
    machines: HashMap<&'a str, &'a Machine>,
}

impl<'a> MachineIndex<'a> {
    pub fn new(machines: &'a [Machine]) -> Self {
        Self {
            machines: machines.iter().map(|m| (m.id.as_str(), m)).collect(),
        }
    }

    pub fn get(&self, id: &str) -> Option<&'a Machine> {
        self.machines.get(id).copied()
    }

    pub fn len(&self) -> usize {
        self.machines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.machines.is_empty()
    }
}

/// A unit together with the machine it runs on and that machine's parent.
#[derive(Debug, Clone, Copy)]
pub struct UnitContainment<'a> {
    pub unit: &'a Unit,
    pub gateway: &'a Machine,
    pub host: &'a Machine,
}

/// Outcome of resolving a unit. Top-level placement is expected and common,
/// so it is a value rather than an error.
#[derive(Debug, Clone, Copy)]
pub enum Containment<'a> {
    Contained(UnitContainment<'a>),
    NotContained,
}

impl<'a> Containment<'a> {
    pub fn contained(self) -> Option<UnitContainment<'a>> {
        match self {
            Containment::Contained(uc) => Some(uc),
            Containment::NotContained => None,
        }
    }
}

/// Resolve the gateway and host machines for `unit`.
pub fn resolve_containment<'a>(
    unit: &'a Unit,
    index: &MachineIndex<'a>,
) -> NatResult<Containment<'a>> {
    let machine_id = unit
        .machine
        .as_deref()
        .ok_or_else(|| NatError::NoAssignedMachine(unit.name.clone()))?;

    let host = index
        .get(machine_id)
        .ok_or_else(|| NatError::MachineNotFound(machine_id.to_string()))?;

    let Some(gateway_id) = parent_id(machine_id) else {
        return Ok(Containment::NotContained);
    };

    let gateway = index
        .get(gateway_id)
        .ok_or_else(|| NatError::ParentNotFound(gateway_id.to_string()))?;

    Ok(Containment::Contained(UnitContainment {
        unit,
        gateway,
        host,
    }))
}
