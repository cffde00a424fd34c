//! Command targets: a single unit (`owncloud/0`) or a machine (`0`, `0/lxc/2`).

use std::fmt;

use crate::containment::UnitContainment;
use crate::error::{NatError, NatResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Unit(String),
    Machine(String),
}

impl Target {
    pub fn parse(s: &str) -> NatResult<Self> {
        if is_machine_id(s) {
            Ok(Target::Machine(s.to_string()))
        } else if is_unit_name(s) {
            Ok(Target::Unit(s.to_string()))
        } else {
            Err(NatError::InvalidTarget(s.to_string()))
        }
    }

    /// A unit target selects that unit. A machine target selects every unit
    /// whose host or gateway is that machine.
    pub fn matches(&self, uc: &UnitContainment<'_>) -> bool {
        match self {
            Target::Unit(name) => uc.unit.name == *name,
            Target::Machine(id) => uc.host.id == *id || uc.gateway.id == *id,
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Unit(name) => write!(f, "unit {name}"),
            Target::Machine(id) => write!(f, "machine {id}"),
        }
    }
}

fn is_number(s: &str) -> bool {
    !s.is_empty()
        && s.bytes().all(|b| b.is_ascii_digit())
        && (s == "0" || !s.starts_with('0'))
}

fn is_container_kind(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_lowercase())
}

/// `N` followed by any number of `/kind/N` segments.
pub fn is_machine_id(s: &str) -> bool {
    let parts: Vec<&str> = s.split('/').collect();
    if parts.len() % 2 == 0 {
        return false;
    }
    parts.iter().enumerate().all(|(i, part)| {
        if i % 2 == 0 {
            is_number(part)
        } else {
            is_container_kind(part)
        }
    })
}

/// `service/N`, where the service name starts with a letter, uses lowercase
/// letters, digits and single dashes, and does not end with a dash.
pub fn is_unit_name(s: &str) -> bool {
    let Some((service, number)) = s.split_once('/') else {
        return false;
    };
    is_number(number) && is_service_name(service)
}

/// Lowercase alphanumeric segments joined by `-`. The first segment starts
/// with a letter and every later one contains at least one letter.
fn is_service_name(s: &str) -> bool {
    let alnum = |seg: &str| {
        !seg.is_empty() && seg.bytes().all(|b| b.is_ascii_lowercase() || b.is_ascii_digit())
    };
    let has_letter = |seg: &str| seg.bytes().any(|b| b.is_ascii_lowercase());

    let mut segments = s.split('-');
    let first_ok = segments.next().is_some_and(|seg| {
        alnum(seg) && seg.bytes().next().is_some_and(|b| b.is_ascii_lowercase())
    });
    first_ok && segments.all(|seg| alnum(seg) && has_letter(seg))
}
