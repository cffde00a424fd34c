//! Fleet-wide planning: resolve every unit, keep the ones the target
//! selects, and group their forwards by gateway machine.
//!
//! Failures for one unit never abort the others. They are recorded as
//! [`UnitOutcome::Skipped`] and logged.

use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::containment::{resolve_containment, Containment};
use crate::error::NatError;
use crate::forward::{Forward, DEFAULT_DEVICE};
use crate::portmap::PortMap;
use crate::script::{NatMode, ScriptRenderer};
use crate::snapshot::Snapshot;
use crate::target::Target;

/// Planning inputs that are not part of the snapshot.
#[derive(Debug, Clone)]
pub struct PlanOptions {
    pub mode: NatMode,
    pub port_map: PortMap,
    pub device: String,
}

impl Default for PlanOptions {
    fn default() -> Self {
        Self {
            mode: NatMode::Expose,
            port_map: PortMap::new(),
            device: DEFAULT_DEVICE.to_string(),
        }
    }
}

/// What happened to a single unit.
#[derive(Debug)]
pub enum UnitOutcome<'a> {
    Planned(Forward<'a>),
    Skipped { unit: String, reason: NatError },
}

/// Forwards grouped by gateway id, plus every skipped unit.
#[derive(Debug, Default)]
pub struct Plan<'a> {
    pub mode: NatMode,
    pub forwards: BTreeMap<String, Vec<Forward<'a>>>,
    pub skipped: Vec<(String, NatError)>,
}

impl<'a> Plan<'a> {
    pub fn is_empty(&self) -> bool {
        self.forwards.is_empty()
    }

    pub fn forward_count(&self) -> usize {
        self.forwards.values().map(Vec::len).sum()
    }

    /// One rendered script per gateway, in gateway id order.
    pub fn scripts(&self, renderer: &ScriptRenderer) -> Vec<(String, String)> {
        self.forwards
            .iter()
            .map(|(gateway, fwds)| (gateway.clone(), renderer.render(self.mode, fwds)))
            .collect()
    }

    /// Every forward for `gateway`, if any.
    pub fn gateway_forwards(&self, gateway: &str) -> &[Forward<'a>] {
        self.forwards.get(gateway).map(Vec::as_slice).unwrap_or(&[])
    }

    fn record(&mut self, outcome: UnitOutcome<'a>) {
        match outcome {
            UnitOutcome::Planned(fwd) => {
                self.forwards
                    .entry(fwd.gateway_id().to_string())
                    .or_default()
                    .push(fwd);
            }
            UnitOutcome::Skipped { unit, reason } => self.skipped.push((unit, reason)),
        }
    }
}

/// Resolve and plan every unit in `snapshot` selected by `target`.
pub fn plan<'a>(snapshot: &'a Snapshot, target: &Target, options: &PlanOptions) -> Plan<'a> {
    let index = snapshot.index();
    let mut plan = Plan {
        mode: options.mode,
        ..Plan::default()
    };

    for unit in &snapshot.units {
        let uc = match resolve_containment(unit, &index) {
            Ok(Containment::Contained(uc)) => uc,
            Ok(Containment::NotContained) => {
                debug!(unit = %unit.name, "not in a container");
                continue;
            }
            Err(e) => {
                warn!(unit = %unit.name, error = %e, "skipping unit");
                plan.record(UnitOutcome::Skipped {
                    unit: unit.name.clone(),
                    reason: e,
                });
                continue;
            }
        };

        if !target.matches(&uc) {
            continue;
        }

        let planned = match options.mode {
            NatMode::Expose => {
                Forward::with_device(uc, options.port_map.clone(), &options.device)
            }
            NatMode::Outbound => Forward::outbound(uc, &options.device),
        };
        let outcome = match planned {
            Ok(fwd) => UnitOutcome::Planned(fwd),
            Err(e) => {
                warn!(unit = %unit.name, error = %e, "skipping unit");
                UnitOutcome::Skipped {
                    unit: unit.name.clone(),
                    reason: e,
                }
            }
        };
        plan.record(outcome);
    }

    debug!(
        %target,
        gateways = plan.forwards.len(),
        forwards = plan.forward_count(),
        skipped = plan.skipped.len(),
        "plan complete"
    );
    plan
}
