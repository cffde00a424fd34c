//! `natgate expose <target>`: forward gateway ports to contained units.
//!
//! Emits a DNAT and FORWARD rule for every opened port of each selected
//! unit, plus one SNAT rule per unit for its return and outbound traffic.

use anyhow::{Context, Result};
use natgate_core::{NatMode, PlanOptions, PortMap};
use tracing::info;

use crate::deliver::{self, RunContext};
use crate::remote::RemoteExecutor;

/// Expose the opened ports of units selected by `target`.
pub async fn run<E: RemoteExecutor>(
    ctx: &RunContext<E>,
    target: &str,
    port_mapping: Option<&str>,
    device: &str,
) -> Result<()> {
    let port_map = PortMap::parse(port_mapping.unwrap_or_default())
        .context("invalid --port-map")?;
    info!(target, port_map = %port_map, device, "expose");

    let options = PlanOptions {
        mode: NatMode::Expose,
        port_map,
        device: device.to_string(),
    };
    deliver::run(ctx, target, options).await
}
