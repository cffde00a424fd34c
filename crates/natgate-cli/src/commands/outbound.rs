//! `natgate outbound <target>`: route contained units' traffic out through
//! their gateway.
//!
//! Only the SNAT rule is emitted; no ports are exposed.

use anyhow::Result;
use natgate_core::{NatMode, PlanOptions, PortMap};
use tracing::info;

use crate::deliver::{self, RunContext};
use crate::remote::RemoteExecutor;

pub async fn run<E: RemoteExecutor>(ctx: &RunContext<E>, target: &str, device: &str) -> Result<()> {
    info!(target, device, "outbound");
    let options = PlanOptions {
        mode: NatMode::Outbound,
        port_map: PortMap::new(),
        device: device.to_string(),
    };
    deliver::run(ctx, target, options).await
}
