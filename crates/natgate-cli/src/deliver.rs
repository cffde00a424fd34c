//! Plan, render and deliver NAT scripts.
//!
//! Scripts are either printed (dry run) or executed on every gateway
//! concurrently. A failing gateway is reported and never stops the others.

use std::io::{self, Write};

use anyhow::{Context, Result};
use futures_util::future::join_all;
use natgate_core::{select_public_address, Plan, PlanOptions, ScriptRenderer, Target};
use tracing::{error, info, warn};

use crate::remote::{ExecOutput, RemoteExecutor};
use crate::state::StateSource;

/// Everything a NAT subcommand needs besides its own flags.
pub struct RunContext<E> {
    pub source: StateSource,
    pub renderer: ScriptRenderer,
    pub executor: E,
    pub dry_run: bool,
}

/// Result of delivering one gateway's script.
#[derive(Debug)]
pub struct GatewayReport {
    pub gateway: String,
    pub result: Result<ExecOutput>,
}

/// Run a NAT subcommand end to end against `target`.
pub async fn run<E: RemoteExecutor>(
    ctx: &RunContext<E>,
    target: &str,
    options: PlanOptions,
) -> Result<()> {
    let target = Target::parse(target)?;
    let snapshot = ctx.source.load().await?;
    let plan = natgate_core::plan(&snapshot, &target, &options);

    if plan.is_empty() {
        warn!(%target, "no contained units to configure");
        return Ok(());
    }

    let scripts = plan.scripts(&ctx.renderer);
    if ctx.dry_run {
        let mut stdout = io::stdout().lock();
        return print_scripts(&mut stdout, &scripts).context("failed to write scripts");
    }

    let reports = execute_scripts(&ctx.executor, &plan, &scripts).await;
    let failed = summarize(&reports);
    if failed > 0 {
        anyhow::bail!("nat script failed on {failed} of {} gateway(s)", reports.len());
    }
    Ok(())
}

/// Write each gateway's script preceded by a `gateway:` header line.
pub fn print_scripts<W: Write>(out: &mut W, scripts: &[(String, String)]) -> io::Result<()> {
    for (gateway, script) in scripts {
        writeln!(out, "{gateway}:")?;
        out.write_all(script.as_bytes())?;
    }
    out.flush()
}

/// Execute every gateway's script concurrently. Reports come back in the
/// same order as `scripts`.
pub async fn execute_scripts<E: RemoteExecutor>(
    executor: &E,
    plan: &Plan<'_>,
    scripts: &[(String, String)],
) -> Vec<GatewayReport> {
    let tasks = scripts.iter().map(|(gateway, script)| async move {
        let result = match gateway_host(plan, gateway) {
            Some(host) => {
                info!(gateway = %gateway, host = %host, "configuring NAT routing");
                executor.execute(&host, script).await
            }
            None => Err(anyhow::anyhow!(
                "could not resolve public address of machine {gateway}"
            )),
        };
        GatewayReport {
            gateway: gateway.clone(),
            result,
        }
    });
    join_all(tasks).await
}

fn gateway_host(plan: &Plan<'_>, gateway: &str) -> Option<String> {
    let fwd = plan.gateway_forwards(gateway).first()?;
    select_public_address(&fwd.containment.gateway.addresses).map(str::to_string)
}

/// Print remote output, log failures, and return the number of failed gateways.
fn summarize(reports: &[GatewayReport]) -> usize {
    let mut failed = 0;
    for report in reports {
        match &report.result {
            Ok(output) => {
                print!("{}", output.stdout);
                eprint!("{}", output.stderr);
                if output.success() {
                    info!(gateway = %report.gateway, "nat script applied");
                } else {
                    failed += 1;
                    error!(
                        gateway = %report.gateway,
                        exit_code = output.exit_code,
                        "nat script failed"
                    );
                }
            }
            Err(e) => {
                failed += 1;
                error!(gateway = %report.gateway, error = %format!("{e:#}"), "nat script failed");
            }
        }
    }
    failed
}
