//! natgate: NAT routing for units deployed inside containers.
//!
//! Finds which gateway machine hosts each selected unit's container and
//! installs iptables rules on it, either exposing the unit's opened ports
//! or routing the container's outbound traffic through the gateway.

mod commands;
mod config;
mod deliver;
mod remote;
mod state;

use clap::{Parser, Subcommand};
use natgate_core::ScriptRenderer;
use tracing::error;
use tracing_subscriber::EnvFilter;

use crate::deliver::RunContext;
use crate::remote::SshExecutor;
use crate::state::StateSource;

/// natgate: container NAT routing
#[derive(Parser)]
#[command(
    name = "natgate",
    version,
    about = "Expose services in containers through their host machine"
)]
struct Cli {
    /// Config file path
    #[arg(long = "config", global = true)]
    config: Option<String>,

    /// Read cluster state from a JSON or TOML snapshot file
    #[arg(long = "state", global = true, conflicts_with = "juju")]
    state: Option<String>,

    /// Read cluster state from `juju status`
    #[arg(long, global = true)]
    juju: bool,

    /// Juju model to query
    #[arg(short = 'm', long, global = true)]
    model: Option<String>,

    /// External network device on gateways
    #[arg(long, global = true)]
    device: Option<String>,

    /// User for ssh connections to gateways
    #[arg(long = "ssh-user", global = true)]
    ssh_user: Option<String>,

    /// Path of iptables on gateways
    #[arg(long, global = true)]
    iptables: Option<String>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Expose a service in a container to external ports on the host machine
    Expose {
        /// Unit (service/N) or machine (N, N/lxc/M) to configure
        target: String,

        /// Show the NAT routing commands, but do not execute them
        #[arg(long)]
        dry_run: bool,

        /// Clear all routing before setting up NAT
        #[arg(long)]
        clear: bool,

        /// Port mapping(s), INTERNAL:EXTERNAL[,INTERNAL:EXTERNAL,...]
        #[arg(short = 'p', long = "port-map")]
        port_map: Option<String>,
    },

    /// Route a container's outbound traffic through the host machine
    Outbound {
        /// Unit (service/N) or machine (N, N/lxc/M) to configure
        target: String,

        /// Show the NAT routing commands, but do not execute them
        #[arg(long)]
        dry_run: bool,

        /// Clear all routing before setting up NAT
        #[arg(long)]
        clear: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize tracing. RUST_LOG wins over the verbosity flag.
    let default_filter = if cli.verbose {
        "natgate=debug,natgate_cli=debug,natgate_core=debug"
    } else {
        "natgate=warn,natgate_cli=warn,natgate_core=warn"
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(cli.verbose)
        .with_writer(std::io::stderr)
        .init();

    // Load config file.
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| config::default_path().to_string_lossy().to_string());
    let cfg = match config::Config::load(&config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("natgate: {e:#}");
            std::process::exit(1);
        }
    };

    // CLI overrides config.
    let device = cli.device.clone().unwrap_or(cfg.default.device.clone());
    let iptables = cli.iptables.clone().unwrap_or(cfg.default.iptables.clone());
    let ssh_user = cli.ssh_user.clone().unwrap_or(cfg.default.ssh_user.clone());
    let source = state_source(&cli, &cfg);
    let executor = SshExecutor::new(ssh_user, cfg.default.ssh_options.clone());

    let result = match cli.command {
        Command::Expose {
            target,
            dry_run,
            clear,
            port_map,
        } => {
            let ctx = RunContext {
                source,
                renderer: ScriptRenderer::new(iptables, clear),
                executor,
                dry_run,
            };
            commands::expose::run(&ctx, &target, port_map.as_deref(), &device).await
        }
        Command::Outbound {
            target,
            dry_run,
            clear,
        } => {
            let ctx = RunContext {
                source,
                renderer: ScriptRenderer::new(iptables, clear),
                executor,
                dry_run,
            };
            commands::outbound::run(&ctx, &target, &device).await
        }
    };

    if let Err(e) = result {
        error!("{:#}", e);
        eprintln!("natgate: {e:#}");
        std::process::exit(1);
    }
}

/// Pick the state source: `--state`, then `--juju`, then the config file,
/// then `juju status` as the fallback.
fn state_source(cli: &Cli, cfg: &config::Config) -> StateSource {
    let juju = || StateSource::Juju {
        command: cfg.state.juju.clone(),
        model: cli.model.clone().or_else(|| cfg.state.model.clone()),
    };
    if let Some(path) = &cli.state {
        return StateSource::File(config::expand_tilde(path));
    }
    if cli.juju {
        return juju();
    }
    match &cfg.state.snapshot {
        Some(path) => StateSource::File(config::expand_tilde(path)),
        None => juju(),
    }
}
