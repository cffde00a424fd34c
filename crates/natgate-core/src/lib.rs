//! natgate-core: NAT planning for units running in nested containers.
//!
//! Resolves which gateway machine hosts a unit's container, matches the
//! container and gateway onto a shared private network, builds forward
//! plans, and renders them as iptables scripts.

pub mod address;
pub mod containment;
pub mod error;
pub mod forward;
pub mod juju;
pub mod model;
pub mod plan;
pub mod portmap;
pub mod script;
pub mod snapshot;
pub mod target;

// Re-export commonly used items at crate root.
pub use address::{match_networks, select_public_address};
pub use containment::{parent_id, resolve_containment, Containment, MachineIndex, UnitContainment};
pub use error::{NatError, NatResult};
pub use forward::{Forward, DEFAULT_DEVICE};
pub use model::{Address, AddressKind, AddressScope, Machine, Port, Protocol, Unit};
pub use plan::{plan, Plan, PlanOptions, UnitOutcome};
pub use portmap::PortMap;
pub use script::{NatMode, ScriptRenderer, DEFAULT_IPTABLES};
pub use snapshot::Snapshot;
pub use target::Target;
