use thiserror::Error;

/// Errors produced by the NAT planning engine.
#[derive(Debug, Error)]
pub enum NatError {
    #[error("unit {0} has no assigned machine")]
    NoAssignedMachine(String),

    #[error("machine not found: {0:?}")]
    MachineNotFound(String),

    #[error("parent machine {0:?} not found")]
    ParentNotFound(String),

    #[error("failed to find common network for {host} and {gateway}")]
    NoCommonNetwork { host: String, gateway: String },

    #[error("failed to get internal address: {0:?}")]
    NoExternalAddress(String),

    #[error("external gateway machine not defined")]
    GatewayUndefined,

    #[error("external gateway address not found")]
    MissingExternalAddress,

    #[error("external gateway device not found")]
    MissingDevice,

    #[error("internal host address not found")]
    MissingHostAddress,

    #[error("no ports to forward")]
    NoPorts,

    #[error("invalid target: {0:?}")]
    InvalidTarget(String),

    #[error("invalid port mapping {0:?}: {1}")]
    InvalidPortMap(String, String),

    #[error("invalid port: {0:?}")]
    InvalidPort(String),

    #[error("state error: {0}")]
    State(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for NatError {
    fn from(e: serde_json::Error) -> Self {
        NatError::State(e.to_string())
    }
}

impl From<toml::de::Error> for NatError {
    fn from(e: toml::de::Error) -> Self {
        NatError::State(e.to_string())
    }
}

pub type NatResult<T> = Result<T, NatError>;
