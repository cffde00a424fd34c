//! CLI subcommand implementations.

pub mod expose;
pub mod outbound;
