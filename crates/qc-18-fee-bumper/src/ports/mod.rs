//! Ports layer for the fee bumper.
//!
//! Defines the hexagonal architecture port traits:
//! - Inbound (Driving) ports: API exposed to the sweeper
//! - Outbound (Driven) ports: wallet, signer, estimator and chain notifier

pub mod inbound;
pub mod outbound;

#[cfg(test)]
pub(crate) mod mocks;

pub use inbound::*;
pub use outbound::*;
