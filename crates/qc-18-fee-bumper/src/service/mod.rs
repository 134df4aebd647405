//! Fee Bumper Service - publishing and replacement of sweep transactions
//!
//! - `builder`: builds, signs and policy-checks sweeps
//! - `publisher`: record store, first broadcast and result delivery
//! - `monitor`: per-block confirmation checks and fee bumps

pub mod builder;
mod monitor;
pub mod publisher;

pub use builder::{create_and_check_tx, make_compliant_tx};
pub use publisher::TxPublisher;
