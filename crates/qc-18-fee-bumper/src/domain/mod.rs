//! # Domain Layer - Fee Bumper
//!
//! Pure logic with no collaborator calls.
//!
//! ## Components
//!
//! - `fee_rate`: `Amount`, `SatPerKWeight`, relay floor
//! - `transaction`: sweep transaction model and txid computation
//! - `weight`: witness size table and weight estimation
//! - `request`: `BumpRequest`, `BumpResult`, fee ceiling
//! - `fee_function`: `FeeFunction` trait, `LinearFeeFunction`, conf target

pub mod fee_function;
pub mod fee_rate;
pub mod request;
pub mod transaction;
pub mod weight;

pub use fee_function::*;
pub use fee_rate::*;
pub use request::*;
pub use transaction::*;
pub use weight::*;
