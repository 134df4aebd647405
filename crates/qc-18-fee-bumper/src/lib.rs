//! # qc-18-fee-bumper
//!
//! Sweep transaction publisher with budget-capped Replace-by-Fee escalation.
//!
//! ## Overview
//!
//! This subsystem provides:
//! - **Sweep Construction**: One v2, RBF-signalling transaction spending all
//!   requested inputs to a single delivery output
//! - **Budget Ceiling**: The fee rate never exceeds what the request's budget
//!   affords at the sweep's weight
//! - **Mempool Compliance**: Fee-policy rejections are answered with a higher
//!   fee rate until the mempool accepts
//! - **Block Monitor**: Unconfirmed sweeps are replaced at a rising fee rate
//!   on every new block until one confirms
//!
//! ## Architecture
//!
//! ```text
//! Sweeper ──BumpRequest──→ Fee Bumper ──check / publish──→ Wallet
//!    ↑                         │
//!    │                         ├── estimate_fee_per_kw ──→ Fee Estimator
//!    │                         ├── compute_input_script ──→ Signer
//!    │                         └── confirmations / blocks ──→ Chain Notifier
//!    │                                                            │
//!    └──── Published → Replaced* → Confirmed | Failed ←───────────┘
//! ```
//!
//! ## Result Lifecycle
//!
//! ```text
//! broadcast ──→ [Published] ──new block, rate rose──→ [Replaced] ──┐
//!    │               │                                    ↑        │
//!    │               │                                    └────────┘
//!    │               └──────────any attempt confirmed──→ [Confirmed]
//!    └──publish failed──→ [Failed]
//! ```
//!
//! `Confirmed` and `Failed` are terminal: the record is reclaimed and the
//! result channel closes.
//!
//! ## Example
//!
//! ```rust,ignore
//! use qc_18_fee_bumper::{BumpRequest, PublisherConfig, TxPublisher};
//! use qc_18_fee_bumper::ports::inbound::FeeBumpApi;
//! use std::sync::Arc;
//!
//! let publisher = Arc::new(TxPublisher::new(
//!     PublisherConfig::default(),
//!     estimator,
//!     signer,
//!     wallet,
//!     notifier,
//! )?);
//! let monitor = publisher.start().await?;
//!
//! let mut results = publisher.broadcast(request).await?;
//! while let Some(result) = results.recv().await {
//!     println!("{:?} {}", result.event, result.tx.txid());
//! }
//! ```

pub mod config;
pub mod domain;
pub mod error;
pub mod ports;
pub mod service;

pub use config::PublisherConfig;
pub use domain::{
    Amount, BumpEvent, BumpRequest, BumpResult, FeeFunction, LinearFeeFunction, OutPoint,
    RequestId, SatPerKWeight, SweepInput, Transaction, Txid, WitnessType,
};
pub use error::{BumperError, BumperResult, MempoolRejection};
pub use service::TxPublisher;
