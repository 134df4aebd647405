//! Error types for the fee bumper.
//!
//! Every failure the publisher can surface is a [`BumperError`]. Errors are
//! `Clone + PartialEq` because a broadcast failure travels to the caller
//! inside a [`crate::BumpResult`] rather than through a `Result`.

use crate::domain::{Amount, RequestId, SatPerKWeight};
use thiserror::Error;

/// Rejection reasons reported by the wallet's mempool acceptance check.
///
/// Backends word fee rejections differently, so every shape that means
/// "the fee is below what the node or network currently accepts" maps onto
/// one of the fee-policy variants. New backend shapes are added here and
/// picked up by [`MempoolRejection::is_fee_policy`].
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum MempoolRejection {
    /// The node's dynamic mempool minimum fee is not met.
    #[error("mempool min fee not met")]
    MempoolMinFeeNotMet,

    /// The fee does not cover the replacement or relay requirement.
    #[error("insufficient fee")]
    InsufficientFee,

    /// The static minimum relay fee is not met.
    #[error("min relay fee not met")]
    MinRelayFeeNotMet,

    /// Any other policy or consensus rejection.
    #[error("rejected: {0}")]
    Rejected(String),
}

impl MempoolRejection {
    /// Maps a backend reject reason (as returned by `testmempoolaccept`)
    /// onto a rejection kind.
    pub fn from_reject_reason(reason: &str) -> Self {
        let normalized = reason.trim().to_ascii_lowercase();

        if normalized.contains("mempool min fee not met") {
            Self::MempoolMinFeeNotMet
        } else if normalized.contains("min relay fee not met") {
            Self::MinRelayFeeNotMet
        } else if normalized.contains("insufficient fee") {
            Self::InsufficientFee
        } else {
            Self::Rejected(reason.trim().to_string())
        }
    }

    /// True when raising the fee rate may turn this rejection into an accept.
    pub fn is_fee_policy(&self) -> bool {
        matches!(
            self,
            Self::MempoolMinFeeNotMet | Self::InsufficientFee | Self::MinRelayFeeNotMet
        )
    }
}

/// Fee bumper error type.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum BumperError {
    /// A result failed its structural validation (programming error).
    #[error("invalid bump result: {0}")]
    InvalidBumpResult(String),

    /// The delivery script is not a recognized output type.
    #[error("unknown output script type: {script}")]
    UnknownOutputScript { script: String },

    /// The request is malformed.
    #[error("invalid bump request: {0}")]
    InvalidRequest(String),

    /// A fee function was asked to cover zero blocks.
    #[error("confirmation target must be greater than zero")]
    InvalidConfTarget,

    /// Publisher configuration rejected.
    #[error("invalid publisher config: {0}")]
    InvalidConfig(String),

    /// The fee at the current rate is above the request budget.
    #[error("not enough budget: fee {fee} exceeds budget {budget}")]
    NotEnoughBudget { fee: Amount, budget: Amount },

    /// The inputs cannot pay the fee.
    #[error("input value {total} cannot cover fee {fee}")]
    InsufficientInputValue { total: Amount, fee: Amount },

    /// The wallet's mempool acceptance check rejected the transaction.
    #[error("mempool rejected transaction: {0}")]
    Mempool(MempoolRejection),

    /// The fee function is already at its ceiling.
    #[error("fee function exhausted at {fee_rate}")]
    FeeFunctionExhausted { fee_rate: SatPerKWeight },

    /// The fee estimator failed.
    #[error("fee estimation failed: {0}")]
    FeeEstimation(String),

    /// The input signer failed.
    #[error("signer error: {0}")]
    Signer(String),

    /// The wallet failed for a reason other than a policy rejection.
    #[error("wallet error: {0}")]
    Wallet(String),

    /// The chain notifier failed.
    #[error("chain notifier error: {0}")]
    Notifier(String),

    /// No live record exists for the request id.
    #[error("no record for request {request_id}")]
    RecordNotFound { request_id: RequestId },
}

impl BumperError {
    /// True for mempool rejections that a higher fee rate can resolve.
    pub fn is_fee_policy_rejection(&self) -> bool {
        matches!(self, Self::Mempool(rejection) if rejection.is_fee_policy())
    }
}

impl From<MempoolRejection> for BumperError {
    fn from(rejection: MempoolRejection) -> Self {
        Self::Mempool(rejection)
    }
}

/// Result type for fee bumper operations.
pub type BumperResult<T> = Result<T, BumperError>;
