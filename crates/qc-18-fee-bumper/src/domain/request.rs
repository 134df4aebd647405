//! Bump requests and the results reported back to their submitters.

use super::fee_rate::{Amount, SatPerKWeight};
use super::transaction::{OutPoint, Transaction};
use super::weight::{calc_sweep_tx_weight, WitnessType};
use crate::error::{BumperError, BumperResult};

/// Publisher-local request identifier. Zero is never issued.
pub type RequestId = u64;

/// A spendable output handed to the publisher for sweeping.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SweepInput {
    pub outpoint: OutPoint,
    pub value: Amount,
    pub witness_type: WitnessType,
    /// Opaque signing material forwarded to the input signer.
    pub sign_descriptor: Vec<u8>,
}

impl SweepInput {
    pub fn new(outpoint: OutPoint, value: Amount, witness_type: WitnessType) -> Self {
        Self {
            outpoint,
            value,
            witness_type,
            sign_descriptor: Vec::new(),
        }
    }

    pub fn with_sign_descriptor(mut self, sign_descriptor: Vec<u8>) -> Self {
        self.sign_descriptor = sign_descriptor;
        self
    }
}

/// A request to sweep `inputs` to `delivery_address` for at most `budget`
/// in fees.
///
/// The publisher never mutates a request after it is submitted.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BumpRequest {
    /// Inputs to spend, in order.
    pub inputs: Vec<SweepInput>,
    /// Output script that receives the swept value minus fees.
    pub delivery_address: Vec<u8>,
    /// Maximum total fee.
    pub budget: Amount,
    /// Optional ceiling on the fee rate, independent of the budget.
    pub max_fee_rate: Option<SatPerKWeight>,
    /// Height by which the sweep should confirm.
    pub deadline_height: i32,
}

impl BumpRequest {
    /// Highest fee rate this request may ever pay.
    ///
    /// The lower of what the budget affords at the sweep's weight and the
    /// caller's `max_fee_rate`.
    pub fn max_fee_rate_allowed(&self) -> BumperResult<SatPerKWeight> {
        let weight = calc_sweep_tx_weight(&self.inputs, &self.delivery_address)?;
        let budget_fee_rate = SatPerKWeight::from_fee_and_weight(self.budget, weight);

        Ok(match self.max_fee_rate {
            Some(max_fee_rate) => budget_fee_rate.min(max_fee_rate),
            None => budget_fee_rate,
        })
    }

    /// Total value of all inputs.
    pub fn input_value(&self) -> Amount {
        self.inputs.iter().map(|input| input.value).sum()
    }

    /// Rejects requests the publisher cannot act on.
    pub fn validate(&self) -> BumperResult<()> {
        if self.inputs.is_empty() {
            return Err(BumperError::InvalidRequest(
                "request has no inputs".to_string(),
            ));
        }
        Ok(())
    }
}

/// Lifecycle event a [`BumpResult`] reports.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BumpEvent {
    /// The transaction was broadcast.
    Published,
    /// The transaction was superseded by a higher-fee replacement.
    Replaced,
    /// The request failed; no further results follow.
    Failed,
    /// The transaction confirmed; no further results follow.
    Confirmed,
}

impl BumpEvent {
    /// Terminal events end the request's lifecycle.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Failed | Self::Confirmed)
    }
}

/// Outcome of a bump request at one point in time.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BumpResult {
    pub event: BumpEvent,
    /// Transaction this result is about. For `Replaced` it is the
    /// superseded transaction.
    pub tx: Transaction,
    /// Transaction that replaced `tx`; set for `Replaced`.
    pub replaced_tx: Option<Transaction>,
    /// Fee paid by `tx`, or by `replaced_tx` for `Replaced`.
    pub fee: Amount,
    /// Fee rate paid by `tx`, or by `replaced_tx` for `Replaced`.
    pub fee_rate: SatPerKWeight,
    /// Failure reason; set for `Failed`.
    pub err: Option<BumperError>,
    pub(crate) request_id: RequestId,
}

impl BumpResult {
    pub(crate) fn new(event: BumpEvent, tx: Transaction, request_id: RequestId) -> Self {
        Self {
            event,
            tx,
            replaced_tx: None,
            fee: 0,
            fee_rate: SatPerKWeight::default(),
            err: None,
            request_id,
        }
    }

    pub(crate) fn with_fee(mut self, fee: Amount, fee_rate: SatPerKWeight) -> Self {
        self.fee = fee;
        self.fee_rate = fee_rate;
        self
    }

    pub(crate) fn with_replacement(mut self, replaced_tx: Transaction) -> Self {
        self.replaced_tx = Some(replaced_tx);
        self
    }

    pub(crate) fn with_error(mut self, err: BumperError) -> Self {
        self.err = Some(err);
        self
    }

    /// Request this result belongs to.
    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    /// Checks the event carries the data it requires.
    pub fn validate(&self) -> BumperResult<()> {
        match self.event {
            BumpEvent::Replaced if self.replaced_tx.is_none() => Err(
                BumperError::InvalidBumpResult("replaced event without new tx".to_string()),
            ),
            BumpEvent::Failed if self.err.is_none() => Err(BumperError::InvalidBumpResult(
                "failed event without reason".to_string(),
            )),
            BumpEvent::Confirmed if self.fee == 0 || self.fee_rate.as_u64() == 0 => Err(
                BumperError::InvalidBumpResult("confirmed event without fee info".to_string()),
            ),
            _ => Ok(()),
        }
    }
}
