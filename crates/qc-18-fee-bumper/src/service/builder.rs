//! Sweep transaction construction.
//!
//! Builds a version-2, RBF-signalling transaction spending every requested
//! input to the delivery address, signs it, and dry-runs it against the
//! mempool. [`make_compliant_tx`] retries with higher fee rates until the
//! mempool stops rejecting on fee grounds.

use crate::domain::{
    calc_sweep_tx_weight, Amount, BumpRequest, FeeFunction, Transaction, TxIn, TxOut,
    MAX_RBF_SEQUENCE, SWEEP_TX_VERSION,
};
use crate::error::{BumperError, BumperResult};
use crate::ports::outbound::{InputSigner, Wallet};
use tracing::debug;

/// Builds, signs and policy-checks one sweep at the fee function's current
/// rate. Returns the signed transaction and its fee.
///
/// Fails with `NotEnoughBudget` before any signing or network call when
/// the fee at the current rate exceeds the budget.
pub async fn create_and_check_tx<S, W>(
    signer: &S,
    wallet: &W,
    request: &BumpRequest,
    fee_function: &dyn FeeFunction,
) -> BumperResult<(Transaction, Amount)>
where
    S: InputSigner + ?Sized,
    W: Wallet + ?Sized,
{
    let weight = calc_sweep_tx_weight(&request.inputs, &request.delivery_address)?;
    let fee_rate = fee_function.fee_rate();
    let fee = fee_rate.fee_for_weight(weight);

    if fee > request.budget {
        return Err(BumperError::NotEnoughBudget {
            fee,
            budget: request.budget,
        });
    }

    let total = request.input_value();
    let change = total
        .checked_sub(fee)
        .ok_or(BumperError::InsufficientInputValue { total, fee })?;

    let mut tx = Transaction {
        version: SWEEP_TX_VERSION,
        inputs: request
            .inputs
            .iter()
            .map(|input| TxIn {
                previous_output: input.outpoint,
                sig_script: Vec::new(),
                witness: Vec::new(),
                sequence: MAX_RBF_SEQUENCE,
            })
            .collect(),
        outputs: vec![TxOut {
            value: change,
            pk_script: request.delivery_address.clone(),
        }],
        lock_time: 0,
    };

    // Every input signs the unsigned transaction; attach scripts afterwards.
    let mut scripts = Vec::with_capacity(request.inputs.len());
    for (index, input) in request.inputs.iter().enumerate() {
        scripts.push(signer.compute_input_script(&tx, input, index).await?);
    }
    for (txin, script) in tx.inputs.iter_mut().zip(scripts) {
        txin.sig_script = script.sig_script;
        txin.witness = script.witness;
    }

    debug!(
        txid = %tx.txid(),
        fee,
        fee_rate = %fee_rate,
        weight,
        "Sweep tx signed, checking mempool acceptance"
    );

    wallet.check_mempool_acceptance(&tx).await?;
    Ok((tx, fee))
}

/// Builds a sweep the mempool accepts, raising the fee rate on fee-policy
/// rejections.
///
/// Every rejection triggers one `increment` followed by a rebuild, whether
/// or not the rate moved. Any other error, including the fee function
/// running out of room, ends the loop.
pub async fn make_compliant_tx<S, W>(
    signer: &S,
    wallet: &W,
    request: &BumpRequest,
    fee_function: &dyn FeeFunction,
) -> BumperResult<(Transaction, Amount)>
where
    S: InputSigner + ?Sized,
    W: Wallet + ?Sized,
{
    let mut attempts = 0u32;
    loop {
        attempts += 1;
        match create_and_check_tx(signer, wallet, request, fee_function).await {
            Ok(built) => {
                debug!(attempts, "Sweep tx accepted by mempool policy");
                return Ok(built);
            }
            Err(err) if err.is_fee_policy_rejection() => {
                let increased = fee_function.increment()?;
                debug!(
                    error = %err,
                    increased,
                    fee_rate = %fee_function.fee_rate(),
                    "Fee rejected by mempool, retrying"
                );
            }
            Err(err) => return Err(err),
        }
    }
}
