//! Block-driven monitoring of live records.
//!
//! Each new block hands every armed record to its own task, so a subscriber
//! that stops reading only stalls its own request. A record's task checks:
//!
//! 1. If the current or any superseded transaction confirmed, the record
//!    reports `Confirmed` and is reclaimed.
//! 2. Otherwise the fee function is stepped once. Whenever its rate is above
//!    the live transaction's, a replacement is built, registered and
//!    published, and the record reports `Replaced`.
//!
//! A replacement that fails on fee policy, the ceiling or the notifier is
//! retried on the next block. Any other failure ends the request with
//! `Failed`.
//!
//! Blocks that arrive while a record's task is still running are folded
//! into one more pass of that task.

use super::builder::make_compliant_tx;
use super::publisher::{shutdown_signalled, Attempt, Record, TxPublisher};
use crate::domain::{BumpEvent, BumpResult, RequestId};
use crate::error::{BumperError, BumperResult};
use crate::ports::outbound::{BlockEpoch, ChainNotifier, FeeEstimator, InputSigner, Wallet};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

impl<E, S, W, N> TxPublisher<E, S, W, N>
where
    E: FeeEstimator + 'static,
    S: InputSigner + 'static,
    W: Wallet + 'static,
    N: ChainNotifier + 'static,
{
    /// Subscribes to blocks and spawns the monitor task.
    ///
    /// The task exits on `stop` or when the block stream closes.
    pub async fn start(self: &Arc<Self>) -> BumperResult<JoinHandle<()>> {
        let mut blocks = self.notifier.register_block_epoch_ntfn().await?;
        let mut quit = self.quit.subscribe();
        let publisher = Arc::clone(self);

        info!(num_confs = self.config.num_confs, "Fee bumper monitor started");

        Ok(tokio::spawn(async move {
            loop {
                tokio::select! {
                    epoch = blocks.recv() => match epoch {
                        Some(epoch) => {
                            // Record tasks finish on their own or at shutdown.
                            publisher.handle_new_block(epoch);
                        }
                        None => {
                            warn!("Block epoch stream closed, monitor exiting");
                            break;
                        }
                    },
                    _ = shutdown_signalled(&mut quit) => {
                        info!("Fee bumper monitor stopped");
                        break;
                    }
                }
            }
        }))
    }

    /// Records the new height and spawns a task for every armed record that
    /// is not already being processed.
    ///
    /// Returns the handles of the spawned tasks. Records still busy with an
    /// earlier block get one more pass when their task finishes.
    pub fn handle_new_block(self: &Arc<Self>, epoch: BlockEpoch) -> Vec<JoinHandle<()>> {
        self.current_height.store(epoch.height, Ordering::SeqCst);

        let mut ready = Vec::new();
        let mut busy = 0usize;
        {
            let mut records = self.records.write();
            for (request_id, record) in records.iter_mut().filter(|(_, r)| r.armed) {
                if record.in_flight {
                    record.block_pending = true;
                    busy += 1;
                } else {
                    record.in_flight = true;
                    ready.push(*request_id);
                }
            }
        }
        ready.sort_unstable();

        debug!(
            height = epoch.height,
            records = ready.len(),
            busy,
            "Processing new block"
        );

        ready
            .into_iter()
            .map(|request_id| {
                let publisher = Arc::clone(self);
                tokio::spawn(async move { publisher.run_record(request_id).await })
            })
            .collect()
    }

    /// Owns one record until no block is left pending for it.
    async fn run_record(&self, request_id: RequestId) {
        loop {
            self.process_record(request_id).await;

            let mut records = self.records.write();
            let Some(record) = records.get_mut(&request_id) else {
                return;
            };
            if record.block_pending {
                record.block_pending = false;
                continue;
            }
            record.in_flight = false;
            return;
        }
    }
}

impl<E, S, W, N> TxPublisher<E, S, W, N>
where
    E: FeeEstimator,
    S: InputSigner,
    W: Wallet,
    N: ChainNotifier,
{
    async fn process_record(&self, request_id: RequestId) {
        let record = self.records.read().get(&request_id).cloned();
        let Some(record) = record else {
            return;
        };

        if let Some(result) = confirmed_result(request_id, &record) {
            info!(
                request_id,
                txid = %result.tx.txid(),
                fee = result.fee,
                "Sweep tx confirmed"
            );
            self.handle_result(result).await;
            return;
        }

        match record.fee_function.increment() {
            Ok(increased) => debug!(request_id, increased, "Stepped fee function"),
            Err(BumperError::FeeFunctionExhausted { fee_rate }) => {
                debug!(request_id, fee_rate = %fee_rate, "Fee rate at ceiling");
            }
            Err(err) => warn!(request_id, error = %err, "Failed to step fee function"),
        }

        // Also covers a rise left over from a replacement that failed earlier.
        if record.fee_function.fee_rate() <= record.attempt.fee_rate {
            debug!(request_id, "Fee rate unchanged, waiting for next block");
            return;
        }

        match self.replace(request_id, &record).await {
            Ok(()) => {}
            Err(err) if replacement_retryable(&err) => {
                warn!(request_id, error = %err, "Replacement failed, retrying next block");
            }
            Err(err) => {
                warn!(request_id, error = %err, "Replacement failed, giving up on request");
                let Attempt { tx, fee, fee_rate, .. } = record.attempt;
                let result = BumpResult::new(BumpEvent::Failed, tx, request_id)
                    .with_fee(fee, fee_rate)
                    .with_error(err);
                self.handle_result(result).await;
            }
        }
    }

    /// Builds, registers and publishes a replacement for the record's
    /// current transaction at the fee function's new rate.
    async fn replace(&self, request_id: RequestId, record: &Record) -> BumperResult<()> {
        let (tx, fee) = make_compliant_tx(
            self.signer.as_ref(),
            self.wallet.as_ref(),
            &record.request,
            record.fee_function.as_ref(),
        )
        .await?;
        let fee_rate = record.fee_function.fee_rate();

        let conf_event = self
            .register_confirmation(&tx, &record.request.delivery_address)
            .await?;
        self.wallet
            .publish_transaction(&tx, &self.config.publish_label)
            .await?;

        let replacement = Attempt {
            tx: tx.clone(),
            fee,
            fee_rate,
            conf_event: Some(conf_event),
        };
        let previous = {
            let mut records = self.records.write();
            let Some(live) = records.get_mut(&request_id) else {
                return Ok(());
            };
            let previous = std::mem::replace(&mut live.attempt, replacement);
            live.superseded.push(previous.clone());
            previous
        };

        info!(
            request_id,
            old_txid = %previous.tx.txid(),
            new_txid = %tx.txid(),
            old_fee_rate = %previous.fee_rate,
            new_fee_rate = %fee_rate,
            "Replaced sweep tx"
        );

        let result = BumpResult::new(BumpEvent::Replaced, previous.tx, request_id)
            .with_replacement(tx)
            .with_fee(fee, fee_rate);
        self.handle_result(result).await;
        Ok(())
    }
}

/// Failures a later block can clear: the mempool wanting more than the
/// current rate, the ceiling, or a notifier hiccup.
fn replacement_retryable(err: &BumperError) -> bool {
    err.is_fee_policy_rejection()
        || matches!(
            err,
            BumperError::FeeFunctionExhausted { .. } | BumperError::Notifier(_)
        )
}

/// A `Confirmed` result for whichever of the record's transactions
/// confirmed, current first.
fn confirmed_result(request_id: RequestId, record: &Record) -> Option<BumpResult> {
    std::iter::once(&record.attempt)
        .chain(record.superseded.iter().rev())
        .find(|attempt| {
            attempt
                .conf_event
                .as_ref()
                .is_some_and(|event| event.is_confirmed())
        })
        .map(|attempt| {
            BumpResult::new(BumpEvent::Confirmed, attempt.tx.clone(), request_id)
                .with_fee(attempt.fee, attempt.fee_rate)
        })
}
