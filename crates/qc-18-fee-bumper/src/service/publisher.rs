//! Transaction publisher.
//!
//! Owns the live bump records and the per-request subscriber channels.
//! `broadcast` creates a record, publishes its first transaction and hands
//! back the channel; the block monitor (see `monitor.rs`) drives everything
//! after that.
//!
//! Locks are never held across an `.await`. When both maps are locked,
//! `records` is taken first.

use super::builder::make_compliant_tx;
use crate::config::PublisherConfig;
use crate::domain::{
    calc_current_conf_target, Amount, BumpEvent, BumpRequest, BumpResult, FeeFunction,
    LinearFeeFunction, RequestId, SatPerKWeight, Transaction,
};
use crate::error::{BumperError, BumperResult};
use crate::ports::inbound::FeeBumpApi;
use crate::ports::outbound::{ChainNotifier, ConfirmationEvent, FeeEstimator, InputSigner, Wallet};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI32, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

/// One broadcast transaction of a record.
#[derive(Clone)]
pub(crate) struct Attempt {
    pub(crate) tx: Transaction,
    pub(crate) fee: Amount,
    pub(crate) fee_rate: SatPerKWeight,
    /// Set once the confirmation registration succeeded.
    pub(crate) conf_event: Option<ConfirmationEvent>,
}

/// Publisher state for one request.
#[derive(Clone)]
pub(crate) struct Record {
    /// Transaction currently expected to confirm.
    pub(crate) attempt: Attempt,
    /// Earlier transactions, oldest first. Any of them may still confirm.
    pub(crate) superseded: Vec<Attempt>,
    pub(crate) fee_function: Arc<dyn FeeFunction>,
    pub(crate) request: Arc<BumpRequest>,
    /// The monitor only touches records whose first result was delivered.
    pub(crate) armed: bool,
    /// A monitor task currently owns this record.
    pub(crate) in_flight: bool,
    /// A block arrived while in flight; the owning task runs once more.
    pub(crate) block_pending: bool,
}

/// Publishes sweeps and keeps them confirming.
pub struct TxPublisher<E, S, W, N>
where
    E: FeeEstimator,
    S: InputSigner,
    W: Wallet,
    N: ChainNotifier,
{
    pub(super) config: PublisherConfig,
    pub(super) estimator: Arc<E>,
    pub(super) signer: Arc<S>,
    pub(super) wallet: Arc<W>,
    pub(super) notifier: Arc<N>,
    request_counter: AtomicU64,
    pub(super) records: RwLock<HashMap<RequestId, Record>>,
    subscriber_chans: RwLock<HashMap<RequestId, mpsc::Sender<BumpResult>>>,
    pub(super) current_height: AtomicI32,
    pub(super) quit: watch::Sender<bool>,
}

impl<E, S, W, N> TxPublisher<E, S, W, N>
where
    E: FeeEstimator,
    S: InputSigner,
    W: Wallet,
    N: ChainNotifier,
{
    pub fn new(
        config: PublisherConfig,
        estimator: Arc<E>,
        signer: Arc<S>,
        wallet: Arc<W>,
        notifier: Arc<N>,
    ) -> BumperResult<Self> {
        config.validate()?;
        let (quit, _) = watch::channel(false);

        Ok(Self {
            config,
            estimator,
            signer,
            wallet,
            notifier,
            request_counter: AtomicU64::new(0),
            records: RwLock::new(HashMap::new()),
            subscriber_chans: RwLock::new(HashMap::new()),
            current_height: AtomicI32::new(0),
            quit,
        })
    }

    pub fn config(&self) -> &PublisherConfig {
        &self.config
    }

    /// Best known chain height.
    pub fn current_height(&self) -> i32 {
        self.current_height.load(Ordering::SeqCst)
    }

    /// Number of requests still being tracked.
    pub fn live_records(&self) -> usize {
        self.records.read().len()
    }

    /// Number of open subscriber channels.
    pub fn live_subscribers(&self) -> usize {
        self.subscriber_chans.read().len()
    }

    /// Signals shutdown. Pending deliveries and the monitor return promptly.
    pub fn stop(&self) {
        info!("Stopping fee bumper");
        self.quit.send_replace(true);
    }

    pub fn is_stopped(&self) -> bool {
        *self.quit.borrow()
    }

    /// Creates the fee function for `request` from a fresh estimate.
    pub(crate) async fn initialize_fee_function(
        &self,
        request: &BumpRequest,
    ) -> BumperResult<Arc<dyn FeeFunction>> {
        let max_fee_rate = request.max_fee_rate_allowed()?;
        let conf_target = calc_current_conf_target(self.current_height(), request.deadline_height);
        let estimated = self.estimator.estimate_fee_per_kw(conf_target).await?;
        let relay_floor = self.estimator.relay_fee_per_kw();

        let fee_function =
            LinearFeeFunction::new(max_fee_rate, conf_target, estimated, relay_floor)?;
        Ok(Arc::new(fee_function))
    }

    /// Builds a mempool-compliant sweep and stores it as a new record.
    pub(crate) async fn create_rbf_compliant_tx(
        &self,
        request: Arc<BumpRequest>,
        fee_function: Arc<dyn FeeFunction>,
    ) -> BumperResult<RequestId> {
        let (tx, fee) = make_compliant_tx(
            self.signer.as_ref(),
            self.wallet.as_ref(),
            &request,
            fee_function.as_ref(),
        )
        .await?;

        Ok(self.store_record(tx, request, fee_function, fee))
    }

    /// Stores a new, unarmed record and returns its id.
    pub(crate) fn store_record(
        &self,
        tx: Transaction,
        request: Arc<BumpRequest>,
        fee_function: Arc<dyn FeeFunction>,
        fee: Amount,
    ) -> RequestId {
        let request_id = self.request_counter.fetch_add(1, Ordering::SeqCst) + 1;
        let fee_rate = fee_function.fee_rate();
        debug!(request_id, txid = %tx.txid(), fee, fee_rate = %fee_rate, "Storing bump record");

        self.records.write().insert(
            request_id,
            Record {
                attempt: Attempt {
                    tx,
                    fee,
                    fee_rate,
                    conf_event: None,
                },
                superseded: Vec::new(),
                fee_function,
                request,
                armed: false,
                in_flight: false,
                block_pending: false,
            },
        );
        request_id
    }

    /// Registers for confirmation of `tx`, scanning from the current height.
    pub(super) async fn register_confirmation(
        &self,
        tx: &Transaction,
        pk_script: &[u8],
    ) -> BumperResult<ConfirmationEvent> {
        let height_hint = u32::try_from(self.current_height()).unwrap_or(0);
        self.notifier
            .register_confirmations_ntfn(&tx.txid(), pk_script, self.config.num_confs, height_hint)
            .await
    }

    /// Publishes the record's current transaction once.
    ///
    /// Errors only if the record is missing or confirmation registration
    /// fails; a publish failure is reported as a `Failed` result.
    pub(crate) async fn broadcast_once(&self, request_id: RequestId) -> BumperResult<BumpResult> {
        let record = self.records.read().get(&request_id).cloned();
        let record = record.ok_or(BumperError::RecordNotFound { request_id })?;
        let Attempt {
            tx, fee, fee_rate, ..
        } = record.attempt;

        let conf_event = self
            .register_confirmation(&tx, &record.request.delivery_address)
            .await?;
        if let Some(live) = self.records.write().get_mut(&request_id) {
            live.attempt.conf_event = Some(conf_event);
        }

        let txid = tx.txid();
        let outcome = self
            .wallet
            .publish_transaction(&tx, &self.config.publish_label)
            .await;
        let result = match outcome {
            Ok(()) => {
                info!(request_id, %txid, fee, fee_rate = %fee_rate, "Published sweep tx");
                BumpResult::new(BumpEvent::Published, tx, request_id)
            }
            Err(err) => {
                warn!(request_id, %txid, error = %err, "Failed to publish sweep tx");
                BumpResult::new(BumpEvent::Failed, tx, request_id).with_error(err)
            }
        };

        Ok(result.with_fee(fee, fee_rate))
    }

    /// Validates, delivers and, if terminal, reclaims a result.
    pub(crate) async fn handle_result(&self, result: BumpResult) {
        if let Err(err) = result.validate() {
            error!(request_id = result.request_id, error = %err, "Dropping invalid bump result");
            return;
        }

        self.notify_result(result.clone()).await;
        self.remove_result(&result);
    }

    /// Sends `result` to its subscriber, waiting for buffer space until
    /// shutdown. A send with room available always goes through.
    pub(crate) async fn notify_result(&self, result: BumpResult) {
        let request_id = result.request_id;
        let subscriber = self.subscriber_chans.read().get(&request_id).cloned();
        let Some(subscriber) = subscriber else {
            debug!(request_id, "No subscriber for bump result");
            return;
        };

        let mut quit = self.quit.subscribe();
        tokio::select! {
            biased;

            sent = subscriber.send(result) => {
                if sent.is_err() {
                    debug!(request_id, "Subscriber dropped its receiver");
                }
            }
            _ = shutdown_signalled(&mut quit) => {
                debug!(request_id, "Shutdown before result delivery");
            }
        }
    }

    /// Drops the record when `result` ends its lifecycle.
    pub(crate) fn remove_result(&self, result: &BumpResult) {
        if result.event.is_terminal() {
            self.remove_record(result.request_id);
        }
    }

    fn remove_record(&self, request_id: RequestId) {
        let mut records = self.records.write();
        let mut subscribers = self.subscriber_chans.write();
        if records.remove(&request_id).is_some() {
            debug!(request_id, "Removed bump record");
        }
        subscribers.remove(&request_id);
    }

    fn arm_record(&self, request_id: RequestId) {
        if let Some(record) = self.records.write().get_mut(&request_id) {
            record.armed = true;
        }
    }
}

#[async_trait]
impl<E, S, W, N> FeeBumpApi for TxPublisher<E, S, W, N>
where
    E: FeeEstimator,
    S: InputSigner,
    W: Wallet,
    N: ChainNotifier,
{
    async fn broadcast(&self, request: BumpRequest) -> BumperResult<mpsc::Receiver<BumpResult>> {
        request.validate()?;
        let request = Arc::new(request);

        let fee_function = self.initialize_fee_function(&request).await?;
        let request_id = self
            .create_rbf_compliant_tx(Arc::clone(&request), fee_function)
            .await?;

        let (sender, receiver) = mpsc::channel(self.config.subscriber_capacity);
        self.subscriber_chans.write().insert(request_id, sender);

        let result = match self.broadcast_once(request_id).await {
            Ok(result) => result,
            Err(err) => {
                error!(request_id, error = %err, "Failed to register sweep tx");
                self.remove_record(request_id);
                return Err(err);
            }
        };

        self.handle_result(result).await;
        self.arm_record(request_id);
        Ok(receiver)
    }
}

/// Resolves once `quit` reads true or its sender is gone.
pub(super) async fn shutdown_signalled(quit: &mut watch::Receiver<bool>) {
    loop {
        if *quit.borrow_and_update() {
            return;
        }
        if quit.changed().await.is_err() {
            return;
        }
    }
}
