//! Scripted collaborators and fixtures for unit tests.
//!
//! Each mock pops its next response from a queue and counts calls, so a
//! test states exactly which outcomes a collaborator produces and in what
//! order.

use super::outbound::{
    BlockEpoch, ChainNotifier, ConfirmationEvent, FeeEstimator, InputScript, InputSigner,
    TxConfirmation, Wallet,
};
use crate::config::PublisherConfig;
use crate::domain::{
    BumpRequest, FeeFunction, OutPoint, SatPerKWeight, SweepInput, Transaction, Txid,
    WitnessType, FEE_PER_KW_FLOOR,
};
use crate::error::{BumperError, BumperResult};
use crate::service::TxPublisher;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

/// P2TR output script with an all-zero key.
pub(crate) fn taproot_script() -> Vec<u8> {
    let mut script = vec![0x51, 0x20];
    script.extend_from_slice(&[0u8; 32]);
    script
}

pub(crate) fn test_input(value: u64) -> SweepInput {
    SweepInput::new(
        OutPoint::new(Txid([0x5A; 32]), 0),
        value,
        WitnessType::WitnessKeyHash,
    )
}

/// One P2WKH input worth 1000 sat, budget 1000 sat, P2TR delivery.
pub(crate) fn test_request() -> BumpRequest {
    BumpRequest {
        inputs: vec![test_input(1000)],
        delivery_address: taproot_script(),
        budget: 1000,
        max_fee_rate: None,
        deadline_height: 0,
    }
}

pub(crate) fn dummy_error() -> BumperError {
    BumperError::Wallet("dummy error".to_string())
}

fn next<T>(queue: &Mutex<VecDeque<T>>, fallback: impl FnOnce() -> T) -> T {
    queue.lock().pop_front().unwrap_or_else(fallback)
}

/// Fee estimator returning queued estimates, then `fallback`.
pub(crate) struct MockEstimator {
    estimates: Mutex<VecDeque<BumperResult<SatPerKWeight>>>,
    fallback: SatPerKWeight,
    relay_fee: SatPerKWeight,
    pub(crate) estimate_calls: AtomicUsize,
    pub(crate) conf_targets: Mutex<Vec<u32>>,
}

impl MockEstimator {
    pub(crate) fn new(fallback: SatPerKWeight) -> Self {
        Self {
            estimates: Mutex::new(VecDeque::new()),
            fallback,
            relay_fee: FEE_PER_KW_FLOOR,
            estimate_calls: AtomicUsize::new(0),
            conf_targets: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn push_estimate(&self, estimate: BumperResult<SatPerKWeight>) {
        self.estimates.lock().push_back(estimate);
    }
}

#[async_trait]
impl FeeEstimator for MockEstimator {
    async fn estimate_fee_per_kw(&self, conf_target: u32) -> BumperResult<SatPerKWeight> {
        self.estimate_calls.fetch_add(1, Ordering::SeqCst);
        self.conf_targets.lock().push(conf_target);
        next(&self.estimates, || Ok(self.fallback))
    }

    fn relay_fee_per_kw(&self) -> SatPerKWeight {
        self.relay_fee
    }
}

/// Signer producing a fixed P2WKH-shaped witness, or a fixed error.
pub(crate) struct MockSigner {
    failure: Option<BumperError>,
    pub(crate) calls: AtomicUsize,
}

impl MockSigner {
    pub(crate) fn new() -> Self {
        Self {
            failure: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn failing(err: BumperError) -> Self {
        Self {
            failure: Some(err),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl InputSigner for MockSigner {
    async fn compute_input_script(
        &self,
        _tx: &Transaction,
        _input: &SweepInput,
        _input_index: usize,
    ) -> BumperResult<InputScript> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.failure {
            Some(err) => Err(err.clone()),
            None => Ok(InputScript {
                sig_script: Vec::new(),
                witness: vec![vec![0x30; 72], vec![0x02; 33]],
            }),
        }
    }
}

/// Wallet with queued acceptance and publish outcomes; accepts by default.
pub(crate) struct MockWallet {
    acceptance: Mutex<VecDeque<BumperResult<()>>>,
    publishes: Mutex<VecDeque<BumperResult<()>>>,
    pub(crate) check_calls: AtomicUsize,
    pub(crate) published: Mutex<Vec<(Transaction, String)>>,
}

impl MockWallet {
    pub(crate) fn new() -> Self {
        Self {
            acceptance: Mutex::new(VecDeque::new()),
            publishes: Mutex::new(VecDeque::new()),
            check_calls: AtomicUsize::new(0),
            published: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn push_acceptance(&self, outcome: BumperResult<()>) {
        self.acceptance.lock().push_back(outcome);
    }

    pub(crate) fn push_publish(&self, outcome: BumperResult<()>) {
        self.publishes.lock().push_back(outcome);
    }

    pub(crate) fn publish_calls(&self) -> usize {
        self.published.lock().len()
    }
}

#[async_trait]
impl Wallet for MockWallet {
    async fn check_mempool_acceptance(&self, _tx: &Transaction) -> BumperResult<()> {
        self.check_calls.fetch_add(1, Ordering::SeqCst);
        next(&self.acceptance, || Ok(()))
    }

    async fn publish_transaction(&self, tx: &Transaction, label: &str) -> BumperResult<()> {
        self.published.lock().push((tx.clone(), label.to_string()));
        next(&self.publishes, || Ok(()))
    }
}

/// Arguments of one confirmation registration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Registration {
    pub(crate) txid: Txid,
    pub(crate) pk_script: Vec<u8>,
    pub(crate) num_confs: u32,
    pub(crate) height_hint: u32,
}

/// Chain notifier whose confirmations are resolved by the test.
pub(crate) struct MockNotifier {
    outcomes: Mutex<VecDeque<BumperResult<()>>>,
    pub(crate) registrations: Mutex<Vec<Registration>>,
    pending: Mutex<HashMap<Txid, watch::Sender<Option<TxConfirmation>>>>,
    blocks: Mutex<Option<mpsc::Receiver<BlockEpoch>>>,
}

impl MockNotifier {
    pub(crate) fn new() -> Self {
        Self {
            outcomes: Mutex::new(VecDeque::new()),
            registrations: Mutex::new(Vec::new()),
            pending: Mutex::new(HashMap::new()),
            blocks: Mutex::new(None),
        }
    }

    pub(crate) fn push_registration(&self, outcome: BumperResult<()>) {
        self.outcomes.lock().push_back(outcome);
    }

    /// Marks `txid` confirmed at `height`. Returns false if it was never
    /// registered.
    pub(crate) fn confirm(&self, txid: &Txid, height: u32) -> bool {
        match self.pending.lock().get(txid) {
            Some(sender) => {
                sender.send_replace(Some(TxConfirmation {
                    block_hash: [0xBB; 32],
                    block_height: height,
                    tx_index: 1,
                }));
                true
            }
            None => false,
        }
    }

    /// Installs a block stream and returns its sending half.
    pub(crate) fn block_stream(&self) -> mpsc::Sender<BlockEpoch> {
        let (tx, rx) = mpsc::channel(8);
        *self.blocks.lock() = Some(rx);
        tx
    }
}

#[async_trait]
impl ChainNotifier for MockNotifier {
    async fn register_confirmations_ntfn(
        &self,
        txid: &Txid,
        pk_script: &[u8],
        num_confs: u32,
        height_hint: u32,
    ) -> BumperResult<ConfirmationEvent> {
        self.registrations.lock().push(Registration {
            txid: *txid,
            pk_script: pk_script.to_vec(),
            num_confs,
            height_hint,
        });
        next(&self.outcomes, || Ok(()))?;

        let (sender, event) = ConfirmationEvent::channel();
        self.pending.lock().insert(*txid, sender);
        Ok(event)
    }

    async fn register_block_epoch_ntfn(&self) -> BumperResult<mpsc::Receiver<BlockEpoch>> {
        self.blocks
            .lock()
            .take()
            .ok_or_else(|| BumperError::Notifier("no block stream installed".to_string()))
    }
}

/// Fee function with a fixed rate and queued increment outcomes.
///
/// Once the queue is empty it reports exhaustion.
pub(crate) struct MockFeeFunction {
    fee_rate: Mutex<SatPerKWeight>,
    increments: Mutex<VecDeque<BumperResult<bool>>>,
    pub(crate) increment_calls: AtomicUsize,
}

impl MockFeeFunction {
    pub(crate) fn new(fee_rate: SatPerKWeight) -> Self {
        Self {
            fee_rate: Mutex::new(fee_rate),
            increments: Mutex::new(VecDeque::new()),
            increment_calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn push_increment(&self, outcome: BumperResult<bool>) {
        self.increments.lock().push_back(outcome);
    }

    pub(crate) fn set_fee_rate(&self, fee_rate: SatPerKWeight) {
        *self.fee_rate.lock() = fee_rate;
    }
}

impl FeeFunction for MockFeeFunction {
    fn fee_rate(&self) -> SatPerKWeight {
        *self.fee_rate.lock()
    }

    fn increment(&self) -> BumperResult<bool> {
        self.increment_calls.fetch_add(1, Ordering::SeqCst);
        let fee_rate = self.fee_rate();
        next(&self.increments, || {
            Err(BumperError::FeeFunctionExhausted { fee_rate })
        })
    }
}

pub(crate) type TestPublisher = TxPublisher<MockEstimator, MockSigner, MockWallet, MockNotifier>;

/// Handles to the collaborators a test publisher was built with.
pub(crate) struct Mockers {
    pub(crate) estimator: Arc<MockEstimator>,
    pub(crate) signer: Arc<MockSigner>,
    pub(crate) wallet: Arc<MockWallet>,
    pub(crate) notifier: Arc<MockNotifier>,
}

pub(crate) fn create_test_publisher() -> (TestPublisher, Mockers) {
    let mockers = Mockers {
        estimator: Arc::new(MockEstimator::new(SatPerKWeight(1000))),
        signer: Arc::new(MockSigner::new()),
        wallet: Arc::new(MockWallet::new()),
        notifier: Arc::new(MockNotifier::new()),
    };

    let publisher = TxPublisher::new(
        PublisherConfig::default(),
        Arc::clone(&mockers.estimator),
        Arc::clone(&mockers.signer),
        Arc::clone(&mockers.wallet),
        Arc::clone(&mockers.notifier),
    )
    .expect("default config is valid");

    (publisher, mockers)
}
