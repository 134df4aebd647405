//! Outbound (Driven) ports for the fee bumper.
//!
//! Collaborators the publisher drives: fee estimation, signing, the wallet
//! and the chain notifier. Implementations must be safe to call from
//! several tasks at once.

use crate::domain::{Hash, SatPerKWeight, SweepInput, Transaction, Txid};
use crate::error::BumperResult;
use async_trait::async_trait;
use tokio::sync::{mpsc, watch};

/// Chain fee estimation.
#[async_trait]
pub trait FeeEstimator: Send + Sync {
    /// Fee rate expected to confirm within `conf_target` blocks.
    async fn estimate_fee_per_kw(&self, conf_target: u32) -> BumperResult<SatPerKWeight>;

    /// Minimum fee rate the backend relays.
    fn relay_fee_per_kw(&self) -> SatPerKWeight;
}

/// Spending data for one input.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InputScript {
    pub sig_script: Vec<u8>,
    pub witness: Vec<Vec<u8>>,
}

/// Produces the sigScript and witness that spend a sweep input.
#[async_trait]
pub trait InputSigner: Send + Sync {
    /// Signs input `input_index` of `tx`, which spends `input`.
    async fn compute_input_script(
        &self,
        tx: &Transaction,
        input: &SweepInput,
        input_index: usize,
    ) -> BumperResult<InputScript>;
}

/// Wallet backend used for policy checks and broadcast.
#[async_trait]
pub trait Wallet: Send + Sync {
    /// Dry-runs mempool acceptance without broadcasting.
    ///
    /// Policy rejections must be reported as `BumperError::Mempool` so fee
    /// rejections can be told apart from everything else.
    async fn check_mempool_acceptance(&self, tx: &Transaction) -> BumperResult<()>;

    /// Broadcasts `tx` to the network.
    async fn publish_transaction(&self, tx: &Transaction, label: &str) -> BumperResult<()>;
}

/// Details of a confirmed transaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TxConfirmation {
    pub block_hash: Hash,
    pub block_height: u32,
    pub tx_index: u32,
}

/// Handle to a pending confirmation registration.
///
/// Cheap to clone; every clone observes the same confirmation.
#[derive(Clone, Debug)]
pub struct ConfirmationEvent {
    confirmed: watch::Receiver<Option<TxConfirmation>>,
}

impl ConfirmationEvent {
    /// Creates an event and the sender the notifier resolves it with.
    pub fn channel() -> (watch::Sender<Option<TxConfirmation>>, Self) {
        let (tx, rx) = watch::channel(None);
        (tx, Self { confirmed: rx })
    }

    /// Confirmation details, if the transaction has confirmed. Never blocks.
    pub fn confirmation(&self) -> Option<TxConfirmation> {
        self.confirmed.borrow().clone()
    }

    pub fn is_confirmed(&self) -> bool {
        self.confirmed.borrow().is_some()
    }
}

/// A newly connected block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockEpoch {
    pub height: i32,
    pub hash: Hash,
}

/// Chain notifications.
#[async_trait]
pub trait ChainNotifier: Send + Sync {
    /// Registers for `num_confs` confirmations of `txid` paying to
    /// `pk_script`, scanning from `height_hint`.
    async fn register_confirmations_ntfn(
        &self,
        txid: &Txid,
        pk_script: &[u8],
        num_confs: u32,
        height_hint: u32,
    ) -> BumperResult<ConfirmationEvent>;

    /// Subscribes to new blocks.
    async fn register_block_epoch_ntfn(&self) -> BumperResult<mpsc::Receiver<BlockEpoch>>;
}
