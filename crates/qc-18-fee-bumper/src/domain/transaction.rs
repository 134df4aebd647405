//! Minimal Bitcoin transaction model used for sweeps.
//!
//! Only what the publisher needs to build, identify and size a sweep is
//! modelled here. Script construction and signing stay with the wallet.

use super::fee_rate::Amount;
use sha2::{Digest, Sha256};
use std::fmt;

/// Transaction version used for sweeps.
pub const SWEEP_TX_VERSION: i32 = 2;

/// Highest sequence number that still signals opt-in replaceability.
pub const MAX_RBF_SEQUENCE: u32 = 0xFFFF_FFFD;

/// 32-byte block hash.
pub type Hash = [u8; 32];

/// Transaction id (double SHA-256 of the non-witness serialization).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Txid(pub [u8; 32]);

impl fmt::Display for Txid {
    /// Byte-reversed hex, the form block explorers and RPCs use.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut reversed = self.0;
        reversed.reverse();
        write!(f, "{}", hex::encode(reversed))
    }
}

/// Reference to a previous transaction output.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct OutPoint {
    pub txid: Txid,
    pub vout: u32,
}

impl OutPoint {
    pub fn new(txid: Txid, vout: u32) -> Self {
        Self { txid, vout }
    }
}

impl fmt::Display for OutPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.txid, self.vout)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TxIn {
    pub previous_output: OutPoint,
    pub sig_script: Vec<u8>,
    pub witness: Vec<Vec<u8>>,
    pub sequence: u32,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TxOut {
    pub value: Amount,
    pub pk_script: Vec<u8>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Transaction {
    pub version: i32,
    pub inputs: Vec<TxIn>,
    pub outputs: Vec<TxOut>,
    pub lock_time: u32,
}

impl Transaction {
    /// Computes the transaction id.
    ///
    /// Witness data is excluded, so signing does not change the id.
    pub fn txid(&self) -> Txid {
        let first = Sha256::digest(self.serialize_no_witness());
        let second = Sha256::digest(first);
        let mut id = [0u8; 32];
        id.copy_from_slice(&second);
        Txid(id)
    }

    /// Sum of all output values.
    pub fn output_value(&self) -> Amount {
        self.outputs.iter().map(|out| out.value).sum()
    }

    /// Legacy (non-witness) serialization.
    pub fn serialize_no_witness(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(10 + self.inputs.len() * 41 + self.outputs.len() * 43);
        buf.extend_from_slice(&self.version.to_le_bytes());

        write_compact_size(&mut buf, self.inputs.len() as u64);
        for input in &self.inputs {
            buf.extend_from_slice(&input.previous_output.txid.0);
            buf.extend_from_slice(&input.previous_output.vout.to_le_bytes());
            write_compact_size(&mut buf, input.sig_script.len() as u64);
            buf.extend_from_slice(&input.sig_script);
            buf.extend_from_slice(&input.sequence.to_le_bytes());
        }

        write_compact_size(&mut buf, self.outputs.len() as u64);
        for output in &self.outputs {
            buf.extend_from_slice(&output.value.to_le_bytes());
            write_compact_size(&mut buf, output.pk_script.len() as u64);
            buf.extend_from_slice(&output.pk_script);
        }

        buf.extend_from_slice(&self.lock_time.to_le_bytes());
        buf
    }
}

/// Number of bytes a compact-size length prefix takes.
pub fn compact_size_len(n: u64) -> u64 {
    match n {
        0..=0xFC => 1,
        0xFD..=0xFFFF => 3,
        0x1_0000..=0xFFFF_FFFF => 5,
        _ => 9,
    }
}

fn write_compact_size(buf: &mut Vec<u8>, n: u64) {
    match n {
        0..=0xFC => buf.push(n as u8),
        0xFD..=0xFFFF => {
            buf.push(0xFD);
            buf.extend_from_slice(&(n as u16).to_le_bytes());
        }
        0x1_0000..=0xFFFF_FFFF => {
            buf.push(0xFE);
            buf.extend_from_slice(&(n as u32).to_le_bytes());
        }
        _ => {
            buf.push(0xFF);
            buf.extend_from_slice(&n.to_le_bytes());
        }
    }
}
