//! Transaction weight estimation.
//!
//! Weight = 4 * non-witness bytes + witness bytes. Input witness sizes are
//! the expected worst case for each spend type, since signatures vary by a
//! byte or two.

use super::request::SweepInput;
use super::transaction::compact_size_len;
use crate::error::{BumperError, BumperResult};

/// Version (4) + lock time (4).
pub const BASE_TX_SIZE: u64 = 8;

/// Outpoint (36) + script length (1) + sequence (4), empty sigScript.
pub const INPUT_SIZE: u64 = 32 + 4 + 1 + 4;

/// Segwit marker and flag bytes.
pub const WITNESS_HEADER_SIZE: u64 = 2;

/// Factor applied to non-witness bytes.
pub const WITNESS_SCALE_FACTOR: u64 = 4;

/// Spend type of an input, which fixes its sigScript and witness size.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum WitnessType {
    /// Native P2WKH spend.
    WitnessKeyHash,
    /// P2WKH nested in P2SH.
    NestedWitnessKeyHash,
    /// Taproot key path spend with the default sighash.
    TaprootPubKeySpend,
    /// Our delayed to_local commitment output after its CSV expires.
    CommitmentTimeLock,
}

impl WitnessType {
    /// Bytes added to the input's sigScript.
    pub fn sig_script_size(self) -> u64 {
        match self {
            // push(22) + 0x00 0x14 <20-byte hash>
            Self::NestedWitnessKeyHash => 1 + 22,
            _ => 0,
        }
    }

    /// Witness bytes including the element count.
    pub fn witness_size(self) -> u64 {
        match self {
            // elements + sig len + sig + key len + key
            Self::WitnessKeyHash | Self::NestedWitnessKeyHash => 1 + 1 + 73 + 1 + 33,
            // elements + sig len + schnorr sig
            Self::TaprootPubKeySpend => 1 + 1 + 64,
            // elements + sig len + sig + empty + script len + to_local script
            Self::CommitmentTimeLock => 1 + 1 + 73 + 1 + 1 + 79,
        }
    }
}

/// Standard output script templates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputType {
    P2pkh,
    P2sh,
    P2wpkh,
    P2wsh,
    P2tr,
}

impl OutputType {
    /// Classifies a pkScript, returning `None` for non-standard scripts.
    pub fn classify(script: &[u8]) -> Option<Self> {
        match script {
            [0x76, 0xA9, 0x14, hash @ .., 0x88, 0xAC] if hash.len() == 20 => Some(Self::P2pkh),
            [0xA9, 0x14, hash @ .., 0x87] if hash.len() == 20 => Some(Self::P2sh),
            [0x00, 0x14, program @ ..] if program.len() == 20 => Some(Self::P2wpkh),
            [0x00, 0x20, program @ ..] if program.len() == 32 => Some(Self::P2wsh),
            [0x51, 0x20, key @ ..] if key.len() == 32 => Some(Self::P2tr),
            _ => None,
        }
    }
}

/// Serialized size of an output paying to `script`.
fn output_size(script: &[u8]) -> u64 {
    let len = script.len() as u64;
    8 + compact_size_len(len) + len
}

/// Accumulates input and output sizes of a transaction under construction.
#[derive(Clone, Debug, Default)]
pub struct TxWeightEstimator {
    input_count: u64,
    input_size: u64,
    input_witness_size: u64,
    has_witness: bool,
    output_count: u64,
    output_size: u64,
}

impl TxWeightEstimator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_input(&mut self, witness_type: WitnessType) -> &mut Self {
        self.input_count += 1;
        self.input_size += INPUT_SIZE + witness_type.sig_script_size();
        self.input_witness_size += witness_type.witness_size();
        self.has_witness = true;
        self
    }

    /// Adds an output, failing on scripts that are not a known template.
    pub fn add_output(&mut self, script: &[u8]) -> BumperResult<&mut Self> {
        if OutputType::classify(script).is_none() {
            return Err(BumperError::UnknownOutputScript {
                script: hex::encode(script),
            });
        }
        self.output_count += 1;
        self.output_size += output_size(script);
        Ok(self)
    }

    /// Non-witness bytes.
    pub fn base_size(&self) -> u64 {
        BASE_TX_SIZE
            + compact_size_len(self.input_count)
            + self.input_size
            + compact_size_len(self.output_count)
            + self.output_size
    }

    /// Witness bytes including the segwit marker and flag.
    pub fn witness_size(&self) -> u64 {
        if self.has_witness {
            WITNESS_HEADER_SIZE + self.input_witness_size
        } else {
            0
        }
    }

    pub fn weight(&self) -> u64 {
        self.base_size() * WITNESS_SCALE_FACTOR + self.witness_size()
    }
}

/// Weight of a sweep spending `inputs` to a single output at `output_script`.
pub fn calc_sweep_tx_weight(inputs: &[SweepInput], output_script: &[u8]) -> BumperResult<u64> {
    let mut estimator = TxWeightEstimator::new();
    estimator.add_output(output_script)?;
    for input in inputs {
        estimator.add_input(input.witness_type);
    }
    Ok(estimator.weight())
}
