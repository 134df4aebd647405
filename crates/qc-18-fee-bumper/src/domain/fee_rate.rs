//! Amounts and fee rates.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Value in satoshis.
pub type Amount = u64;

/// Lowest fee rate any node relays at (1 sat/vbyte rounded up per kw).
pub const FEE_PER_KW_FLOOR: SatPerKWeight = SatPerKWeight(253);

/// Fee rate in satoshis per 1000 weight units.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct SatPerKWeight(pub u64);

impl SatPerKWeight {
    /// Rate that pays `fee` for a transaction of `weight` units.
    ///
    /// A zero weight yields a zero rate.
    pub fn from_fee_and_weight(fee: Amount, weight: u64) -> Self {
        if weight == 0 {
            return Self(0);
        }
        Self(fee.saturating_mul(1000) / weight)
    }

    /// Fee this rate pays for `weight` units.
    pub fn fee_for_weight(self, weight: u64) -> Amount {
        self.0.saturating_mul(weight) / 1000
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl From<u64> for SatPerKWeight {
    fn from(rate: u64) -> Self {
        Self(rate)
    }
}

impl fmt::Display for SatPerKWeight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} sat/kw", self.0)
    }
}
