//! Fee-rate escalation strategies.
//!
//! A fee function starts at an estimated rate and only ever moves up,
//! never past the ceiling the request allows.
//!
//! ```text
//! rate
//!  ^                              ____ ending (ceiling)
//!  |                        ____/
//!  |                  ____/
//!  |            ____/
//!  |      ____/
//!  | ____/  starting (estimate, floored at relay fee)
//!  +-----------------------------------> position (0..=width)
//! ```

use super::fee_rate::SatPerKWeight;
use crate::error::{BumperError, BumperResult};
use parking_lot::Mutex;

/// A monotonic fee-rate schedule.
///
/// Implementations use interior mutability so a record and the task
/// driving its bumps can share one instance.
pub trait FeeFunction: Send + Sync {
    /// Current fee rate.
    fn fee_rate(&self) -> SatPerKWeight;

    /// Advances one step.
    ///
    /// Returns whether the rate rose. Must return an error once no further
    /// step is possible, so callers retrying on fee rejections terminate.
    fn increment(&self) -> BumperResult<bool>;
}

/// Blocks left until `deadline_height`, never less than 1.
pub fn calc_current_conf_target(current_height: i32, deadline_height: i32) -> u32 {
    let remaining = i64::from(deadline_height) - i64::from(current_height);
    remaining.max(1) as u32
}

#[derive(Debug)]
struct LinearState {
    position: u32,
    current_fee_rate: SatPerKWeight,
}

/// Raises the fee rate in equal steps from the starting estimate to the
/// ceiling across `width` blocks.
#[derive(Debug)]
pub struct LinearFeeFunction {
    starting_fee_rate: SatPerKWeight,
    ending_fee_rate: SatPerKWeight,
    width: u32,
    /// Per-step increase in milli-sat/kw, kept fine-grained so small ranges
    /// over long windows still move.
    delta_msat: u64,
    state: Mutex<LinearState>,
}

impl LinearFeeFunction {
    /// Builds the schedule.
    ///
    /// `estimated_fee_rate` is clamped into `[relay_floor, max_fee_rate]`.
    /// When the relay floor is above the ceiling the ceiling wins.
    pub fn new(
        max_fee_rate: SatPerKWeight,
        conf_target: u32,
        estimated_fee_rate: SatPerKWeight,
        relay_floor: SatPerKWeight,
    ) -> BumperResult<Self> {
        if conf_target == 0 {
            return Err(BumperError::InvalidConfTarget);
        }

        let starting_fee_rate = estimated_fee_rate.max(relay_floor).min(max_fee_rate);
        let delta_msat = (max_fee_rate.0 - starting_fee_rate.0).saturating_mul(1000)
            / u64::from(conf_target);

        tracing::debug!(
            starting = %starting_fee_rate,
            ending = %max_fee_rate,
            width = conf_target,
            "Linear fee function initialized"
        );

        Ok(Self {
            starting_fee_rate,
            ending_fee_rate: max_fee_rate,
            width: conf_target,
            delta_msat,
            state: Mutex::new(LinearState {
                position: 0,
                current_fee_rate: starting_fee_rate,
            }),
        })
    }

    pub fn starting_fee_rate(&self) -> SatPerKWeight {
        self.starting_fee_rate
    }

    pub fn ending_fee_rate(&self) -> SatPerKWeight {
        self.ending_fee_rate
    }

    pub fn position(&self) -> u32 {
        self.state.lock().position
    }

    /// Jumps to the position a fresh confirmation target implies.
    ///
    /// A target at or above the remaining width leaves the rate unchanged;
    /// the rate never moves backwards.
    pub fn increase_fee_rate(&self, conf_target: u32) -> BumperResult<bool> {
        let target_position = self.width.saturating_sub(conf_target);
        self.advance_to(&mut self.state.lock(), target_position)
    }

    fn fee_rate_at(&self, position: u32) -> SatPerKWeight {
        if position >= self.width {
            return self.ending_fee_rate;
        }
        let msat = self
            .starting_fee_rate
            .0
            .saturating_mul(1000)
            .saturating_add(self.delta_msat.saturating_mul(u64::from(position)));
        SatPerKWeight(msat / 1000).min(self.ending_fee_rate)
    }

    fn advance_to(&self, state: &mut LinearState, position: u32) -> BumperResult<bool> {
        if state.position >= self.width {
            return Err(BumperError::FeeFunctionExhausted {
                fee_rate: state.current_fee_rate,
            });
        }
        if position <= state.position {
            return Ok(false);
        }

        let previous = state.current_fee_rate;
        state.position = position.min(self.width);
        state.current_fee_rate = self.fee_rate_at(state.position);

        Ok(state.current_fee_rate > previous)
    }
}

impl FeeFunction for LinearFeeFunction {
    fn fee_rate(&self) -> SatPerKWeight {
        self.state.lock().current_fee_rate
    }

    fn increment(&self) -> BumperResult<bool> {
        let mut state = self.state.lock();
        let next = state.position.saturating_add(1);
        self.advance_to(&mut state, next)
    }
}
