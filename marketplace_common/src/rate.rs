use std::fmt::Display;

use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

use crate::Cents;

/// Basis points per whole (100%).
pub const BPS_SCALE: i64 = 10_000;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RateError {
    #[error("Rate of {0} bps is outside the range 0..=10000")]
    OutOfRange(i64),
    #[error("'{0}' is not a valid percentage")]
    InvalidPercentage(String),
}

//--------------------------------------        Rate        ---------------------------------------------------------
/// A percentage expressed in basis points. `Rate::from_bps(109)` is 1.09%.
#[derive(Debug, Clone, Copy, Default, Type, PartialEq, Eq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct Rate(i64);

impl Rate {
    pub fn from_bps(bps: i64) -> Result<Self, RateError> {
        if (0..=BPS_SCALE).contains(&bps) {
            Ok(Self(bps))
        } else {
            Err(RateError::OutOfRange(bps))
        }
    }

    /// Whole-number percentage, e.g. `from_percent(5)` is 5%.
    pub fn from_percent(percent: i64) -> Result<Self, RateError> {
        Self::from_bps(percent.saturating_mul(100))
    }

    /// Parses a decimal percentage with up to two decimal places, e.g. `"1.09"`.
    pub fn parse_percent(s: &str) -> Result<Self, RateError> {
        let amount = s
            .trim()
            .trim_end_matches('%')
            .parse::<Cents>()
            .map_err(|_| RateError::InvalidPercentage(s.to_string()))?;
        Self::from_bps(amount.value())
    }

    pub fn bps(&self) -> i64 {
        self.0
    }

    /// Applies the rate to `amount` without rounding. The result is in units of 1/10000 of a cent.
    pub fn apply_exact(&self, amount: Cents) -> i128 {
        i128::from(amount.value()) * i128::from(self.0)
    }

    /// Applies the rate to `amount` and rounds half-up to whole cents.
    pub fn apply(&self, amount: Cents) -> Cents {
        round_scaled(self.apply_exact(amount))
    }
}

/// Rounds a value held in 1/10000-cent units to whole cents, half away from zero.
pub(crate) fn round_scaled(scaled: i128) -> Cents {
    let scale = i128::from(BPS_SCALE);
    let half = scale / 2;
    let rounded = if scaled >= 0 { (scaled + half) / scale } else { -((-scaled + half) / scale) };
    #[allow(clippy::cast_possible_truncation)]
    Cents::from(rounded as i64)
}

impl Cents {
    /// Converts an exact value in 1/10000-cent units (as produced by [`Rate::apply_exact`]) to cents, rounding
    /// half-up.
    pub fn from_scaled(scaled: i128) -> Self {
        round_scaled(scaled)
    }

    /// This amount in 1/10000-cent units.
    pub fn to_scaled(&self) -> i128 {
        i128::from(self.value()) * i128::from(BPS_SCALE)
    }
}

impl Display for Rate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{:02}%", self.0 / 100, self.0 % 100)
    }
}
