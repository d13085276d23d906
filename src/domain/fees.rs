//! Fixed-point commission arithmetic.
//!
//! Rates are parts-per-billion. All divisions round toward zero, so a
//! commission is never larger than its exact share of the gross amount and
//! `net` absorbs any rounding dust.

use crate::error::{Result, SwapError};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Denominator of every commission rate (10^9 parts per billion).
pub const RATE_DENOMINATOR: u64 = 1_000_000_000;

/// A commission rate in parts-per-billion of the gross amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Rate(u64);

impl Rate {
    pub const ZERO: Self = Self(0);

    /// A single rate on its own may not reach 100%.
    pub fn new(parts_per_billion: u64) -> Result<Self> {
        if parts_per_billion < RATE_DENOMINATOR {
            Ok(Self(parts_per_billion))
        } else {
            Err(SwapError::InvalidRateConfiguration {
                rate1: parts_per_billion,
                rate2: 0,
            })
        }
    }

    /// Converts a decimal fraction (`0.005` for half a percent) to parts-per-billion.
    ///
    /// Fractions finer than one part per billion are rejected rather than rounded.
    pub fn from_fraction(fraction: Decimal) -> Result<Self> {
        let invalid = || {
            SwapError::InvalidConfiguration(format!(
                "commission rate {fraction} is not an exact fraction in [0, 1) at 1e-9 precision"
            ))
        };
        if fraction.is_sign_negative() && !fraction.is_zero() {
            return Err(invalid());
        }
        let scaled = fraction
            .checked_mul(Decimal::from(RATE_DENOMINATOR))
            .ok_or_else(invalid)?;
        if !scaled.fract().is_zero() {
            return Err(invalid());
        }
        let parts = scaled.to_u64().ok_or_else(invalid)?;
        Self::new(parts)
    }

    pub fn parts_per_billion(&self) -> u64 {
        self.0
    }
}

/// A validated pair of referrer rates whose sum stays strictly below 100%.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CommissionRates {
    rate1: Rate,
    rate2: Rate,
}

impl CommissionRates {
    pub fn new(rate1: u64, rate2: u64) -> Result<Self> {
        let invalid = SwapError::InvalidRateConfiguration { rate1, rate2 };
        match rate1.checked_add(rate2) {
            Some(total) if total < RATE_DENOMINATOR => Ok(Self {
                rate1: Rate(rate1),
                rate2: Rate(rate2),
            }),
            _ => Err(invalid),
        }
    }

    pub fn rate1(&self) -> Rate {
        self.rate1
    }

    pub fn rate2(&self) -> Rate {
        self.rate2
    }
}

/// How a gross amount is divided between the two referrers and the swap itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct FeeSplit {
    pub commission1: u128,
    pub commission2: u128,
    pub net: u128,
}

impl FeeSplit {
    pub fn total_commission(&self) -> u128 {
        self.commission1 + self.commission2
    }
}

/// `floor(amount * numerator / denominator)`, `None` on overflow or a zero denominator.
pub fn floor_div(amount: u128, numerator: u128, denominator: u128) -> Option<u128> {
    amount.checked_mul(numerator)?.checked_div(denominator)
}

/// One referrer's cut of `gross`.
pub fn commission(gross: u128, rate: Rate) -> Result<u128> {
    floor_div(
        gross,
        u128::from(rate.parts_per_billion()),
        u128::from(RATE_DENOMINATOR),
    )
    .ok_or(SwapError::ArithmeticOverflow("commission"))
}

/// Splits `gross` into both commissions and the net amount left to swap.
pub fn split(gross: u128, rates: &CommissionRates) -> Result<FeeSplit> {
    let commission1 = commission(gross, rates.rate1)?;
    let commission2 = commission(gross, rates.rate2)?;
    // rate1 + rate2 < 10^9 keeps the sum of both floors below gross
    let net = gross - commission1 - commission2;

    debug!(gross, commission1, commission2, net, "fee split");
    Ok(FeeSplit {
        commission1,
        commission2,
        net,
    })
}

/// Dust between what the router actually took and an independent
/// recomputation of `net`: positive when it took too much, negative when
/// some of the net amount was left behind.
pub fn reconcile(gross: u128, rates: &CommissionRates, forwarded: u128) -> Result<i128> {
    let expected = split(gross, rates)?.net;
    let forwarded = i128::try_from(forwarded).map_err(|_| SwapError::ArithmeticOverflow("reconcile"))?;
    let expected = i128::try_from(expected).map_err(|_| SwapError::ArithmeticOverflow("reconcile"))?;
    Ok(forwarded - expected)
}
