use super::fees::{self, CommissionRates, FeeSplit, Rate};
use super::ports::{TokenLedger, Transfer};
use super::token::{Address, Token};
use crate::error::{Result, SwapError};
use serde::Deserialize;
use tracing::debug;

/// Deployment-time parameters of the forwarding proxy. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawCommissionConfig")]
pub struct CommissionConfig {
    pub external_router: Address,
    pub token_approval_target: Address,
    pub referrer1: Address,
    pub referrer2: Address,
    pub rates: CommissionRates,
}

impl CommissionConfig {
    pub fn new(
        external_router: Address,
        token_approval_target: Address,
        referrer1: Address,
        referrer2: Address,
        rate1: u64,
        rate2: u64,
    ) -> Result<Self> {
        let rates = CommissionRates::new(rate1, rate2)?;
        if referrer1 == referrer2 {
            return Err(SwapError::InvalidConfiguration(format!(
                "referrers must be distinct, both are {referrer1}"
            )));
        }
        Ok(Self {
            external_router,
            token_approval_target,
            referrer1,
            referrer2,
            rates,
        })
    }
}

/// On-disk shape of [`CommissionConfig`]; rates are written as decimal fractions.
#[derive(Debug, Deserialize)]
struct RawCommissionConfig {
    external_router: Address,
    token_approval_target: Address,
    referrer1: Address,
    referrer2: Address,
    rate1: rust_decimal::Decimal,
    rate2: rust_decimal::Decimal,
}

impl TryFrom<RawCommissionConfig> for CommissionConfig {
    type Error = SwapError;

    fn try_from(raw: RawCommissionConfig) -> Result<Self> {
        let rate1 = Rate::from_fraction(raw.rate1)?;
        let rate2 = Rate::from_fraction(raw.rate2)?;
        Self::new(
            raw.external_router,
            raw.token_approval_target,
            raw.referrer1,
            raw.referrer2,
            rate1.parts_per_billion(),
            rate2.parts_per_billion(),
        )
    }
}

/// Which transfer primitive pays the referrers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayoutLeg {
    Native,
    Token,
}

/// The two referrers and their cut of every swap.
#[derive(Debug, Clone)]
pub struct CommissionLedger {
    referrer1: Address,
    referrer2: Address,
    rates: CommissionRates,
}

impl CommissionLedger {
    pub fn new(config: &CommissionConfig) -> Self {
        Self {
            referrer1: config.referrer1.clone(),
            referrer2: config.referrer2.clone(),
            rates: config.rates,
        }
    }

    pub fn referrers(&self) -> (&Address, &Address) {
        (&self.referrer1, &self.referrer2)
    }

    pub fn rates(&self) -> &CommissionRates {
        &self.rates
    }

    pub fn split(&self, gross: u128) -> Result<FeeSplit> {
        fees::split(gross, &self.rates)
    }

    /// Moves `amount` of `token` out of `custodian` to `payee`.
    ///
    /// Any rejection by the ledger surfaces as `CommissionTransferFailed`.
    pub async fn payout(
        &self,
        ledger: &dyn TokenLedger,
        custodian: &Address,
        token: &Token,
        amount: u128,
        payee: &Address,
        leg: PayoutLeg,
    ) -> Result<()> {
        let failed = |reason: String| SwapError::CommissionTransferFailed {
            payee: payee.clone(),
            reason,
        };
        let transfer = Transfer::new(custodian.clone(), payee.clone(), token.clone(), amount);
        let outcome = match leg {
            PayoutLeg::Native if !token.is_native() => {
                return Err(failed(format!(
                    "native commission requested but the user pays in {token}"
                )));
            }
            PayoutLeg::Native => ledger.transfer_native(transfer).await,
            PayoutLeg::Token => ledger.transfer(transfer).await,
        };
        outcome.map_err(|e| failed(e.to_string()))?;

        debug!(%payee, %token, amount, "commission paid");
        Ok(())
    }
}
