use crate::application::controller::SwapController;
use crate::domain::commission::CommissionConfig;
use crate::domain::token::{Address, Token};
use crate::error::Result;
use crate::infrastructure::fixed_rate::{FixedRateRouter, Quote};
use crate::infrastructure::in_memory::InMemoryLedger;
use serde::Deserialize;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct QuoteEntry {
    pub from: Token,
    pub to: Token,
    pub numerator: u128,
    pub denominator: u128,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Funding {
    pub holder: Address,
    pub token: Token,
    pub amount: u128,
}

/// A deployment description: the controller, its commission parameters and
/// the initial state of the in-memory world it runs against.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DeploymentConfig {
    pub controller: Address,
    pub commission: CommissionConfig,
    #[serde(default)]
    pub quotes: Vec<QuoteEntry>,
    #[serde(default)]
    pub balances: Vec<Funding>,
}

/// A ledger with a controller and a router deployed on it.
pub struct World {
    pub ledger: InMemoryLedger,
    pub controller: SwapController,
}

impl DeploymentConfig {
    pub fn from_reader<R: Read>(source: R) -> Result<Self> {
        Ok(serde_json::from_reader(BufReader::new(source))?)
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_reader(File::open(path)?)
    }

    /// Funds the ledger and deploys a fixed-rate router plus the controller.
    pub async fn deploy(self) -> Result<World> {
        let ledger = InMemoryLedger::new();
        for funding in &self.balances {
            ledger.mint(&funding.holder, &funding.token, funding.amount).await?;
        }

        let router = self.quotes.iter().fold(
            FixedRateRouter::new(
                self.commission.external_router.clone(),
                self.commission.token_approval_target.clone(),
                Arc::new(ledger.clone()),
            ),
            |router, entry| {
                router.with_quote(
                    entry.from.clone(),
                    entry.to.clone(),
                    Quote::new(entry.numerator, entry.denominator),
                )
            },
        );

        let controller = SwapController::new(
            self.controller,
            self.commission,
            Arc::new(ledger.clone()),
            Arc::new(router),
        )?;
        info!(controller = %controller.address(), pools = self.quotes.len(), "deployed");

        Ok(World { ledger, controller })
    }
}
