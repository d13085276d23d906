#![allow(dead_code)]

use async_trait::async_trait;
use refswap::application::controller::SwapController;
use refswap::domain::commission::CommissionConfig;
use refswap::domain::ports::{
    ExternalRouter, RouterFailure, RouterOrder, RouterReceipt, SharedRouter, TokenLedger,
    Transfer,
};
use refswap::domain::swap::TokenSwap;
use refswap::domain::token::{Address, Token};
use refswap::infrastructure::fixed_rate::{FixedRateRouter, Quote};
use refswap::infrastructure::in_memory::InMemoryLedger;
use std::sync::Arc;
use std::time::Duration;

pub const ONE_ETHER: u128 = 1_000_000_000_000_000_000;
pub const ROUTER_RESERVE: u128 = 1_000_000_000_000;

pub fn addr(name: &str) -> Address {
    Address::from(name)
}

pub fn weth() -> Token {
    Token::contract("weth")
}

pub fn usdc() -> Token {
    Token::contract("usdc")
}

pub fn config() -> CommissionConfig {
    CommissionConfig::new(
        addr("router"),
        addr("approver"),
        addr("ref-a"),
        addr("ref-b"),
        5_000_000,
        3_000_000,
    )
    .expect("valid commission config")
}

/// 3000 USDC (6 decimals) per WETH (18 decimals); 3 USDC units per wei of native.
pub fn fixed_rate_router(ledger: &InMemoryLedger) -> FixedRateRouter {
    FixedRateRouter::new(addr("router"), addr("approver"), Arc::new(ledger.clone()))
        .with_quote(weth(), usdc(), Quote::new(3_000_000_000, ONE_ETHER))
        .with_quote(Token::Native, usdc(), Quote::new(3, 1))
}

pub struct Harness {
    pub ledger: InMemoryLedger,
    pub controller: Arc<SwapController>,
}

impl Harness {
    pub async fn balance(&self, holder: &str, token: &Token) -> u128 {
        self.ledger.balance_of(&addr(holder), token).await.unwrap()
    }

    pub async fn custody(&self, caller: &str, token: &Token) -> u128 {
        self.controller.custody_of(&addr(caller), token).await
    }

    /// Mints `amount` to `caller` and deposits all of it with the controller.
    pub async fn fund_and_deposit(&self, caller: &str, token: &Token, amount: u128) {
        self.ledger.mint(&addr(caller), token, amount).await.unwrap();
        self.controller
            .deposit(&addr(caller), token, amount)
            .await
            .unwrap();
    }
}

/// A fresh ledger whose router holds USDC reserves.
pub async fn funded_ledger() -> InMemoryLedger {
    let ledger = InMemoryLedger::new();
    ledger
        .mint(&addr("router"), &usdc(), ROUTER_RESERVE)
        .await
        .unwrap();
    ledger
}

pub fn harness_with(ledger: InMemoryLedger, router: SharedRouter) -> Harness {
    let controller = SwapController::new(addr("proxy"), config(), Arc::new(ledger.clone()), router)
        .expect("controller deploys");
    Harness {
        ledger,
        controller: Arc::new(controller),
    }
}

pub async fn fixed_rate_harness() -> Harness {
    let ledger = funded_ledger().await;
    let router = Arc::new(fixed_rate_router(&ledger));
    harness_with(ledger, router)
}

pub fn weth_to_usdc(gross_amount: u128, min_return: u128) -> TokenSwap {
    TokenSwap {
        from_token: weth(),
        to_token: usdc(),
        gross_amount,
        min_return,
        execution_target: addr("adapter"),
        pool: addr("pool"),
        is_native_commission: false,
    }
}

/// Pulls the input like a real router, then credits one unit less than the
/// order's minimum while claiming to have met it.
pub struct ShortchangingRouter {
    address: Address,
    spender: Address,
    ledger: InMemoryLedger,
}

impl ShortchangingRouter {
    pub fn new(ledger: &InMemoryLedger) -> Self {
        Self {
            address: addr("router"),
            spender: addr("approver"),
            ledger: ledger.clone(),
        }
    }
}

#[async_trait]
impl ExternalRouter for ShortchangingRouter {
    fn address(&self) -> &Address {
        &self.address
    }

    async fn execute(&self, order: RouterOrder) -> Result<RouterReceipt, RouterFailure> {
        let pull = Transfer::new(
            order.recipient.clone(),
            self.address.clone(),
            order.from_token.clone(),
            order.amount,
        );
        self.ledger
            .transfer_from(&self.spender, pull)
            .await
            .map_err(|e| RouterFailure::new(e.to_string()))?;

        let paid = order.min_return.saturating_sub(1);
        let payout = Transfer::new(self.address.clone(), order.recipient.clone(), order.to_token.clone(), paid)
            .tagged(order.session);
        self.ledger
            .transfer(payout)
            .await
            .map_err(|e| RouterFailure::new(e.to_string()))?;

        Ok(RouterReceipt {
            output: order.min_return,
        })
    }
}

/// Waits before handing the order to `inner`, or before failing it when
/// `inner` is `None`.
pub struct DelayedRouter {
    address: Address,
    delay: Duration,
    inner: Option<FixedRateRouter>,
}

impl DelayedRouter {
    pub fn filling(ledger: &InMemoryLedger, delay: Duration) -> Self {
        Self {
            address: addr("router"),
            delay,
            inner: Some(fixed_rate_router(ledger)),
        }
    }

    pub fn failing(delay: Duration) -> Self {
        Self {
            address: addr("router"),
            delay,
            inner: None,
        }
    }
}

#[async_trait]
impl ExternalRouter for DelayedRouter {
    fn address(&self) -> &Address {
        &self.address
    }

    async fn execute(&self, order: RouterOrder) -> Result<RouterReceipt, RouterFailure> {
        tokio::time::sleep(self.delay).await;
        match &self.inner {
            Some(router) => router.execute(order).await,
            None => Err(RouterFailure::new("pool paused")),
        }
    }
}

/// Takes one unit less than it was approved for and still pays full output.
pub struct UnderpullingRouter {
    address: Address,
    spender: Address,
    ledger: InMemoryLedger,
}

impl UnderpullingRouter {
    pub fn new(ledger: &InMemoryLedger) -> Self {
        Self {
            address: addr("router"),
            spender: addr("approver"),
            ledger: ledger.clone(),
        }
    }
}

#[async_trait]
impl ExternalRouter for UnderpullingRouter {
    fn address(&self) -> &Address {
        &self.address
    }

    async fn execute(&self, order: RouterOrder) -> Result<RouterReceipt, RouterFailure> {
        let pull = Transfer::new(
            order.recipient.clone(),
            self.address.clone(),
            order.from_token.clone(),
            order.amount - 1,
        );
        self.ledger
            .transfer_from(&self.spender, pull)
            .await
            .map_err(|e| RouterFailure::new(e.to_string()))?;

        let payout = Transfer::new(self.address.clone(), order.recipient.clone(), order.to_token.clone(), order.amount)
            .tagged(order.session);
        self.ledger
            .transfer(payout)
            .await
            .map_err(|e| RouterFailure::new(e.to_string()))?;

        Ok(RouterReceipt {
            output: order.amount,
        })
    }
}

/// Waits until the controller has finished whatever it was running.
pub async fn settle(h: &Harness) {
    while h.controller.is_busy() {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
