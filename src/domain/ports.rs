use super::swap::SessionId;
use super::token::{Address, Token};
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// A single movement of funds between two ledger participants.
///
/// `session` tags the credit side so that the recipient can later ask how
/// much it received on behalf of one particular swap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transfer {
    pub from: Address,
    pub to: Address,
    pub token: Token,
    pub amount: u128,
    pub session: Option<SessionId>,
}

impl Transfer {
    pub fn new(from: Address, to: Address, token: Token, amount: u128) -> Self {
        Self {
            from,
            to,
            token,
            amount,
            session: None,
        }
    }

    pub fn tagged(mut self, session: SessionId) -> Self {
        self.session = Some(session);
        self
    }
}

/// Position in the ledger journal that later changes can be reverted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checkpoint(pub usize);

tokio::task_local! {
    /// The unit of work the current task belongs to. Ledger writes made
    /// inside it join the unit; writes from any other task wait until the
    /// unit is committed or reverted.
    pub static UNIT_OF_WORK: Checkpoint;
}

/// Fungible-token and native-currency balances shared by every participant.
///
/// `checkpoint` opens a unit of work and `commit` or `revert_to` closes it.
/// Only writes made inside [`UNIT_OF_WORK`] scoped to that checkpoint belong
/// to the unit; everyone else's writes are held back until it closes, so a
/// revert never undoes a transfer it does not own.
#[async_trait]
pub trait TokenLedger: Send + Sync {
    async fn balance_of(&self, holder: &Address, token: &Token) -> Result<u128>;
    async fn transfer(&self, transfer: Transfer) -> Result<()>;
    /// Native-currency counterpart of `transfer`; rejects contract tokens.
    async fn transfer_native(&self, transfer: Transfer) -> Result<()>;
    async fn approve(&self, owner: &Address, spender: &Address, token: &Token, amount: u128) -> Result<()>;
    async fn allowance(&self, owner: &Address, spender: &Address, token: &Token) -> Result<u128>;
    /// Moves `transfer.amount` out of `transfer.from` using `spender`'s allowance.
    async fn transfer_from(&self, spender: &Address, transfer: Transfer) -> Result<()>;
    /// Total of `token` credited to `holder` by transfers tagged with `session`.
    async fn session_credit(&self, session: SessionId, holder: &Address, token: &Token) -> Result<u128>;
    async fn checkpoint(&self) -> Result<Checkpoint>;
    async fn revert_to(&self, checkpoint: Checkpoint) -> Result<()>;
    async fn commit(&self, checkpoint: Checkpoint) -> Result<()>;
}

pub type SharedLedger = Arc<dyn TokenLedger>;

/// What the controller asks the external router to do for one route leg.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouterOrder {
    pub session: SessionId,
    /// Address that pays the input and must receive the output.
    pub recipient: Address,
    pub from_token: Token,
    pub to_token: Token,
    pub amount: u128,
    pub min_return: u128,
    pub execution_target: Address,
    pub pool: Address,
}

/// The router's own account of a successful execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouterReceipt {
    pub output: u128,
}

/// Opaque router failure. The controller never interprets the message.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct RouterFailure(pub String);

impl RouterFailure {
    pub fn new(reason: impl Into<String>) -> Self {
        Self(reason.into())
    }
}

/// Boundary to the swap-execution collaborator.
///
/// On success the router has pulled (or been sent) `order.amount` of
/// `from_token` and credited some `to_token` to `order.recipient`, tagged
/// with `order.session`.
#[async_trait]
pub trait ExternalRouter: Send + Sync {
    fn address(&self) -> &Address;
    async fn execute(&self, order: RouterOrder) -> std::result::Result<RouterReceipt, RouterFailure>;
}

pub type SharedRouter = Arc<dyn ExternalRouter>;
