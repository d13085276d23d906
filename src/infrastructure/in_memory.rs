use crate::domain::ports::{Checkpoint, TokenLedger, Transfer, UNIT_OF_WORK};
use crate::domain::swap::SessionId;
use crate::domain::token::{Address, Token};
use crate::error::{LedgerError, Result};
use async_trait::async_trait;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard, OwnedMutexGuard, RwLock, RwLockWriteGuard};
use tracing::{debug, trace};

type BalanceKey = (Address, Token);
type AllowanceKey = (Address, Address, Token);
type CreditKey = (SessionId, Address, Token);

/// Previous value of one slot, recorded while a checkpoint is open.
#[derive(Debug)]
enum JournalEntry {
    Balance(BalanceKey, u128),
    Allowance(AllowanceKey, u128),
    SessionCredit(CreditKey, u128),
}

#[derive(Debug, Default)]
struct LedgerState {
    balances: HashMap<BalanceKey, u128>,
    allowances: HashMap<AllowanceKey, u128>,
    session_credits: HashMap<CreditKey, u128>,
    rejecting: HashSet<BalanceKey>,
    journal: Vec<JournalEntry>,
    open_checkpoints: usize,
    unit: Option<OwnedMutexGuard<()>>,
}

impl LedgerState {
    fn balance(&self, holder: &Address, token: &Token) -> u128 {
        self.balances
            .get(&(holder.clone(), token.clone()))
            .copied()
            .unwrap_or_default()
    }

    fn set_balance(&mut self, key: BalanceKey, value: u128) {
        let previous = self.balances.insert(key.clone(), value).unwrap_or_default();
        if self.open_checkpoints > 0 {
            self.journal.push(JournalEntry::Balance(key, previous));
        }
    }

    fn set_allowance(&mut self, key: AllowanceKey, value: u128) {
        let previous = self.allowances.insert(key.clone(), value).unwrap_or_default();
        if self.open_checkpoints > 0 {
            self.journal.push(JournalEntry::Allowance(key, previous));
        }
    }

    fn add_session_credit(&mut self, key: CreditKey, amount: u128) {
        let previous = self.session_credits.get(&key).copied().unwrap_or_default();
        self.session_credits
            .insert(key.clone(), previous.saturating_add(amount));
        if self.open_checkpoints > 0 {
            self.journal.push(JournalEntry::SessionCredit(key, previous));
        }
    }

    /// Closing the outermost checkpoint drops the journal and lets queued
    /// writers in.
    fn close_checkpoint(&mut self) {
        self.open_checkpoints -= 1;
        if self.open_checkpoints == 0 {
            self.journal.clear();
            self.unit = None;
        }
    }

    fn undo(&mut self, entry: JournalEntry) {
        match entry {
            JournalEntry::Balance(key, previous) => {
                self.balances.insert(key, previous);
            }
            JournalEntry::Allowance(key, previous) => {
                self.allowances.insert(key, previous);
            }
            JournalEntry::SessionCredit(key, previous) => {
                self.session_credits.insert(key, previous);
            }
        }
    }

    fn move_funds(&mut self, transfer: &Transfer) -> std::result::Result<(), LedgerError> {
        let Transfer {
            from,
            to,
            token,
            amount,
            session,
        } = transfer;

        if self.rejecting.contains(&(to.clone(), token.clone())) {
            return Err(LedgerError::TransferRejected {
                recipient: to.clone(),
                token: token.clone(),
            });
        }

        let available = self.balance(from, token);
        let remaining = available
            .checked_sub(*amount)
            .ok_or_else(|| LedgerError::InsufficientBalance {
                holder: from.clone(),
                token: token.clone(),
                available,
                required: *amount,
            })?;
        if from != to {
            let credited = self
                .balance(to, token)
                .checked_add(*amount)
                .ok_or_else(|| LedgerError::BalanceOverflow {
                    holder: to.clone(),
                    token: token.clone(),
                })?;
            self.set_balance((from.clone(), token.clone()), remaining);
            self.set_balance((to.clone(), token.clone()), credited);
        }

        if let Some(session) = session {
            self.add_session_credit((*session, to.clone(), token.clone()), *amount);
        }

        trace!(%from, %to, %token, amount, "transfer");
        Ok(())
    }
}

/// One row of a ledger dump.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BalanceRow {
    pub holder: Address,
    pub token: Token,
    pub balance: u128,
}

/// A thread-safe, journaled in-memory token ledger.
///
/// Uses `Arc<RwLock<..>>` so clones share state; the lock is never held
/// across an `.await`, which lets a router move funds while the controller
/// is waiting on it. `gate` is held for as long as a unit of work is open;
/// writers outside the unit queue on it.
#[derive(Default, Clone)]
pub struct InMemoryLedger {
    state: Arc<RwLock<LedgerState>>,
    gate: Arc<Mutex<()>>,
}

impl InMemoryLedger {
    /// Creates a new, empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Write access to the state. Callers outside the open unit of work
    /// first wait for the gate.
    async fn write(&self) -> (Option<MutexGuard<'_, ()>>, RwLockWriteGuard<'_, LedgerState>) {
        let gate = match UNIT_OF_WORK.try_with(|_| ()) {
            Ok(()) => None,
            Err(_) => Some(self.gate.lock().await),
        };
        (gate, self.state.write().await)
    }

    /// Credits `amount` out of thin air. Used to fund a fresh world.
    pub async fn mint(&self, holder: &Address, token: &Token, amount: u128) -> Result<()> {
        let (_gate, mut state) = self.write().await;
        let balance = state
            .balance(holder, token)
            .checked_add(amount)
            .ok_or_else(|| LedgerError::BalanceOverflow {
                holder: holder.clone(),
                token: token.clone(),
            })?;
        state.set_balance((holder.clone(), token.clone()), balance);
        debug!(%holder, %token, amount, "minted");
        Ok(())
    }

    /// Makes every later transfer of `token` to `recipient` fail, the way a
    /// non-compliant token or a contract without a receive hook would.
    pub async fn reject_transfers_to(&self, recipient: &Address, token: &Token) {
        let (_gate, mut state) = self.write().await;
        state.rejecting.insert((recipient.clone(), token.clone()));
    }

    /// All non-zero balances, ordered by holder then token.
    pub async fn balances(&self) -> Vec<BalanceRow> {
        let state = self.state.read().await;
        let mut rows: Vec<BalanceRow> = state
            .balances
            .iter()
            .filter(|(_, balance)| **balance > 0)
            .map(|((holder, token), balance)| BalanceRow {
                holder: holder.clone(),
                token: token.clone(),
                balance: *balance,
            })
            .collect();
        rows.sort_by(|a, b| (&a.holder, &a.token).cmp(&(&b.holder, &b.token)));
        rows
    }
}

#[async_trait]
impl TokenLedger for InMemoryLedger {
    async fn balance_of(&self, holder: &Address, token: &Token) -> Result<u128> {
        let state = self.state.read().await;
        Ok(state.balance(holder, token))
    }

    async fn transfer(&self, transfer: Transfer) -> Result<()> {
        if transfer.token.is_native() {
            return Err(LedgerError::NativeViaTokenPrimitive.into());
        }
        let (_gate, mut state) = self.write().await;
        Ok(state.move_funds(&transfer)?)
    }

    async fn transfer_native(&self, transfer: Transfer) -> Result<()> {
        if !transfer.token.is_native() {
            return Err(LedgerError::NotNative(transfer.token).into());
        }
        let (_gate, mut state) = self.write().await;
        Ok(state.move_funds(&transfer)?)
    }

    async fn approve(&self, owner: &Address, spender: &Address, token: &Token, amount: u128) -> Result<()> {
        if token.is_native() {
            return Err(LedgerError::NativeViaTokenPrimitive.into());
        }
        let (_gate, mut state) = self.write().await;
        state.set_allowance((owner.clone(), spender.clone(), token.clone()), amount);
        trace!(%owner, %spender, %token, amount, "approve");
        Ok(())
    }

    async fn allowance(&self, owner: &Address, spender: &Address, token: &Token) -> Result<u128> {
        let state = self.state.read().await;
        Ok(state
            .allowances
            .get(&(owner.clone(), spender.clone(), token.clone()))
            .copied()
            .unwrap_or_default())
    }

    async fn transfer_from(&self, spender: &Address, transfer: Transfer) -> Result<()> {
        if transfer.token.is_native() {
            return Err(LedgerError::NativeViaTokenPrimitive.into());
        }
        let (_gate, mut state) = self.write().await;
        let key = (
            transfer.from.clone(),
            spender.clone(),
            transfer.token.clone(),
        );
        let allowed = state.allowances.get(&key).copied().unwrap_or_default();
        let remaining = allowed
            .checked_sub(transfer.amount)
            .ok_or_else(|| LedgerError::InsufficientAllowance {
                owner: transfer.from.clone(),
                spender: spender.clone(),
                token: transfer.token.clone(),
                allowed,
                required: transfer.amount,
            })?;
        state.move_funds(&transfer)?;
        state.set_allowance(key, remaining);
        Ok(())
    }

    async fn session_credit(&self, session: SessionId, holder: &Address, token: &Token) -> Result<u128> {
        let state = self.state.read().await;
        Ok(state
            .session_credits
            .get(&(session, holder.clone(), token.clone()))
            .copied()
            .unwrap_or_default())
    }

    async fn checkpoint(&self) -> Result<Checkpoint> {
        // a checkpoint taken inside an open unit nests in it
        let unit = match UNIT_OF_WORK.try_with(|_| ()) {
            Ok(()) => None,
            Err(_) => Some(Arc::clone(&self.gate).lock_owned().await),
        };
        let mut state = self.state.write().await;
        if unit.is_some() {
            state.unit = unit;
        }
        state.open_checkpoints += 1;
        Ok(Checkpoint(state.journal.len()))
    }

    async fn revert_to(&self, checkpoint: Checkpoint) -> Result<()> {
        let mut state = self.state.write().await;
        if state.open_checkpoints == 0 || checkpoint.0 > state.journal.len() {
            return Err(LedgerError::UnknownCheckpoint(checkpoint.0).into());
        }
        let undone = state.journal.len() - checkpoint.0;
        while state.journal.len() > checkpoint.0 {
            if let Some(entry) = state.journal.pop() {
                state.undo(entry);
            }
        }
        state.close_checkpoint();
        debug!(checkpoint = checkpoint.0, undone, "ledger reverted");
        Ok(())
    }

    async fn commit(&self, checkpoint: Checkpoint) -> Result<()> {
        let mut state = self.state.write().await;
        if state.open_checkpoints == 0 || checkpoint.0 > state.journal.len() {
            return Err(LedgerError::UnknownCheckpoint(checkpoint.0).into());
        }
        state.close_checkpoint();
        Ok(())
    }
}
