use crate::domain::swap::{SessionId, SwapState};
use crate::domain::token::{Address, Token};
use crate::error::{Result, SwapError};
use std::collections::HashMap;

/// Custody held for one swap while it moves through the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRecord {
    pub id: SessionId,
    pub caller: Address,
    pub token: Token,
    /// Gross amount taken out of the caller's escrow.
    pub taken: u128,
    /// Part of `taken` not yet paid out or forwarded.
    pub held: u128,
    pub state: SwapState,
}

/// Who owns which part of the controller's balances.
///
/// Deposits are booked per `(caller, token)`. A swap moves its gross amount
/// out of the caller's entry into a session record, so funds in flight are
/// never confused with another caller's deposits.
#[derive(Debug, Default)]
pub struct EscrowBook {
    deposits: HashMap<(Address, Token), u128>,
    sessions: HashMap<SessionId, SessionRecord>,
    next_session: u64,
}

impl EscrowBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn custody_of(&self, caller: &Address, token: &Token) -> u128 {
        self.deposits
            .get(&(caller.clone(), token.clone()))
            .copied()
            .unwrap_or_default()
    }

    pub fn credit(&mut self, caller: &Address, token: &Token, amount: u128) -> Result<()> {
        let entry = self
            .deposits
            .entry((caller.clone(), token.clone()))
            .or_default();
        *entry = entry
            .checked_add(amount)
            .ok_or(SwapError::ArithmeticOverflow("escrow credit"))?;
        Ok(())
    }

    pub fn debit(&mut self, caller: &Address, token: &Token, amount: u128) -> Result<()> {
        let available = self.custody_of(caller, token);
        if available < amount {
            return Err(SwapError::InsufficientCustody {
                caller: caller.clone(),
                token: token.clone(),
                available,
                required: amount,
            });
        }
        self.deposits
            .insert((caller.clone(), token.clone()), available - amount);
        Ok(())
    }

    pub fn open_session(&mut self, caller: &Address, token: &Token) -> SessionId {
        self.next_session += 1;
        let id = SessionId(self.next_session);
        self.sessions.insert(
            id,
            SessionRecord {
                id,
                caller: caller.clone(),
                token: token.clone(),
                taken: 0,
                held: 0,
                state: SwapState::Idle,
            },
        );
        id
    }

    pub fn session(&self, id: SessionId) -> Option<&SessionRecord> {
        self.sessions.get(&id)
    }

    fn session_mut(&mut self, id: SessionId) -> Result<&mut SessionRecord> {
        self.sessions
            .get_mut(&id)
            .ok_or(SwapError::UnknownSession(id))
    }

    /// Moves `gross` from the caller's deposits into the session.
    pub fn take_gross(&mut self, id: SessionId, gross: u128) -> Result<()> {
        let (caller, token) = {
            let record = self.session_mut(id)?;
            (record.caller.clone(), record.token.clone())
        };
        self.debit(&caller, &token, gross)?;
        let record = self.session_mut(id)?;
        record.taken = gross;
        record.held = gross;
        record.state = SwapState::ReceivedGross;
        Ok(())
    }

    /// Records that `amount` of the session's custody has left the controller.
    pub fn release(&mut self, id: SessionId, amount: u128) -> Result<u128> {
        let record = self.session_mut(id)?;
        record.held = record
            .held
            .checked_sub(amount)
            .ok_or(SwapError::ArithmeticOverflow("escrow release"))?;
        Ok(record.held)
    }

    pub fn advance(&mut self, id: SessionId, state: SwapState) -> Result<u128> {
        let record = self.session_mut(id)?;
        record.state = state;
        Ok(record.held)
    }

    /// Ends a failed session and hands its gross amount back to the caller's deposits.
    pub fn fail(&mut self, id: SessionId) -> Result<()> {
        let (caller, token, taken) = {
            let record = self.session_mut(id)?;
            let refund = (record.caller.clone(), record.token.clone(), record.taken);
            record.taken = 0;
            record.held = 0;
            record.state = SwapState::Failed;
            refund
        };
        self.credit(&caller, &token, taken)
    }
}
