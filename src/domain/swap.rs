use super::token::{Address, Token};
use crate::error::{Result, SwapError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies one swap request for the whole of its lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Progress of a request through the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SwapState {
    Idle,
    ReceivedGross,
    CommissionDeducted,
    Forwarded,
    Settled,
    Failed,
}

/// One execution path handed to the external router.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    pub execution_target: Address,
    pub pool: Address,
    pub weight: u32,
}

impl Route {
    pub fn single(execution_target: Address, pool: Address) -> Self {
        Self {
            execution_target,
            pool,
            weight: 1,
        }
    }
}

/// A request to swap funds the caller has already placed in custody.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapRequest {
    pub from_token: Token,
    pub to_token: Token,
    pub gross_amount: u128,
    pub min_return: u128,
    pub routes: Vec<Route>,
    pub is_native_commission: bool,
}

impl SwapRequest {
    /// Rejects requests that cannot move any funds.
    pub fn validate(&self) -> Result<()> {
        if self.gross_amount == 0 {
            return Err(SwapError::InvalidAmount(
                "gross amount must be positive".to_string(),
            ));
        }
        if self.routes.iter().all(|route| route.weight == 0) {
            return Err(SwapError::InvalidAmount(
                "at least one route needs a positive weight".to_string(),
            ));
        }
        Ok(())
    }

    /// Divides `net` across the routes by weight.
    ///
    /// Legs round down and the last weighted route takes the remainder, so the
    /// returned amounts always sum to `net`. Zero-weight routes get nothing.
    pub fn leg_amounts(&self, net: u128) -> Result<Vec<u128>> {
        let total_weight: u128 = self.routes.iter().map(|r| u128::from(r.weight)).sum();
        let last_weighted = self.routes.iter().rposition(|r| r.weight > 0);
        let mut remaining = net;
        let mut legs = Vec::with_capacity(self.routes.len());

        for (index, route) in self.routes.iter().enumerate() {
            let amount = if Some(index) == last_weighted {
                remaining
            } else {
                super::fees::floor_div(net, u128::from(route.weight), total_weight)
                    .ok_or(SwapError::ArithmeticOverflow("route split"))?
            };
            remaining -= amount;
            legs.push(amount);
        }
        Ok(legs)
    }
}

/// Parameters of a single-path swap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenSwap {
    pub from_token: Token,
    pub to_token: Token,
    pub gross_amount: u128,
    pub min_return: u128,
    pub execution_target: Address,
    pub pool: Address,
    pub is_native_commission: bool,
}

impl From<TokenSwap> for SwapRequest {
    fn from(swap: TokenSwap) -> Self {
        Self {
            from_token: swap.from_token,
            to_token: swap.to_token,
            gross_amount: swap.gross_amount,
            min_return: swap.min_return,
            routes: vec![Route::single(swap.execution_target, swap.pool)],
            is_native_commission: swap.is_native_commission,
        }
    }
}

/// An order-routed swap: one gross payment fanned out over weighted routes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderSwap {
    pub order_id: u64,
    pub request: SwapRequest,
}

/// Everything a completed swap moved, emitted once per settled session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Settlement {
    pub session: SessionId,
    pub caller: Address,
    pub from_token: Token,
    pub to_token: Token,
    pub gross_amount: u128,
    pub commission1: u128,
    pub commission2: u128,
    pub output: u128,
}
