use crate::domain::fees::floor_div;
use crate::domain::ports::{
    ExternalRouter, RouterFailure, RouterOrder, RouterReceipt, SharedLedger, Transfer,
};
use crate::domain::token::{Address, Token};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, instrument};

/// Output per unit of input, as `floor(amount * numerator / denominator)`.
///
/// Decimal differences between tokens are folded into the ratio: 3000 units
/// of a 6-decimal token per 18-decimal token is `3000 * 10^6 / 10^18`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    pub numerator: u128,
    pub denominator: u128,
}

impl Quote {
    pub fn new(numerator: u128, denominator: u128) -> Self {
        Self {
            numerator,
            denominator,
        }
    }

    pub fn apply(&self, amount: u128) -> Option<u128> {
        floor_div(amount, self.numerator, self.denominator)
    }
}

/// A router that fills every order from its own reserves at a fixed quote.
///
/// Token input is pulled through `spender`'s allowance; native input must
/// already have been sent to the router under the order's session.
pub struct FixedRateRouter {
    address: Address,
    spender: Address,
    ledger: SharedLedger,
    quotes: HashMap<(Token, Token), Quote>,
}

impl FixedRateRouter {
    pub fn new(address: Address, spender: Address, ledger: SharedLedger) -> Self {
        Self {
            address,
            spender,
            ledger,
            quotes: HashMap::new(),
        }
    }

    pub fn with_quote(mut self, from: Token, to: Token, quote: Quote) -> Self {
        self.quotes.insert((from, to), quote);
        self
    }

    async fn collect_input(&self, order: &RouterOrder) -> Result<(), RouterFailure> {
        if order.from_token.is_native() {
            let received = self
                .ledger
                .session_credit(order.session, &self.address, &Token::Native)
                .await
                .map_err(|e| RouterFailure::new(e.to_string()))?;
            if received < order.amount {
                return Err(RouterFailure::new(format!(
                    "expected {} native with the call, got {received}",
                    order.amount
                )));
            }
            return Ok(());
        }

        let pull = Transfer::new(
            order.recipient.clone(),
            self.address.clone(),
            order.from_token.clone(),
            order.amount,
        );
        self.ledger
            .transfer_from(&self.spender, pull)
            .await
            .map_err(|e| RouterFailure::new(e.to_string()))
    }
}

#[async_trait]
impl ExternalRouter for FixedRateRouter {
    fn address(&self) -> &Address {
        &self.address
    }

    #[instrument(skip(self), fields(session = %order.session, pool = %order.pool))]
    async fn execute(&self, order: RouterOrder) -> Result<RouterReceipt, RouterFailure> {
        let quote = self
            .quotes
            .get(&(order.from_token.clone(), order.to_token.clone()))
            .ok_or_else(|| {
                RouterFailure::new(format!(
                    "no pool for {} -> {}",
                    order.from_token, order.to_token
                ))
            })?;
        let output = quote
            .apply(order.amount)
            .ok_or_else(|| RouterFailure::new("quote overflow"))?;
        if output < order.min_return {
            return Err(RouterFailure::new(format!(
                "return amount {output} is below min return {}",
                order.min_return
            )));
        }

        self.collect_input(&order).await?;

        let payout = Transfer::new(
            self.address.clone(),
            order.recipient.clone(),
            order.to_token.clone(),
            output,
        )
        .tagged(order.session);
        let paid = if order.to_token.is_native() {
            self.ledger.transfer_native(payout).await
        } else {
            self.ledger.transfer(payout).await
        };
        paid.map_err(|e| RouterFailure::new(e.to_string()))?;

        debug!(amount = order.amount, output, "order filled");
        Ok(RouterReceipt { output })
    }
}
