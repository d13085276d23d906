use super::escrow::{EscrowBook, SessionRecord};
use super::guard::SingleFlight;
use crate::domain::commission::{CommissionConfig, CommissionLedger, PayoutLeg};
use crate::domain::fees;
use crate::domain::ports::{
    Checkpoint, RouterOrder, SharedLedger, SharedRouter, Transfer, UNIT_OF_WORK,
};
use crate::domain::swap::{
    OrderSwap, Route, SessionId, Settlement, SwapRequest, SwapState, TokenSwap,
};
use crate::domain::token::{Address, Token};
use crate::error::{Result, SwapError};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument, warn};

/// Custody and forwarding controller.
///
/// Holds callers' deposits, takes the referral commission out of each swap,
/// hands the rest to the external router and pays the proceeds back. Every
/// swap runs inside one ledger unit of work: it either settles completely or
/// leaves no trace.
///
/// Custody-mutating calls run on their own task. Dropping the future a caller
/// awaits (a timeout, an aborted request) does not interrupt the work; it
/// still commits or rolls back, and the controller stays busy until it has.
pub struct SwapController {
    core: Arc<Core>,
}

struct Core {
    address: Address,
    config: CommissionConfig,
    commissions: CommissionLedger,
    ledger: SharedLedger,
    router: SharedRouter,
    escrow: Mutex<EscrowBook>,
    flight: SingleFlight,
}

impl SwapController {
    /// Creates a controller living at `address` on `ledger`.
    ///
    /// # Arguments
    ///
    /// * `config` - Validated commission configuration.
    /// * `router` - Must be the router named by `config.external_router`.
    pub fn new(
        address: Address,
        config: CommissionConfig,
        ledger: SharedLedger,
        router: SharedRouter,
    ) -> Result<Self> {
        if router.address() != &config.external_router {
            return Err(SwapError::InvalidConfiguration(format!(
                "router at {} does not match configured external router {}",
                router.address(),
                config.external_router
            )));
        }
        let core = Core {
            address,
            commissions: CommissionLedger::new(&config),
            config,
            ledger,
            router,
            escrow: Mutex::new(EscrowBook::new()),
            flight: SingleFlight::new(),
        };
        Ok(Self {
            core: Arc::new(core),
        })
    }

    pub fn address(&self) -> &Address {
        &self.core.address
    }

    pub fn config(&self) -> &CommissionConfig {
        &self.core.config
    }

    /// Whether a custody-mutating call is still running.
    pub fn is_busy(&self) -> bool {
        self.core.flight.is_busy()
    }

    /// Funds `caller` has deposited and not yet swapped or withdrawn.
    pub async fn custody_of(&self, caller: &Address, token: &Token) -> u128 {
        self.core.escrow.lock().await.custody_of(caller, token)
    }

    pub async fn session(&self, id: SessionId) -> Option<SessionRecord> {
        self.core.escrow.lock().await.session(id).cloned()
    }

    /// Moves `amount` from the caller into the controller's custody.
    pub async fn deposit(&self, caller: &Address, token: &Token, amount: u128) -> Result<()> {
        let (caller, token) = (caller.clone(), token.clone());
        self.detached(move |core| async move { core.deposit(&caller, &token, amount).await })
            .await
    }

    /// Returns undrawn custody to its owner.
    pub async fn withdraw(&self, caller: &Address, token: &Token, amount: u128) -> Result<()> {
        let (caller, token) = (caller.clone(), token.clone());
        self.detached(move |core| async move { core.withdraw(&caller, &token, amount).await })
            .await
    }

    /// Swaps deposited funds along a single route.
    pub async fn perform_token_swap(&self, caller: &Address, swap: TokenSwap) -> Result<Settlement> {
        let caller = caller.clone();
        self.detached(move |core| async move { core.execute(&caller, swap.into()).await })
            .await
    }

    /// Swaps deposited funds split over the order's weighted routes.
    pub async fn perform_order_swap(&self, caller: &Address, order: OrderSwap) -> Result<Settlement> {
        debug!(order_id = order.order_id, routes = order.request.routes.len(), "order swap");
        let caller = caller.clone();
        self.detached(move |core| async move { core.execute(&caller, order.request).await })
            .await
    }

    /// Takes the flight guard and runs `work` on its own task until it finishes.
    async fn detached<T, F, Fut>(&self, work: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(Arc<Core>) -> Fut,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let flight = self.core.flight.acquire()?;
        let work = work(Arc::clone(&self.core));
        tokio::spawn(async move {
            let _flight = flight;
            work.await
        })
        .await?
    }
}

impl Core {
    #[instrument(skip(self), fields(controller = %self.address))]
    async fn deposit(&self, caller: &Address, token: &Token, amount: u128) -> Result<()> {
        if amount == 0 {
            return Err(SwapError::InvalidAmount("deposit must be positive".to_string()));
        }

        let checkpoint = self.ledger.checkpoint().await?;
        let transfer = Transfer::new(caller.clone(), self.address.clone(), token.clone(), amount);
        let booked = UNIT_OF_WORK
            .scope(checkpoint, async {
                self.send(transfer).await?;
                self.escrow.lock().await.credit(caller, token, amount)
            })
            .await;
        match booked {
            Ok(()) => {
                self.ledger.commit(checkpoint).await?;
                debug!(amount, "deposit booked");
                Ok(())
            }
            Err(cause) => match self.ledger.revert_to(checkpoint).await {
                Ok(()) => Err(cause),
                Err(rollback) => Err(rollback_failed(cause, rollback)),
            },
        }
    }

    #[instrument(skip(self), fields(controller = %self.address))]
    async fn withdraw(&self, caller: &Address, token: &Token, amount: u128) -> Result<()> {
        if amount == 0 {
            return Err(SwapError::InvalidAmount("withdrawal must be positive".to_string()));
        }

        self.escrow.lock().await.debit(caller, token, amount)?;
        let transfer = Transfer::new(self.address.clone(), caller.clone(), token.clone(), amount);
        if let Err(e) = self.send(transfer).await {
            self.escrow.lock().await.credit(caller, token, amount)?;
            return Err(e);
        }
        debug!(amount, "withdrawal paid");
        Ok(())
    }

    /// Runs one request as an atomic unit.
    async fn execute(&self, caller: &Address, request: SwapRequest) -> Result<Settlement> {
        request.validate()?;

        let session = self
            .escrow
            .lock()
            .await
            .open_session(caller, &request.from_token);
        let checkpoint = self.ledger.checkpoint().await?;

        let outcome = UNIT_OF_WORK
            .scope(checkpoint, self.run(caller, session, &request))
            .await;
        match outcome {
            Ok(settlement) => {
                self.ledger.commit(checkpoint).await?;
                self.escrow.lock().await.advance(session, SwapState::Settled)?;
                info!(
                    %session,
                    caller = %settlement.caller,
                    from_token = %settlement.from_token,
                    to_token = %settlement.to_token,
                    gross = settlement.gross_amount,
                    commission1 = settlement.commission1,
                    commission2 = settlement.commission2,
                    output = settlement.output,
                    "swap settled"
                );
                Ok(settlement)
            }
            Err(cause) => Err(self.roll_back(caller, session, checkpoint, cause).await),
        }
    }

    /// Refunds the session's escrow, then undoes the unit on the ledger.
    async fn roll_back(
        &self,
        caller: &Address,
        session: SessionId,
        checkpoint: Checkpoint,
        cause: SwapError,
    ) -> SwapError {
        let refunded = self.escrow.lock().await.fail(session);
        let reverted = self.ledger.revert_to(checkpoint).await;
        match refunded.and(reverted) {
            Ok(()) => {
                warn!(%session, %caller, error = %cause, "swap rolled back");
                cause
            }
            Err(rollback) => {
                error!(%session, %caller, error = %cause, %rollback, "swap rollback failed");
                rollback_failed(cause, rollback)
            }
        }
    }

    #[instrument(skip(self, request), fields(gross = request.gross_amount))]
    async fn run(&self, caller: &Address, session: SessionId, request: &SwapRequest) -> Result<Settlement> {
        let from = &request.from_token;
        let gross = request.gross_amount;

        // Idle -> ReceivedGross
        let held = self.ledger.balance_of(&self.address, from).await?;
        if held < gross {
            return Err(SwapError::InsufficientCustody {
                caller: caller.clone(),
                token: from.clone(),
                available: held,
                required: gross,
            });
        }
        self.escrow.lock().await.take_gross(session, gross)?;

        // ReceivedGross -> CommissionDeducted
        let split = self.commissions.split(gross)?;
        let leg = if request.is_native_commission {
            PayoutLeg::Native
        } else {
            PayoutLeg::Token
        };
        let (referrer1, referrer2) = self.commissions.referrers();
        for (payee, amount) in [(referrer1, split.commission1), (referrer2, split.commission2)] {
            self.commissions
                .payout(self.ledger.as_ref(), &self.address, from, amount, payee, leg)
                .await?;
            self.escrow.lock().await.release(session, amount)?;
        }
        self.escrow
            .lock()
            .await
            .advance(session, SwapState::CommissionDeducted)?;

        // CommissionDeducted -> Forwarded
        let legs = request.leg_amounts(split.net)?;
        let leg_min_return = if request.routes.len() == 1 {
            request.min_return
        } else {
            0
        };
        let mut reported: u128 = 0;
        let mut forwarded: u128 = 0;
        for (route, amount) in request.routes.iter().zip(legs) {
            if amount == 0 {
                continue;
            }
            let (pulled, output) = self
                .forward(session, request, route, amount, leg_min_return)
                .await?;
            reported = reported.saturating_add(output);
            forwarded = forwarded.saturating_add(pulled);
            self.escrow.lock().await.release(session, pulled)?;
        }
        if !from.is_native() {
            self.ledger
                .approve(&self.address, &self.config.token_approval_target, from, 0)
                .await?;
        }
        // what the router actually took must match an independent recomputation of net
        let dust = fees::reconcile(gross, self.commissions.rates(), forwarded)?;
        if dust != 0 {
            return Err(SwapError::ReconciliationMismatch { dust });
        }
        self.escrow.lock().await.advance(session, SwapState::Forwarded)?;

        // Forwarded -> Settled
        let output = self
            .ledger
            .session_credit(session, &self.address, &request.to_token)
            .await?;
        if output != reported {
            warn!(%session, reported, credited = output, "router receipt disagrees with ledger");
        }
        if output < request.min_return {
            return Err(SwapError::SlippageExceeded {
                received: output,
                min_return: request.min_return,
            });
        }
        self.send(Transfer::new(
            self.address.clone(),
            caller.clone(),
            request.to_token.clone(),
            output,
        ))
        .await?;

        Ok(Settlement {
            session,
            caller: caller.clone(),
            from_token: from.clone(),
            to_token: request.to_token.clone(),
            gross_amount: gross,
            commission1: split.commission1,
            commission2: split.commission2,
            output,
        })
    }

    /// Hands one leg to the router.
    ///
    /// Returns how much of the leg the router actually took and the output
    /// it reports. Native legs are sent with the call, so all of it is taken;
    /// token legs are measured by the allowance the router consumed.
    async fn forward(
        &self,
        session: SessionId,
        request: &SwapRequest,
        route: &Route,
        amount: u128,
        min_return: u128,
    ) -> Result<(u128, u128)> {
        let from = &request.from_token;
        let target = &self.config.token_approval_target;
        if from.is_native() {
            let value = Transfer::new(
                self.address.clone(),
                self.router.address().clone(),
                Token::Native,
                amount,
            )
            .tagged(session);
            self.ledger.transfer_native(value).await?;
        } else {
            self.ledger.approve(&self.address, target, from, 0).await?;
            self.ledger.approve(&self.address, target, from, amount).await?;
        }

        let order = RouterOrder {
            session,
            recipient: self.address.clone(),
            from_token: from.clone(),
            to_token: request.to_token.clone(),
            amount,
            min_return,
            execution_target: route.execution_target.clone(),
            pool: route.pool.clone(),
        };
        let receipt = self
            .router
            .execute(order)
            .await
            .map_err(|failure| SwapError::RouterExecutionFailed(failure.to_string()))?;

        let pulled = if from.is_native() {
            amount
        } else {
            let unused = self.ledger.allowance(&self.address, target, from).await?;
            amount.saturating_sub(unused)
        };
        debug!(%session, amount, pulled, output = receipt.output, target = %route.execution_target, "leg forwarded");
        Ok((pulled, receipt.output))
    }

    /// Moves funds with whichever primitive the token needs.
    async fn send(&self, transfer: Transfer) -> Result<()> {
        if transfer.token.is_native() {
            self.ledger.transfer_native(transfer).await
        } else {
            self.ledger.transfer(transfer).await
        }
    }
}

fn rollback_failed(cause: SwapError, rollback: SwapError) -> SwapError {
    SwapError::RollbackFailed {
        cause: Box::new(cause),
        rollback: Box::new(rollback),
    }
}
