use crate::domain::swap::SessionId;
use crate::domain::token::{Address, Token};
use thiserror::Error;

/// Failures raised by the token ledger port.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("{holder} holds {available} {token}, needs {required}")]
    InsufficientBalance {
        holder: Address,
        token: Token,
        available: u128,
        required: u128,
    },
    #[error("{spender} may pull {allowed} {token} from {owner}, needs {required}")]
    InsufficientAllowance {
        owner: Address,
        spender: Address,
        token: Token,
        allowed: u128,
        required: u128,
    },
    #[error("transfer of {token} to {recipient} rejected")]
    TransferRejected { recipient: Address, token: Token },
    #[error("native transfer primitive used for token {0}")]
    NotNative(Token),
    #[error("native currency cannot move through the token primitive")]
    NativeViaTokenPrimitive,
    #[error("unknown checkpoint {0}")]
    UnknownCheckpoint(usize),
    #[error("balance overflow for {holder} in {token}")]
    BalanceOverflow { holder: Address, token: Token },
}

#[derive(Error, Debug)]
pub enum SwapError {
    #[error("rate1 ({rate1}) + rate2 ({rate2}) must stay below 1000000000 parts per billion")]
    InvalidRateConfiguration { rate1: u64, rate2: u64 },
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("{caller} has {available} {token} in custody, needs {required}")]
    InsufficientCustody {
        caller: Address,
        token: Token,
        available: u128,
        required: u128,
    },
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
    #[error("commission transfer to {payee} failed: {reason}")]
    CommissionTransferFailed { payee: Address, reason: String },
    #[error("slippage exceeded: received {received}, minimum {min_return}")]
    SlippageExceeded { received: u128, min_return: u128 },
    #[error("router execution failed: {0}")]
    RouterExecutionFailed(String),
    #[error("custody left for forwarding is off by {dust} from the computed net amount")]
    ReconciliationMismatch { dust: i128 },
    #[error("a swap is already in flight on this controller")]
    SwapInFlight,
    #[error("{cause}; rolling back failed too: {rollback}")]
    RollbackFailed {
        cause: Box<SwapError>,
        rollback: Box<SwapError>,
    },
    #[error("unknown session {0}")]
    UnknownSession(SessionId),
    #[error("Malformed request: {0}")]
    MalformedRequest(String),
    #[error("swap task aborted: {0}")]
    Aborted(#[from] tokio::task::JoinError),
    #[error("arithmetic overflow in {0}")]
    ArithmeticOverflow(&'static str),
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SwapError>;
