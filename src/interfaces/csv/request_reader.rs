use crate::domain::swap::TokenSwap;
use crate::domain::token::{Address, Token};
use crate::error::{Result, SwapError};
use serde::Deserialize;
use std::io::Read;

#[derive(Debug, Deserialize, PartialEq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum RequestKind {
    Deposit,
    Swap,
    Withdraw,
}

/// One row of a request script.
///
/// Deposits and withdrawals only use `caller`, `from_token` and `amount`.
#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct RequestRecord {
    pub op: RequestKind,
    pub caller: Address,
    pub from_token: Token,
    #[serde(default)]
    pub to_token: Option<Token>,
    pub amount: u128,
    #[serde(default)]
    pub min_return: Option<u128>,
    #[serde(default)]
    pub target: Option<Address>,
    #[serde(default)]
    pub native_commission: Option<bool>,
    #[serde(default)]
    pub pool: Option<Address>,
}

impl RequestRecord {
    /// Builds swap parameters from a `swap` row.
    pub fn to_token_swap(&self) -> Result<TokenSwap> {
        let to_token = self.to_token.clone().ok_or_else(|| {
            SwapError::MalformedRequest("swap row is missing to_token".to_string())
        })?;
        let execution_target = self.target.clone().ok_or_else(|| {
            SwapError::MalformedRequest("swap row is missing target".to_string())
        })?;
        Ok(TokenSwap {
            from_token: self.from_token.clone(),
            to_token,
            gross_amount: self.amount,
            min_return: self.min_return.unwrap_or_default(),
            pool: self.pool.clone().unwrap_or_else(|| execution_target.clone()),
            execution_target,
            is_native_commission: self.native_commission.unwrap_or(false),
        })
    }
}

/// Reads requests from a CSV source.
///
/// This reader wraps `csv::Reader` and provides an iterator over `Result<RequestRecord>`.
/// It handles whitespace trimming and flexible record lengths automatically.
pub struct RequestReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> RequestReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Lazily reads and deserializes requests.
    pub fn requests(self) -> impl Iterator<Item = Result<RequestRecord>> {
        self.reader
            .into_deserialize()
            .map(|result| result.map_err(SwapError::from))
    }
}
