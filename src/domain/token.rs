use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

/// Sentinel address conventionally used for the chain's native currency.
pub const NATIVE_SENTINEL: &str = "0xeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeee";

/// Identity of a ledger participant: a user, a referrer, the controller or the router.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(String);

impl Address {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Address {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// A fungible asset held on the ledger.
///
/// `Native` stands for the chain's native currency. It is moved with the
/// native transfer primitive and can never be approved for pulling.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Token {
    Native,
    Contract(Address),
}

impl Token {
    /// Parses `address` like any other token name, so the native sentinels
    /// still come back as `Token::Native`.
    pub fn contract(address: impl Into<String>) -> Self {
        Token::from(address.into())
    }

    pub fn is_native(&self) -> bool {
        matches!(self, Token::Native)
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Native => f.write_str("native"),
            Token::Contract(address) => address.fmt(f),
        }
    }
}

impl FromStr for Token {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.eq_ignore_ascii_case("native") || trimmed.eq_ignore_ascii_case(NATIVE_SENTINEL) {
            Ok(Token::Native)
        } else {
            Ok(Token::Contract(Address::from(trimmed)))
        }
    }
}

impl From<String> for Token {
    fn from(value: String) -> Self {
        match value.parse() {
            Ok(token) => token,
            Err(never) => match never {},
        }
    }
}

impl From<Token> for String {
    fn from(token: Token) -> Self {
        token.to_string()
    }
}
