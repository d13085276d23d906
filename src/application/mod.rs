//! Application layer containing the swap orchestration.
//!
//! `SwapController` is the entry point: it owns the escrow book and the
//! single-flight guard and drives each request through the ledger and router
//! ports as one atomic unit.

pub mod controller;
pub mod escrow;
pub mod guard;
