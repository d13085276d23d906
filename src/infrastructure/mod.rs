//! Concrete adapters for the domain ports: an in-memory token ledger and a
//! fixed-quote router.

pub mod fixed_rate;
pub mod in_memory;
