//! Domain layer: value types, fee arithmetic and the ports the controller depends on.

pub mod commission;
pub mod fees;
pub mod ports;
pub mod swap;
pub mod token;
