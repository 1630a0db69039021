//! The three parties of the exchange.

pub mod mw;
pub mod node;
pub mod ta;
