//! lotledger: realized P/L from a brokerage export via FIFO lot matching.
//!
//! Hexagonal architecture: domain logic in [`domain`], port traits in [`ports`],
//! concrete implementations in [`adapters`], command dispatch in [`cli`].

pub mod domain;
pub mod ports;
pub mod adapters;
pub mod cli;
