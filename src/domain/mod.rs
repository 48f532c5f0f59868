//! Core domain types and logic.

pub mod transaction;
pub mod position;
pub mod matching;
pub mod metrics;
pub mod series;
pub mod analysis;
pub mod config_validation;
pub mod error;
