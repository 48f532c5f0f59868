//! Port traits implemented by adapters.

pub mod config_port;
pub mod report_port;
pub mod transaction_port;
