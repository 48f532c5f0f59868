//! Transaction source port trait.

use crate::domain::error::LedgerError;
use crate::domain::transaction::Activity;

/// Source of normalized brokerage activity rows.
pub trait TransactionPort {
    fn load_activities(&self) -> Result<Vec<Activity>, LedgerError>;
}
