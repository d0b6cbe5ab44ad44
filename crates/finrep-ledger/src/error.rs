//! Ledger store error types.

use chrono::NaiveDate;
use finrep_core::{AccountId, CompanyId};
use thiserror::Error;

/// Error returned by ledger store operations.
///
/// Any store failure fails the whole render as one error; the engine
/// never returns a half-rendered tree.
#[derive(Debug, Clone, Error)]
pub enum LedgerError {
    /// The backing store could not be reached.
    #[error("ledger store unavailable: {0}")]
    Unavailable(String),
    /// No exchange rate known for a currency pair at a date.
    #[error("no exchange rate from {from} to {to} on or before {date}")]
    MissingRate {
        /// Source currency.
        from: String,
        /// Target currency.
        to: String,
        /// Conversion date.
        date: NaiveDate,
    },
    /// An entry references an account the store does not know.
    #[error("unknown account {0}")]
    UnknownAccount(AccountId),
    /// An entry references a company the store does not know.
    #[error("unknown company {0}")]
    UnknownCompany(CompanyId),
}
