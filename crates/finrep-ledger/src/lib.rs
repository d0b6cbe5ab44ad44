//! Journal-entry storage and aggregation.
//!
//! This crate defines the read-side contract the report engine computes
//! against: the [`LedgerStore`] trait with its three capabilities
//! (aggregate, list, resolve rates), the [`Domain`] and [`EntryFilter`]
//! entry-selection types, the piecewise-constant [`RateTable`], and the
//! in-memory [`MemoryLedger`] reference implementation.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod domain;
pub mod error;
pub mod rates;
pub mod store;

pub use domain::{Domain, EntryFilter};
pub use error::LedgerError;
pub use rates::{RateEntry, RateTable};
pub use store::{DateBounds, LedgerSnapshot, LedgerStore, MemoryLedger};
