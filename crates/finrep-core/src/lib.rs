//! Core types for finrep
//!
//! This crate provides the fundamental types used throughout the finrep
//! project:
//!
//! - [`Amount`] - A decimal number with a currency
//! - [`AggregateValues`] - The debit/credit/balance/foreign quadruple
//! - [`JournalEntry`] - One debit/credit line of a posted move
//! - [`Account`] / [`AccountKind`] - Chart-of-accounts entries
//! - [`Company`] / [`TaxUnit`] - Legal entities and joint filers
//! - [`SignedTag`] - Signed tax report tags
//! - [`DateRange`] - Inclusive period arithmetic
//!
//! # Example
//!
//! ```
//! use finrep_core::{AccountId, CompanyId, EntryBuilder};
//! use rust_decimal_macros::dec;
//! use chrono::NaiveDate;
//!
//! let entry = EntryBuilder::new(
//!     1,
//!     NaiveDate::from_ymd_opt(2017, 3, 1).unwrap(),
//!     CompanyId(1),
//!     AccountId(40),
//! )
//! .journal("INV")
//! .debit(dec!(121.00))
//! .build();
//!
//! assert_eq!(entry.balance(), dec!(121.00));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod account;
pub mod amount;
pub mod company;
pub mod entry;
pub mod intern;
pub mod period;
pub mod tag;

pub use account::{Account, AccountId, AccountKind};
pub use amount::{AggregateField, AggregateValues, Amount, UnknownFieldError};
pub use company::{Company, CompanyId, TaxUnit, TaxUnitId};
pub use entry::{Counterpart, EntryBuilder, EntryId, JournalEntry, MoveId};
pub use intern::{InternedStr, StringInterner};
pub use period::DateRange;
pub use tag::{Sign, SignedTag, TagId};

// Re-export commonly used external types
pub use chrono::NaiveDate;
pub use rust_decimal::Decimal;
