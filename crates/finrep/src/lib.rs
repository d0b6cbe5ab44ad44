//! Command-line front end for the finrep reporting engine.
//!
//! Loads a ledger snapshot and a report definition from JSON files,
//! renders reports as text tables or JSON, and validates tax returns.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cmd;
pub mod load;
pub mod report;
