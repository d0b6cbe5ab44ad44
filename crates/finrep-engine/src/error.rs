//! Engine error types.
//!
//! Definition problems are caught at load time and never surface during a
//! render; options problems abort the render before any aggregation runs;
//! store failures fail the whole render as one error.

use finrep_core::InternedStr;
use finrep_ledger::LedgerError;
use thiserror::Error;

use crate::definition::LineDefId;

/// A report definition failed load-time validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DefinitionError {
    /// Two lines declare the same code.
    #[error("duplicate line code '{0}'")]
    DuplicateCode(InternedStr),
    /// A formula references a code no line declares.
    #[error("line {line} references undefined code '{code}'")]
    UnknownCode {
        /// The line carrying the formula.
        line: LineDefId,
        /// The unresolved code.
        code: InternedStr,
    },
    /// The formula dependency graph has a cycle.
    #[error("formula cycle through line code '{0}'")]
    Cycle(InternedStr),
    /// A line names a parent that does not exist.
    #[error("line {0} has an unknown parent")]
    OrphanParent(LineDefId),
}

/// Render options failed validation; the render aborts wholesale.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OptionsError {
    /// `date.from` exceeds `date.to`.
    #[error("inconsistent date range: {from} is after {to}")]
    InconsistentDates {
        /// Requested start.
        from: chrono::NaiveDate,
        /// Requested end.
        to: chrono::NaiveDate,
    },
    /// A journal filter names a journal the ledger does not know.
    #[error("unknown journal '{0}'")]
    UnknownJournal(InternedStr),
    /// The resolved company selection is empty.
    #[error("no companies selected")]
    NoCompanies,
    /// The selected horizontal group does not exist.
    #[error("unknown horizontal group {0}")]
    UnknownHorizontalGroup(u32),
}

/// A render failed.
#[derive(Debug, Clone, Error)]
pub enum EngineError {
    /// The backing store failed while aggregating.
    #[error("aggregation failed: {0}")]
    Aggregation(#[from] LedgerError),
    /// The options snapshot was rejected.
    #[error(transparent)]
    Options(#[from] OptionsError),
    /// The definition was rejected at load.
    #[error(transparent)]
    Definition(#[from] DefinitionError),
}
