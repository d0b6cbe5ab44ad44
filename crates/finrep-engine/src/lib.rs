//! Report materialization over a ledger store.
//!
//! This crate turns a declarative [`ReportDefinition`] plus an
//! [`Options`] snapshot into a flat, ordered list of [`DisplayLine`]s.
//! [`ReportEngine`] owns the render: it validates the definition once,
//! builds a [`ColumnPlan`](columns::ColumnPlan) from the options,
//! resolves every line's aggregates through one cached
//! [`Aggregator`](aggregator::Aggregator), and splices paginated
//! expansion pages from [`Expander`](expand::Expander) under unfolded
//! lines.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod aggregator;
pub mod columns;
pub mod definition;
pub mod display;
pub mod error;
pub mod expand;
pub mod formula;
pub mod lineid;
pub mod materializer;
pub mod options;
pub mod strategy;

pub use columns::{ColumnPlan, ColumnSpec};
pub use definition::{
    LineDefId, LineSource, ReportDefinition, ReportId, ReportLineDefinition, ReportSemantics,
};
pub use display::{DisplayCell, DisplayLine};
pub use error::{DefinitionError, EngineError, OptionsError};
pub use expand::{GroupbyKey, ProgressCursor};
pub use formula::FormulaExpr;
pub use lineid::{GenericLineId, LineIdFrame, Markup};
pub use materializer::ReportEngine;
pub use options::{Options, OptionsBuilder, DEFAULT_PAGE_SIZE};
pub use strategy::{strategy_for, CountryStrategy, GenericStrategy, WholeUnitStrategy};
