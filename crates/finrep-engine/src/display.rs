//! Materialized display lines.
//!
//! The engine's only output shape: a flat ordered list of lines with
//! explicit nesting levels, fresh per render and serde serializable so a
//! re-render with unchanged inputs is byte-identical.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use finrep_core::InternedStr;

use crate::lineid::GenericLineId;

/// One rendered column value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayCell {
    /// The rendered value, `None` when the cell is empty or blanked.
    pub value: Option<Decimal>,
    /// Whether the computed value is exactly zero, even when blanked.
    pub is_zero: bool,
    /// Display currency of the value, when one applies.
    pub currency: Option<InternedStr>,
}

impl DisplayCell {
    /// A cell with no value at all.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            value: None,
            is_zero: true,
            currency: None,
        }
    }

    /// A computed cell; `blank_if_zero` nulls the rendered value of a
    /// zero without hiding the computed fact.
    #[must_use]
    pub fn of(value: Decimal, currency: Option<InternedStr>, blank_if_zero: bool) -> Self {
        let is_zero = value.is_zero();
        Self {
            value: if blank_if_zero && is_zero {
                None
            } else {
                Some(value)
            },
            is_zero,
            currency,
        }
    }
}

/// One line of a rendered report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayLine {
    /// Encoded generic line id.
    pub id: String,
    /// Display label.
    pub name: String,
    /// Nesting depth, root lines at 0.
    pub level: u32,
    /// Whether the line can be unfolded into children.
    pub unfoldable: bool,
    /// Whether the line is unfolded in this render.
    pub unfolded: bool,
    /// The group-by key the line expands under, when it has one.
    pub groupby: Option<String>,
    /// Progressive running balance, for detail lines that carry one.
    pub progress: Option<String>,
    /// Offset of the line within its expansion, for paging.
    pub offset: usize,
    /// Column values, in column order.
    pub columns: Vec<DisplayCell>,
}

impl DisplayLine {
    /// A line with everything but identity defaulted.
    #[must_use]
    pub fn new(id: &GenericLineId, name: impl Into<String>, level: u32) -> Self {
        Self {
            id: id.encode(),
            name: name.into(),
            level,
            unfoldable: false,
            unfolded: false,
            groupby: None,
            progress: None,
            offset: 0,
            columns: Vec::new(),
        }
    }
}
