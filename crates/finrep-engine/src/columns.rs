//! Column and period building.
//!
//! An options snapshot expands into an ordered list of [`ColumnGroup`]s,
//! one per (period, semantic) pair, and a list of [`CellSpec`]s mapping
//! every rendered cell onto its group and aggregate field. Balance-chain
//! reports wrap each period's declared columns between an initial and an
//! end balance group; other reports emit movement groups only.

use finrep_core::{AggregateField, CompanyId, DateRange, InternedStr};
use serde::{Deserialize, Serialize};

use crate::options::{Comparison, ComparisonFilter, Options, PeriodOrder};

/// What slice of time a column group aggregates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnSemantic {
    /// Activity within the period.
    Movement,
    /// Balance carried into the period start.
    Initial,
    /// Balance as of the period end.
    End,
}

/// One aggregation target: a period, a company set, a display currency,
/// and a semantic. Hash-stable so the aggregator can key its cache on it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ColumnGroup {
    /// The period.
    pub range: DateRange,
    /// Companies aggregated together.
    pub companies: Vec<CompanyId>,
    /// Conversion target, `None` for raw company-currency sums.
    pub currency: Option<InternedStr>,
    /// Time-slice semantic.
    pub semantic: ColumnSemantic,
}

/// A column a report definition declares.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    /// Column header.
    pub name: String,
    /// Which aggregate field the column shows.
    pub field: AggregateField,
    /// Render this column's computed zeros as blank cells.
    #[serde(default)]
    pub blank_if_zero: bool,
}

impl ColumnSpec {
    /// A column showing `field` under `name`.
    #[must_use]
    pub fn new(name: impl Into<String>, field: AggregateField) -> Self {
        Self {
            name: name.into(),
            field,
            blank_if_zero: false,
        }
    }

    /// Blank this column's computed zeros.
    #[must_use]
    pub const fn with_blank_if_zero(mut self) -> Self {
        self.blank_if_zero = true;
        self
    }
}

/// One rendered cell position: a group index plus the field shown there.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellSpec {
    /// Index into [`ColumnPlan::groups`].
    pub group: usize,
    /// The aggregate field rendered in the cell.
    pub field: AggregateField,
    /// Column header.
    pub label: String,
    /// Blank computed zeros in this cell.
    pub blank_if_zero: bool,
}

/// The full column layout of one render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnPlan {
    /// The base reporting period.
    pub base: DateRange,
    /// Distinct aggregation targets.
    pub groups: Vec<ColumnGroup>,
    /// Rendered cells, in display order.
    pub cells: Vec<CellSpec>,
}

impl ColumnPlan {
    /// Build the layout for an options snapshot.
    #[must_use]
    pub fn build(options: &Options, columns: &[ColumnSpec], balance_chain: bool) -> Self {
        let currency = options.currency.target().cloned();
        let mut groups = Vec::new();
        let mut cells = Vec::new();

        for range in periods(options.date, &options.comparison) {
            let group_for = |semantic| ColumnGroup {
                range,
                companies: options.companies.clone(),
                currency: currency.clone(),
                semantic,
            };

            if balance_chain {
                groups.push(group_for(ColumnSemantic::Initial));
                cells.push(CellSpec {
                    group: groups.len() - 1,
                    field: AggregateField::Balance,
                    label: "Initial Balance".to_string(),
                    blank_if_zero: false,
                });
            }

            groups.push(group_for(ColumnSemantic::Movement));
            let movement = groups.len() - 1;
            for spec in columns {
                cells.push(CellSpec {
                    group: movement,
                    field: spec.field,
                    label: spec.name.clone(),
                    blank_if_zero: spec.blank_if_zero,
                });
            }

            if balance_chain {
                groups.push(group_for(ColumnSemantic::End));
                cells.push(CellSpec {
                    group: groups.len() - 1,
                    field: AggregateField::Balance,
                    label: "End Balance".to_string(),
                    blank_if_zero: false,
                });
            }
        }

        Self {
            base: options.date,
            groups,
            cells,
        }
    }

    /// The movement group of the base period, used for detail lines.
    #[must_use]
    pub fn base_movement(&self) -> Option<&ColumnGroup> {
        self.groups
            .iter()
            .find(|group| group.semantic == ColumnSemantic::Movement && group.range == self.base)
    }
}

/// The ordered reporting periods an options snapshot asks for.
#[must_use]
pub fn periods(date: DateRange, comparison: &Comparison) -> Vec<DateRange> {
    let mut ranges = vec![date];
    match &comparison.filter {
        ComparisonFilter::NoComparison => {}
        ComparisonFilter::PreviousPeriod => {
            let mut cursor = date;
            for _ in 0..comparison.number_period {
                cursor = cursor.preceding();
                ranges.push(cursor);
            }
        }
        ComparisonFilter::PreviousFiscalYear | ComparisonFilter::SameLastYear => {
            let mut cursor = date;
            for _ in 0..comparison.number_period {
                cursor = cursor.previous_year();
                ranges.push(cursor);
            }
        }
        ComparisonFilter::Custom(extra) => ranges.extend(extra.iter().copied()),
    }
    if comparison.period_order == PeriodOrder::Ascending {
        ranges.reverse();
    }
    ranges
}
