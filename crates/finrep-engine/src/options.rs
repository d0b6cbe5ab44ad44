//! Render options.
//!
//! An [`Options`] value is an immutable snapshot of every knob a render
//! depends on. Callers never mutate one mid-render; changing a filter
//! means building a new snapshot and rendering again. Validation happens
//! once at construction so the engine can trust the snapshot wholesale.

use std::collections::BTreeSet;

use finrep_core::{CompanyId, DateRange, InternedStr};
use finrep_ledger::EntryFilter;
use serde::{Deserialize, Serialize};

use crate::error::OptionsError;
use crate::lineid::GenericLineId;

/// Default load-more window.
pub const DEFAULT_PAGE_SIZE: usize = 80;

/// Which currency column values are expressed in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CurrencyMode {
    /// Raw sums of company-currency values.
    #[default]
    CompanyCurrency,
    /// Everything converted into one display currency.
    Converted(InternedStr),
}

impl CurrencyMode {
    /// The target currency, when conversion is requested.
    #[must_use]
    pub const fn target(&self) -> Option<&InternedStr> {
        match self {
            Self::CompanyCurrency => None,
            Self::Converted(currency) => Some(currency),
        }
    }
}

/// How comparison periods are derived from the base range.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonFilter {
    /// Base period only.
    #[default]
    NoComparison,
    /// Preceding periods of the same shape.
    PreviousPeriod,
    /// The same span in preceding fiscal years.
    PreviousFiscalYear,
    /// The same calendar span one year earlier, repeated.
    SameLastYear,
    /// Explicitly listed comparison ranges.
    Custom(Vec<DateRange>),
}

/// Ordering of the emitted periods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeriodOrder {
    /// Newest period first.
    #[default]
    Descending,
    /// Oldest period first.
    Ascending,
}

/// The comparison part of an options snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Comparison {
    /// Derivation rule.
    #[serde(default)]
    pub filter: ComparisonFilter,
    /// How many comparison periods to derive.
    #[serde(default = "default_number_period")]
    pub number_period: usize,
    /// Period ordering in the output.
    #[serde(default)]
    pub period_order: PeriodOrder,
}

fn default_number_period() -> usize {
    1
}

impl Default for Comparison {
    fn default() -> Self {
        Self {
            filter: ComparisonFilter::default(),
            number_period: 1,
            period_order: PeriodOrder::default(),
        }
    }
}

/// Identifier of a named company subset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HorizontalGroupId(pub u32);

/// A named subset of the allowed companies, selectable as a whole.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HorizontalGroup {
    /// Stable identifier.
    pub id: HorizontalGroupId,
    /// Display name.
    pub name: String,
    /// Member companies.
    pub companies: Vec<CompanyId>,
}

/// An immutable, validated render-options snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Options {
    /// The base reporting period.
    pub date: DateRange,
    /// Comparison period derivation.
    pub comparison: Comparison,
    /// The resolved company selection, never empty.
    pub companies: Vec<CompanyId>,
    /// Column currency mode.
    pub currency: CurrencyMode,
    /// Unfold every unfoldable line.
    pub unfold_all: bool,
    /// Explicitly unfolded lines.
    pub unfolded_lines: Vec<GenericLineId>,
    /// Load-more window size.
    pub page_size: usize,
    /// Free-text search over labels and partners; narrows buckets only.
    pub filter_search_bar: Option<String>,
    /// Restrict aggregation to these journals. Empty means all.
    pub journals: Vec<InternedStr>,
    /// Nest account buckets under code-prefix headers.
    pub hierarchy: bool,
    /// Export renders ignore pagination entirely.
    pub export_mode: bool,
    /// The horizontal group the company selection came from, if any.
    pub selected_horizontal_group: Option<HorizontalGroupId>,
    /// Render computed zeros as blank cells.
    pub blank_if_zero: bool,
}

impl Options {
    /// Start building a snapshot for a reporting period.
    #[must_use]
    pub fn builder(date: DateRange) -> OptionsBuilder {
        OptionsBuilder::new(date)
    }

    /// The scoping filter every aggregate honors (journals). The search
    /// needle is deliberately absent: search narrows buckets, never
    /// amounts.
    #[must_use]
    pub fn scope_filter(&self) -> EntryFilter {
        let mut filter = EntryFilter::default();
        if !self.journals.is_empty() {
            filter.journals = Some(self.journals.iter().cloned().collect());
        }
        filter
    }

    /// The bucket-narrowing search filter, when a needle is set.
    #[must_use]
    pub fn search_filter(&self) -> Option<EntryFilter> {
        self.filter_search_bar.as_ref().map(|needle| EntryFilter {
            needle: Some(needle.clone()),
            ..EntryFilter::default()
        })
    }

    /// Whether a line renders unfolded.
    #[must_use]
    pub fn is_unfolded(&self, id: &GenericLineId) -> bool {
        self.unfold_all || self.export_mode || self.unfolded_lines.contains(id)
    }

    /// The pagination window, `None` when the render is an export.
    #[must_use]
    pub const fn effective_page_size(&self) -> Option<usize> {
        if self.export_mode {
            None
        } else {
            Some(self.page_size)
        }
    }
}

/// Builder validating an [`Options`] snapshot.
#[derive(Debug, Clone)]
pub struct OptionsBuilder {
    date: DateRange,
    comparison: Comparison,
    companies: Vec<CompanyId>,
    currency: CurrencyMode,
    unfold_all: bool,
    unfolded_lines: Vec<GenericLineId>,
    page_size: usize,
    filter_search_bar: Option<String>,
    journals: Vec<InternedStr>,
    hierarchy: bool,
    export_mode: bool,
    horizontal_groups: Vec<HorizontalGroup>,
    selected_horizontal_group: Option<HorizontalGroupId>,
    blank_if_zero: bool,
    known_journals: Option<BTreeSet<InternedStr>>,
}

impl OptionsBuilder {
    /// Start from a reporting period with everything else defaulted.
    #[must_use]
    pub fn new(date: DateRange) -> Self {
        Self {
            date,
            comparison: Comparison::default(),
            companies: Vec::new(),
            currency: CurrencyMode::default(),
            unfold_all: false,
            unfolded_lines: Vec::new(),
            page_size: DEFAULT_PAGE_SIZE,
            filter_search_bar: None,
            journals: Vec::new(),
            hierarchy: false,
            export_mode: false,
            horizontal_groups: Vec::new(),
            selected_horizontal_group: None,
            blank_if_zero: false,
            known_journals: None,
        }
    }

    /// Set the comparison rule.
    #[must_use]
    pub fn comparison(mut self, comparison: Comparison) -> Self {
        self.comparison = comparison;
        self
    }

    /// Set the company selection.
    #[must_use]
    pub fn companies(mut self, companies: impl IntoIterator<Item = CompanyId>) -> Self {
        self.companies = companies.into_iter().collect();
        self
    }

    /// Set the currency mode.
    #[must_use]
    pub fn currency(mut self, currency: CurrencyMode) -> Self {
        self.currency = currency;
        self
    }

    /// Unfold every unfoldable line.
    #[must_use]
    pub const fn unfold_all(mut self, unfold_all: bool) -> Self {
        self.unfold_all = unfold_all;
        self
    }

    /// Unfold one specific line.
    #[must_use]
    pub fn unfold(mut self, id: GenericLineId) -> Self {
        self.unfolded_lines.push(id);
        self
    }

    /// Set the load-more window.
    #[must_use]
    pub const fn page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    /// Set the search needle.
    #[must_use]
    pub fn search(mut self, needle: impl Into<String>) -> Self {
        self.filter_search_bar = Some(needle.into());
        self
    }

    /// Restrict to these journals.
    #[must_use]
    pub fn journals(mut self, journals: impl IntoIterator<Item = InternedStr>) -> Self {
        self.journals = journals.into_iter().collect();
        self
    }

    /// Nest account buckets under code-prefix headers.
    #[must_use]
    pub const fn hierarchy(mut self, hierarchy: bool) -> Self {
        self.hierarchy = hierarchy;
        self
    }

    /// Render for export: everything unfolded, no pagination.
    #[must_use]
    pub const fn export_mode(mut self, export_mode: bool) -> Self {
        self.export_mode = export_mode;
        self
    }

    /// Declare the available horizontal groups.
    #[must_use]
    pub fn horizontal_groups(mut self, groups: impl IntoIterator<Item = HorizontalGroup>) -> Self {
        self.horizontal_groups = groups.into_iter().collect();
        self
    }

    /// Select a horizontal group as the company subset.
    #[must_use]
    pub const fn select_horizontal_group(mut self, id: HorizontalGroupId) -> Self {
        self.selected_horizontal_group = Some(id);
        self
    }

    /// Render computed zeros as blank cells.
    #[must_use]
    pub const fn blank_if_zero(mut self, blank_if_zero: bool) -> Self {
        self.blank_if_zero = blank_if_zero;
        self
    }

    /// Declare the journals the ledger knows, enabling journal-filter
    /// validation.
    #[must_use]
    pub fn known_journals(mut self, journals: impl IntoIterator<Item = InternedStr>) -> Self {
        self.known_journals = Some(journals.into_iter().collect());
        self
    }

    /// Validate and freeze the snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`OptionsError`] on an inverted date range, an unknown
    /// journal, an unknown horizontal group, or an empty resolved company
    /// selection.
    pub fn build(self) -> Result<Options, OptionsError> {
        if !self.date.is_valid() {
            return Err(OptionsError::InconsistentDates {
                from: self.date.from,
                to: self.date.to,
            });
        }

        if let Some(known) = &self.known_journals {
            for journal in &self.journals {
                if !known.contains(journal) {
                    return Err(OptionsError::UnknownJournal(journal.clone()));
                }
            }
        }

        let companies = match self.selected_horizontal_group {
            Some(id) => {
                let group = self
                    .horizontal_groups
                    .iter()
                    .find(|group| group.id == id)
                    .ok_or(OptionsError::UnknownHorizontalGroup(id.0))?;
                if self.companies.is_empty() {
                    group.companies.clone()
                } else {
                    group
                        .companies
                        .iter()
                        .filter(|company| self.companies.contains(company))
                        .copied()
                        .collect()
                }
            }
            None => self.companies,
        };
        if companies.is_empty() {
            return Err(OptionsError::NoCompanies);
        }

        Ok(Options {
            date: self.date,
            comparison: self.comparison,
            companies,
            currency: self.currency,
            unfold_all: self.unfold_all,
            unfolded_lines: self.unfolded_lines,
            page_size: self.page_size,
            filter_search_bar: self.filter_search_bar,
            journals: self.journals,
            hierarchy: self.hierarchy,
            export_mode: self.export_mode,
            selected_horizontal_group: self.selected_horizontal_group,
            blank_if_zero: self.blank_if_zero,
        })
    }
}
