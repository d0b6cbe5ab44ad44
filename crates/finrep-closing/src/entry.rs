//! Tax returns and the closing entries they produce.

use finrep_core::{AccountId, CompanyId, DateRange, Decimal, EntryId, NaiveDate, TaxUnitId};
use finrep_engine::ReportId;
use serde::{Deserialize, Serialize};

/// Who files the return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReturnSubject {
    /// A single company files for itself.
    Company(CompanyId),
    /// A tax unit files one consolidated return for all its members.
    Unit(TaxUnitId),
}

/// A tax return to validate: one period of one report for one filer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxReturn {
    /// The return period.
    pub period: DateRange,
    /// The tax report the return is derived from.
    pub report: ReportId,
    /// The filing company or tax unit.
    pub subject: ReturnSubject,
}

/// One debit/credit line of a closing entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClosingLine {
    /// Posted account.
    pub account: AccountId,
    /// Line label.
    pub label: String,
    /// Debit amount. Non-negative.
    pub debit: Decimal,
    /// Credit amount. Non-negative.
    pub credit: Decimal,
}

impl ClosingLine {
    /// A line carrying `balance` as a debit when positive and a credit
    /// when negative.
    #[must_use]
    pub fn from_balance(account: AccountId, label: impl Into<String>, balance: Decimal) -> Self {
        Self {
            account,
            label: label.into(),
            debit: balance.max(Decimal::ZERO),
            credit: (-balance).max(Decimal::ZERO),
        }
    }

    /// Signed balance of the line: `debit - credit`.
    #[must_use]
    pub fn balance(&self) -> Decimal {
        self.debit - self.credit
    }
}

/// The balanced journal entry closing one company's return period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClosingEntry {
    /// The closed company.
    pub company: CompanyId,
    /// The report the return was derived from.
    pub report: ReportId,
    /// The closed period.
    pub period: DateRange,
    /// Posting date, the last day of the period.
    pub date: NaiveDate,
    /// Debit/credit lines; they always net to zero.
    pub lines: Vec<ClosingLine>,
    /// Journal entries whose tag balances this closing swept; marked
    /// settled when the entry is committed.
    pub settled: Vec<EntryId>,
}

impl ClosingEntry {
    /// `sum(debit) - sum(credit)` over all lines.
    #[must_use]
    pub fn residual(&self) -> Decimal {
        self.lines.iter().map(ClosingLine::balance).sum()
    }

    /// Whether the entry's debits and credits net to zero.
    #[must_use]
    pub fn is_balanced(&self) -> bool {
        self.residual().is_zero()
    }
}
