//! Accounts and account kinds.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::company::CompanyId;
use crate::intern::InternedStr;

/// Stable identifier of an account.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct AccountId(pub u32);

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The five account kinds of the chart of accounts.
///
/// The kind decides balance-sheet vs profit-and-loss behavior: P&L
/// accounts restart from zero at each fiscal-year opening, balance-sheet
/// accounts carry their balance forward indefinitely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountKind {
    /// Balance-sheet asset account.
    Asset,
    /// Balance-sheet liability account.
    Liability,
    /// Balance-sheet equity account.
    Equity,
    /// Profit-and-loss income account.
    Income,
    /// Profit-and-loss expense account.
    Expense,
}

impl AccountKind {
    /// Whether balances of this kind reset at each fiscal-year start.
    #[must_use]
    pub const fn is_profit_and_loss(self) -> bool {
        matches!(self, Self::Income | Self::Expense)
    }
}

/// One account of a company's chart of accounts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Stable identifier.
    pub id: AccountId,
    /// Account code, e.g. "400000". Codes sort naturally in reports.
    pub code: InternedStr,
    /// Human-readable name.
    pub name: String,
    /// Account kind.
    pub kind: AccountKind,
    /// Owning company.
    pub company: CompanyId,
}

impl Account {
    /// Display label used for group-by buckets: `code name`.
    #[must_use]
    pub fn label(&self) -> String {
        format!("{} {}", self.code, self.name)
    }
}
