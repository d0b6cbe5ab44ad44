//! Journal entries (ledger items).
//!
//! A [`JournalEntry`] is one debit/credit line of a posted accounting
//! move. The report engine only ever reads entries; the single write
//! path is the tax closing workflow, which posts whole balanced moves.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

use crate::account::AccountId;
use crate::amount::Amount;
use crate::company::CompanyId;
use crate::intern::InternedStr;
use crate::tag::SignedTag;

/// Stable identifier of a journal entry line.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct EntryId(pub u64);

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Stable identifier of the accounting move an entry belongs to.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct MoveId(pub u64);

impl fmt::Display for MoveId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Whether the move carrying an entry has a payable/receivable
/// counterpart line.
///
/// Cash-basis exigibility only applies to moves with such a counterpart;
/// a move without one is immediately exigible whatever its tax
/// configuration says.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Counterpart {
    /// The move has a payable or receivable line.
    PayableReceivable,
    /// The move has no payable/receivable line.
    #[default]
    None,
}

/// One debit/credit line of a posted accounting transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    /// Stable identifier, unique across the ledger.
    pub id: EntryId,
    /// The move this line belongs to.
    pub move_id: MoveId,
    /// Accounting date.
    pub date: NaiveDate,
    /// Posting company.
    pub company: CompanyId,
    /// Journal code, e.g. "MISC", "INV".
    pub journal: InternedStr,
    /// Posted account.
    pub account: AccountId,
    /// Optional partner the line is held against.
    pub partner: Option<InternedStr>,
    /// Line label.
    pub label: String,
    /// Debit in the company currency. Non-negative.
    pub debit: Decimal,
    /// Credit in the company currency. Non-negative.
    pub credit: Decimal,
    /// Amount in a non-company currency, when the move was booked in one.
    pub amount_currency: Option<Amount>,
    /// Signed tax tags routing this line into tax report lines.
    pub tax_tags: Vec<SignedTag>,
    /// Posting sequence of the line within its move.
    pub sequence: u32,
    /// Counterpart shape of the carrying move.
    pub counterpart: Counterpart,
    /// Whether this line's taxes are exigible on payment only.
    pub cash_basis: bool,
}

impl JournalEntry {
    /// Signed balance of the line: `debit - credit`.
    #[must_use]
    pub fn balance(&self) -> Decimal {
        self.debit - self.credit
    }

    /// The deterministic ledger ordering: date, then posting sequence,
    /// then entry id. Ids are unique, so this is a total order.
    #[must_use]
    pub fn ledger_cmp(&self, other: &Self) -> Ordering {
        self.date
            .cmp(&other.date)
            .then(self.sequence.cmp(&other.sequence))
            .then(self.id.cmp(&other.id))
    }
}

/// Builder-style constructor for entries; the report tests build many.
#[derive(Debug, Clone)]
pub struct EntryBuilder {
    entry: JournalEntry,
}

impl EntryBuilder {
    /// Start an entry with the required identity fields.
    #[must_use]
    pub fn new(id: u64, date: NaiveDate, company: CompanyId, account: AccountId) -> Self {
        Self {
            entry: JournalEntry {
                id: EntryId(id),
                move_id: MoveId(id),
                date,
                company,
                journal: InternedStr::new("MISC"),
                account,
                partner: None,
                label: String::new(),
                debit: Decimal::ZERO,
                credit: Decimal::ZERO,
                amount_currency: None,
                tax_tags: Vec::new(),
                sequence: 0,
                counterpart: Counterpart::None,
                cash_basis: false,
            },
        }
    }

    /// Set the move id (defaults to the entry id).
    #[must_use]
    pub const fn move_id(mut self, move_id: u64) -> Self {
        self.entry.move_id = MoveId(move_id);
        self
    }

    /// Set the journal code.
    #[must_use]
    pub fn journal(mut self, journal: impl Into<InternedStr>) -> Self {
        self.entry.journal = journal.into();
        self
    }

    /// Set the partner.
    #[must_use]
    pub fn partner(mut self, partner: impl Into<InternedStr>) -> Self {
        self.entry.partner = Some(partner.into());
        self
    }

    /// Set the label.
    #[must_use]
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.entry.label = label.into();
        self
    }

    /// Set the debit side.
    #[must_use]
    pub const fn debit(mut self, debit: Decimal) -> Self {
        self.entry.debit = debit;
        self
    }

    /// Set the credit side.
    #[must_use]
    pub const fn credit(mut self, credit: Decimal) -> Self {
        self.entry.credit = credit;
        self
    }

    /// Set the foreign-currency amount.
    #[must_use]
    pub fn amount_currency(mut self, amount: Amount) -> Self {
        self.entry.amount_currency = Some(amount);
        self
    }

    /// Add a signed tax tag.
    #[must_use]
    pub fn tag(mut self, tag: SignedTag) -> Self {
        self.entry.tax_tags.push(tag);
        self
    }

    /// Set the posting sequence.
    #[must_use]
    pub const fn sequence(mut self, sequence: u32) -> Self {
        self.entry.sequence = sequence;
        self
    }

    /// Mark the carrying move as having a payable/receivable counterpart.
    #[must_use]
    pub const fn with_counterpart(mut self) -> Self {
        self.entry.counterpart = Counterpart::PayableReceivable;
        self
    }

    /// Mark the line as cash-basis (exigible on payment).
    #[must_use]
    pub const fn cash_basis(mut self) -> Self {
        self.entry.cash_basis = true;
        self
    }

    /// Finish the entry.
    #[must_use]
    pub fn build(self) -> JournalEntry {
        self.entry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_balance() {
        let entry = EntryBuilder::new(1, date(2017, 1, 1), CompanyId(1), AccountId(1))
            .debit(dec!(100.00))
            .build();
        assert_eq!(entry.balance(), dec!(100.00));

        let entry = EntryBuilder::new(2, date(2017, 1, 1), CompanyId(1), AccountId(1))
            .credit(dec!(40.00))
            .build();
        assert_eq!(entry.balance(), dec!(-40.00));
    }

    #[test]
    fn test_ledger_ordering() {
        let a = EntryBuilder::new(5, date(2017, 1, 1), CompanyId(1), AccountId(1))
            .sequence(2)
            .build();
        let b = EntryBuilder::new(9, date(2017, 1, 1), CompanyId(1), AccountId(1))
            .sequence(1)
            .build();
        let c = EntryBuilder::new(1, date(2017, 1, 2), CompanyId(1), AccountId(1)).build();

        // Same date: posting sequence decides.
        assert_eq!(a.ledger_cmp(&b), Ordering::Greater);
        // Later date sorts after regardless of sequence or id.
        assert_eq!(a.ledger_cmp(&c), Ordering::Less);

        // Same date and sequence: entry id decides.
        let d = EntryBuilder::new(3, date(2017, 1, 1), CompanyId(1), AccountId(1))
            .sequence(2)
            .build();
        assert_eq!(a.ledger_cmp(&d), Ordering::Greater);
    }
}
