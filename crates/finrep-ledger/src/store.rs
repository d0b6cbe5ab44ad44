//! The queryable, read-only journal-entry store contract.
//!
//! The report engine consumes three query operations
//! ([`LedgerStore::aggregate`], [`LedgerStore::list_entries`] and
//! [`LedgerStore::resolve_rate`]) plus reference-data lookups for
//! accounts and companies. [`MemoryLedger`] is the in-process
//! implementation backing the CLI and the test suites; a database-backed
//! store satisfies the same contract.

use chrono::NaiveDate;
use finrep_core::{
    Account, AccountId, AggregateValues, Amount, Company, CompanyId, DateRange, InternedStr,
    JournalEntry, TaxUnit, TaxUnitId,
};
use rust_decimal::prelude::Signed;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use tracing::debug;

use crate::domain::Domain;
use crate::error::LedgerError;
use crate::rates::{RateEntry, RateTable};

/// Inclusive date bounds of an aggregation.
///
/// `from: None` means "from the beginning of time", which is how initial
/// and end balances are cut; movement columns carry both bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateBounds {
    /// First day covered, if bounded.
    pub from: Option<NaiveDate>,
    /// Last day covered.
    pub to: NaiveDate,
}

impl DateBounds {
    /// Bounds covering a movement range.
    #[must_use]
    pub const fn range(range: DateRange) -> Self {
        Self {
            from: Some(range.from),
            to: range.to,
        }
    }

    /// Bounds covering everything up to and including `date`.
    #[must_use]
    pub const fn through(date: NaiveDate) -> Self {
        Self {
            from: None,
            to: date,
        }
    }

    /// Whether a date falls inside the bounds.
    #[must_use]
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.from.map_or(true, |from| from <= date) && date <= self.to
    }
}

/// The read-only contract a backing ledger store must satisfy.
pub trait LedgerStore {
    /// Aggregate matching entries into the debit/credit/balance/foreign
    /// quadruple, converted into `target_currency` when given (per entry,
    /// at each entry's own date), or summed raw company-currency values
    /// when `None`.
    fn aggregate(
        &self,
        domain: &Domain,
        bounds: DateBounds,
        companies: &[CompanyId],
        target_currency: Option<&InternedStr>,
    ) -> Result<AggregateValues, LedgerError>;

    /// List matching entries in deterministic ledger order (date, then
    /// posting sequence, then entry id) with offset/limit paging.
    fn list_entries(
        &self,
        domain: &Domain,
        bounds: DateBounds,
        companies: &[CompanyId],
        limit: Option<usize>,
        offset: usize,
    ) -> Result<Vec<JournalEntry>, LedgerError>;

    /// The factor converting the functional currency of `company` into
    /// `currency` as of `date`.
    fn resolve_rate(
        &self,
        currency: &InternedStr,
        company: CompanyId,
        date: NaiveDate,
    ) -> Result<Decimal, LedgerError>;

    /// Day-weighted rate over a range spanning rate-validity sub-periods,
    /// for converting values that carry no single entry date.
    fn prorated_rate(
        &self,
        currency: &InternedStr,
        company: CompanyId,
        range: DateRange,
    ) -> Result<Decimal, LedgerError>;

    /// Reference data: account lookup.
    fn account(&self, id: AccountId) -> Result<&Account, LedgerError>;

    /// Reference data: the full chart of accounts, ordered by code.
    fn chart_of_accounts(&self) -> Vec<&Account>;

    /// Reference data: company lookup.
    fn company(&self, id: CompanyId) -> Result<&Company, LedgerError>;

    /// Reference data: tax unit lookup.
    fn tax_unit(&self, id: TaxUnitId) -> Option<&TaxUnit>;
}

/// A serializable snapshot of a whole ledger, as loaded by the CLI.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    /// All companies.
    pub companies: Vec<Company>,
    /// The chart of accounts across companies.
    pub accounts: Vec<Account>,
    /// Tax units, if any.
    #[serde(default)]
    pub tax_units: Vec<TaxUnit>,
    /// Exchange-rate quotations.
    #[serde(default)]
    pub rates: Vec<RateEntry>,
    /// All posted journal entries.
    pub entries: Vec<JournalEntry>,
}

/// In-memory ledger store.
#[derive(Debug, Default)]
pub struct MemoryLedger {
    companies: HashMap<CompanyId, Company>,
    accounts: HashMap<AccountId, Account>,
    tax_units: HashMap<TaxUnitId, TaxUnit>,
    rates: RateTable,
    /// Entries kept in ledger order.
    entries: Vec<JournalEntry>,
}

impl MemoryLedger {
    /// Create an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a ledger from a snapshot.
    #[must_use]
    pub fn from_snapshot(snapshot: LedgerSnapshot) -> Self {
        debug!(
            companies = snapshot.companies.len(),
            accounts = snapshot.accounts.len(),
            entries = snapshot.entries.len(),
            "indexing ledger snapshot"
        );
        let mut ledger = Self::new();
        for company in snapshot.companies {
            ledger.add_company(company);
        }
        for account in snapshot.accounts {
            ledger.add_account(account);
        }
        for unit in snapshot.tax_units {
            ledger.add_tax_unit(unit);
        }
        for rate in snapshot.rates {
            ledger.add_rate(rate);
        }
        for entry in snapshot.entries {
            ledger.add_entry(entry);
        }
        ledger
    }

    /// Register a company.
    pub fn add_company(&mut self, company: Company) {
        self.companies.insert(company.id, company);
    }

    /// Register an account.
    pub fn add_account(&mut self, account: Account) {
        self.accounts.insert(account.id, account);
    }

    /// Register a tax unit.
    pub fn add_tax_unit(&mut self, unit: TaxUnit) {
        self.tax_units.insert(unit.id, unit);
    }

    /// Register an exchange-rate quotation.
    pub fn add_rate(&mut self, rate: RateEntry) {
        self.rates.insert(rate);
    }

    /// Insert a posted entry, keeping ledger order.
    pub fn add_entry(&mut self, entry: JournalEntry) {
        let position = self
            .entries
            .partition_point(|existing| existing.ledger_cmp(&entry) != std::cmp::Ordering::Greater);
        self.entries.insert(position, entry);
    }

    /// All entries in ledger order.
    #[must_use]
    pub fn entries(&self) -> &[JournalEntry] {
        &self.entries
    }

    /// All known accounts, unordered.
    pub fn accounts(&self) -> impl Iterator<Item = &Account> {
        self.accounts.values()
    }

    /// All known companies, unordered.
    pub fn companies(&self) -> impl Iterator<Item = &Company> {
        self.companies.values()
    }

    /// The distinct journal codes present in the ledger.
    #[must_use]
    pub fn journal_codes(&self) -> BTreeSet<InternedStr> {
        self.entries.iter().map(|e| e.journal.clone()).collect()
    }

    fn matching<'a>(
        &'a self,
        domain: &'a Domain,
        bounds: DateBounds,
        companies: &'a [CompanyId],
    ) -> impl Iterator<Item = &'a JournalEntry> + 'a {
        self.entries.iter().filter(move |entry| {
            bounds.contains(entry.date)
                && companies.contains(&entry.company)
                && domain.matches(entry)
                && domain.code_prefix().map_or(true, |prefix| {
                    self.accounts
                        .get(&entry.account)
                        .is_some_and(|account| account.code.starts_with(prefix))
                })
        })
    }

    /// Convert one entry's debit/credit pair into the target currency at
    /// the entry's own date.
    fn converted(
        &self,
        entry: &JournalEntry,
        target: Option<&InternedStr>,
    ) -> Result<(Decimal, Decimal), LedgerError> {
        let Some(target) = target else {
            return Ok((entry.debit, entry.credit));
        };
        let rate = self.resolve_rate(target, entry.company, entry.date)?;
        Ok((entry.debit * rate, entry.credit * rate))
    }
}

impl LedgerStore for MemoryLedger {
    fn aggregate(
        &self,
        domain: &Domain,
        bounds: DateBounds,
        companies: &[CompanyId],
        target_currency: Option<&InternedStr>,
    ) -> Result<AggregateValues, LedgerError> {
        let mut debit = Decimal::ZERO;
        let mut credit = Decimal::ZERO;
        // Foreign-currency sum survives only while every contributing
        // entry carries the same single non-company currency.
        let mut foreign: Option<Option<Amount>> = None;

        for entry in self.matching(domain, bounds, companies) {
            let sign = tag_sign(domain, entry);
            let (entry_debit, entry_credit) = self.converted(entry, target_currency)?;
            if sign >= Decimal::ZERO {
                debit += entry_debit;
                credit += entry_credit;
            } else {
                // A minus tag flips the contribution side.
                debit += entry_credit;
                credit += entry_debit;
            }

            let company = self.company(entry.company)?;
            let entry_foreign = entry
                .amount_currency
                .as_ref()
                .filter(|amount| amount.currency != company.currency);
            let first_entry = foreign.is_none();
            foreign = Some(match (foreign.take().flatten(), entry_foreign) {
                (Some(sum), Some(amount)) if sum.currency == amount.currency => {
                    Some(Amount::new(sum.number + sign * amount.number, sum.currency))
                }
                (None, Some(amount)) if first_entry => {
                    Some(Amount::new(sign * amount.number, amount.currency.clone()))
                }
                _ => None,
            });
        }

        Ok(AggregateValues {
            debit,
            credit,
            balance: debit - credit,
            amount_currency: foreign.flatten(),
        })
    }

    fn list_entries(
        &self,
        domain: &Domain,
        bounds: DateBounds,
        companies: &[CompanyId],
        limit: Option<usize>,
        offset: usize,
    ) -> Result<Vec<JournalEntry>, LedgerError> {
        let iter = self.matching(domain, bounds, companies).skip(offset);
        let entries = match limit {
            Some(limit) => iter.take(limit).cloned().collect(),
            None => iter.cloned().collect(),
        };
        Ok(entries)
    }

    fn resolve_rate(
        &self,
        currency: &InternedStr,
        company: CompanyId,
        date: NaiveDate,
    ) -> Result<Decimal, LedgerError> {
        let company = self.company(company)?;
        self.rates.resolve(&company.currency, currency, date)
    }

    fn prorated_rate(
        &self,
        currency: &InternedStr,
        company: CompanyId,
        range: DateRange,
    ) -> Result<Decimal, LedgerError> {
        let company = self.company(company)?;
        self.rates.prorated(&company.currency, currency, range)
    }

    fn account(&self, id: AccountId) -> Result<&Account, LedgerError> {
        self.accounts.get(&id).ok_or(LedgerError::UnknownAccount(id))
    }

    fn chart_of_accounts(&self) -> Vec<&Account> {
        let mut accounts: Vec<&Account> = self.accounts.values().collect();
        accounts.sort_by(|a, b| a.code.cmp(&b.code));
        accounts
    }

    fn company(&self, id: CompanyId) -> Result<&Company, LedgerError> {
        self.companies
            .get(&id)
            .ok_or(LedgerError::UnknownCompany(id))
    }

    fn tax_unit(&self, id: TaxUnitId) -> Option<&TaxUnit> {
        self.tax_units.get(&id)
    }
}

/// The contribution sign of an entry under a domain.
///
/// Only tag domains carry signs; the sign comes from the entry's own tag
/// reference, so one entry can contribute positively to one tag line and
/// negatively to another within the same render.
fn tag_sign(domain: &Domain, entry: &JournalEntry) -> Decimal {
    match domain {
        Domain::Tags(tags) => {
            let mut sign = Decimal::ZERO;
            for reference in &entry.tax_tags {
                if tags.contains(reference) {
                    sign += reference.sign.apply(Decimal::ONE);
                }
            }
            if sign.is_zero() {
                Decimal::ONE
            } else {
                sign.signum()
            }
        }
        Domain::Accounts(_) | Domain::Predicate(_) => Decimal::ONE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use finrep_core::{AccountKind, EntryBuilder, Sign, SignedTag, TagId};
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn fixture() -> MemoryLedger {
        let mut ledger = MemoryLedger::new();
        ledger.add_company(Company::new(CompanyId(1), "Acme", "EUR"));
        ledger.add_account(Account {
            id: AccountId(1),
            code: "101401".into(),
            name: "Bank".to_string(),
            kind: AccountKind::Asset,
            company: CompanyId(1),
        });
        ledger.add_account(Account {
            id: AccountId(2),
            code: "400000".into(),
            name: "Payables".to_string(),
            kind: AccountKind::Liability,
            company: CompanyId(1),
        });
        ledger.add_entry(
            EntryBuilder::new(1, date(2017, 3, 1), CompanyId(1), AccountId(1))
                .debit(dec!(500.00))
                .build(),
        );
        ledger.add_entry(
            EntryBuilder::new(2, date(2017, 3, 1), CompanyId(1), AccountId(2))
                .credit(dec!(500.00))
                .build(),
        );
        ledger.add_entry(
            EntryBuilder::new(3, date(2017, 6, 1), CompanyId(1), AccountId(1))
                .debit(dec!(250.00))
                .build(),
        );
        ledger
    }

    #[test]
    fn test_aggregate_movement() {
        let ledger = fixture();
        let agg = ledger
            .aggregate(
                &Domain::account(AccountId(1)),
                DateBounds::range(DateRange::new(date(2017, 1, 1), date(2017, 3, 31))),
                &[CompanyId(1)],
                None,
            )
            .unwrap();
        assert_eq!(agg.debit, dec!(500.00));
        assert_eq!(agg.balance, dec!(500.00));
    }

    #[test]
    fn test_aggregate_through() {
        let ledger = fixture();
        let agg = ledger
            .aggregate(
                &Domain::account(AccountId(1)),
                DateBounds::through(date(2017, 12, 31)),
                &[CompanyId(1)],
                None,
            )
            .unwrap();
        assert_eq!(agg.balance, dec!(750.00));
    }

    #[test]
    fn test_aggregate_zero_rows_is_exact_zero() {
        let ledger = fixture();
        let agg = ledger
            .aggregate(
                &Domain::account(AccountId(99)),
                DateBounds::through(date(2017, 12, 31)),
                &[CompanyId(1)],
                None,
            )
            .unwrap();
        assert_eq!(agg, AggregateValues::zero());
    }

    #[test]
    fn test_minus_tag_flips_side() {
        let mut ledger = MemoryLedger::new();
        ledger.add_company(Company::new(CompanyId(1), "Acme", "EUR"));
        ledger.add_entry(
            EntryBuilder::new(1, date(2017, 1, 5), CompanyId(1), AccountId(1))
                .credit(dec!(42.00))
                .tag(SignedTag::minus(TagId(7)))
                .build(),
        );
        let agg = ledger
            .aggregate(
                &Domain::tags([SignedTag {
                    tag: TagId(7),
                    sign: Sign::Minus,
                }]),
                DateBounds::through(date(2017, 12, 31)),
                &[CompanyId(1)],
                None,
            )
            .unwrap();
        // The minus reference flips the 42.00 credit into a debit.
        assert_eq!(agg.debit, dec!(42.00));
        assert_eq!(agg.balance, dec!(42.00));
    }

    #[test]
    fn test_list_entries_ordered_and_paged() {
        let ledger = fixture();
        let all = ledger
            .list_entries(
                &Domain::all(),
                DateBounds::through(date(2017, 12, 31)),
                &[CompanyId(1)],
                None,
                0,
            )
            .unwrap();
        assert_eq!(all.len(), 3);
        assert!(all.windows(2).all(|w| w[0].ledger_cmp(&w[1]).is_le()));

        let page = ledger
            .list_entries(
                &Domain::all(),
                DateBounds::through(date(2017, 12, 31)),
                &[CompanyId(1)],
                Some(2),
                1,
            )
            .unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].id, all[1].id);
    }

    #[test]
    fn test_foreign_currency_single_currency_rule() {
        let mut ledger = MemoryLedger::new();
        ledger.add_company(Company::new(CompanyId(1), "Acme", "EUR"));
        ledger.add_entry(
            EntryBuilder::new(1, date(2017, 1, 1), CompanyId(1), AccountId(1))
                .debit(dec!(80.00))
                .amount_currency(Amount::new(dec!(100.00), "USD"))
                .build(),
        );
        ledger.add_entry(
            EntryBuilder::new(2, date(2017, 1, 2), CompanyId(1), AccountId(1))
                .debit(dec!(40.00))
                .amount_currency(Amount::new(dec!(50.00), "USD"))
                .build(),
        );

        let domain = Domain::account(AccountId(1));
        let bounds = DateBounds::through(date(2017, 12, 31));
        let agg = ledger
            .aggregate(&domain, bounds, &[CompanyId(1)], None)
            .unwrap();
        assert_eq!(agg.amount_currency, Some(Amount::new(dec!(150.00), "USD")));

        // A second foreign currency poisons the column.
        ledger.add_entry(
            EntryBuilder::new(3, date(2017, 1, 3), CompanyId(1), AccountId(1))
                .debit(dec!(10.00))
                .amount_currency(Amount::new(dec!(12.00), "GBP"))
                .build(),
        );
        let agg = ledger
            .aggregate(&domain, bounds, &[CompanyId(1)], None)
            .unwrap();
        assert!(agg.amount_currency.is_none());

        // So does an entry with no foreign amount at all.
        let mut poisoned = MemoryLedger::new();
        poisoned.add_company(Company::new(CompanyId(1), "Acme", "EUR"));
        poisoned.add_entry(
            EntryBuilder::new(1, date(2017, 1, 1), CompanyId(1), AccountId(1))
                .debit(dec!(80.00))
                .amount_currency(Amount::new(dec!(100.00), "USD"))
                .build(),
        );
        poisoned.add_entry(
            EntryBuilder::new(2, date(2017, 1, 2), CompanyId(1), AccountId(1))
                .debit(dec!(40.00))
                .build(),
        );
        let agg = poisoned
            .aggregate(&domain, bounds, &[CompanyId(1)], None)
            .unwrap();
        assert!(agg.amount_currency.is_none());
    }

    #[test]
    fn test_conversion_uses_entry_date() {
        let mut ledger = MemoryLedger::new();
        ledger.add_company(Company::new(CompanyId(1), "Acme", "EUR"));
        ledger.add_rate(RateEntry {
            from: "EUR".into(),
            to: "USD".into(),
            valid_from: date(2017, 1, 1),
            rate: dec!(1.10),
        });
        ledger.add_rate(RateEntry {
            from: "EUR".into(),
            to: "USD".into(),
            valid_from: date(2017, 6, 1),
            rate: dec!(1.20),
        });
        ledger.add_entry(
            EntryBuilder::new(1, date(2017, 2, 1), CompanyId(1), AccountId(1))
                .debit(dec!(100.00))
                .build(),
        );
        ledger.add_entry(
            EntryBuilder::new(2, date(2017, 7, 1), CompanyId(1), AccountId(1))
                .debit(dec!(100.00))
                .build(),
        );

        let target: InternedStr = "USD".into();
        let agg = ledger
            .aggregate(
                &Domain::account(AccountId(1)),
                DateBounds::through(date(2017, 12, 31)),
                &[CompanyId(1)],
                Some(&target),
            )
            .unwrap();
        // 100 * 1.10 + 100 * 1.20, each at its own entry date.
        assert_eq!(agg.debit, dec!(230.00));
    }
}
