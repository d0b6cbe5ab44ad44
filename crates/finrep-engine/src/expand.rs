//! Unfolding lines into buckets and journal-entry detail.
//!
//! An unfoldable line expands in two steps. With a group-by key, the
//! parent's domain splits into per-record buckets (accounts, partners,
//! journals, tags) discovered from the entries the render can see; each
//! bucket aggregates through the same cache the parent used, so bucket
//! totals reconcile with the parent by construction. Without a key, the
//! domain lists raw journal entries in ledger order, windowed by a
//! load-more cursor.

use std::collections::{BTreeMap, BTreeSet};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::warn;

use finrep_core::{AggregateField, AggregateValues, InternedStr, JournalEntry};
use finrep_ledger::{DateBounds, Domain, EntryFilter, LedgerStore};

use crate::aggregator::Aggregator;
use crate::columns::{ColumnPlan, ColumnSemantic};
use crate::definition::ReportSemantics;
use crate::display::{DisplayCell, DisplayLine};
use crate::error::EngineError;
use crate::lineid::{GenericLineId, LineIdFrame, Markup};
use crate::options::Options;

/// The record dimension an unfoldable line splits into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupbyKey {
    /// One bucket per posted account.
    Account,
    /// One bucket per partner; entries without a partner are skipped.
    Partner,
    /// One bucket per journal code.
    Journal,
    /// One bucket per signed tax tag.
    TaxTag,
}

impl GroupbyKey {
    /// The model name carried in line-id frames for this key.
    #[must_use]
    pub const fn model(self) -> &'static str {
        match self {
            Self::Account => "account",
            Self::Partner => "partner",
            Self::Journal => "journal",
            Self::TaxTag => "tag",
        }
    }
}

/// Resume point of a paged expansion, carried opaquely by load-more
/// lines.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProgressCursor {
    /// Absolute offset of the next child.
    #[serde(default)]
    pub offset: usize,
    /// Running balance carried into the next page.
    #[serde(default, rename = "balance")]
    pub running_balance: Decimal,
    /// The group-by model the cursor was minted for, used to reject a
    /// cursor replayed against a different expansion.
    #[serde(default, rename = "groupby")]
    pub groupby_cursor: Option<String>,
}

impl ProgressCursor {
    /// Encode into the opaque wire string.
    #[must_use]
    pub fn encode(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Decode a wire string. Malformed input yields `None`.
    #[must_use]
    pub fn decode(text: &str) -> Option<Self> {
        serde_json::from_str(text).ok()
    }

    /// The cursor, reset to the start when it was minted for a different
    /// group-by model.
    #[must_use]
    pub fn validated(self, groupby: Option<GroupbyKey>) -> Self {
        let expected = groupby.map(|key| key.model().to_string());
        if self.groupby_cursor == expected {
            self
        } else {
            warn!(
                cursor = ?self.groupby_cursor,
                expected = ?expected,
                "cursor minted for a different expansion, restarting"
            );
            Self {
                groupby_cursor: expected,
                ..Self::default()
            }
        }
    }
}

/// One discovered bucket, before rendering.
struct Bucket {
    record: String,
    name: String,
    narrow: EntryFilter,
    section: Option<char>,
}

/// The expansion engine of one render.
pub struct Expander<'a, S> {
    aggregator: &'a Aggregator<'a, S>,
    options: &'a Options,
    plan: &'a ColumnPlan,
    semantics: ReportSemantics,
}

impl<'a, S: LedgerStore + Sync> Expander<'a, S> {
    /// An expander sharing the render's aggregator and column plan.
    pub const fn new(
        aggregator: &'a Aggregator<'a, S>,
        options: &'a Options,
        plan: &'a ColumnPlan,
        semantics: ReportSemantics,
    ) -> Self {
        Self {
            aggregator,
            options,
            plan,
            semantics,
        }
    }

    /// Expand one level under `parent`.
    ///
    /// With a group-by key the children are buckets; without one they
    /// are journal-entry detail lines. `level` is the nesting depth the
    /// children render at.
    ///
    /// # Errors
    ///
    /// Propagates store failures; a malformed cursor never errors, it
    /// restarts the page instead.
    pub fn expand(
        &self,
        parent: &GenericLineId,
        groupby: Option<GroupbyKey>,
        domain: &Domain,
        cursor: ProgressCursor,
        level: u32,
    ) -> Result<Vec<DisplayLine>, EngineError> {
        let cursor = cursor.validated(groupby);
        match groupby {
            Some(key) => self.bucket_page(parent, key, domain, &cursor, level),
            None => self.entry_page(parent, domain, &cursor, level),
        }
    }

    /// The date window bucket discovery scans: everything a balance
    /// chain can show, or the union of the movement periods otherwise.
    fn discovery_bounds(&self) -> DateBounds {
        let to = self
            .plan
            .groups
            .iter()
            .map(|group| group.range.to)
            .max()
            .unwrap_or(self.plan.base.to);
        if self.semantics.balance_chain {
            return DateBounds::through(to);
        }
        let from = self
            .plan
            .groups
            .iter()
            .map(|group| group.range.from)
            .min()
            .unwrap_or(self.plan.base.from);
        DateBounds {
            from: Some(from),
            to,
        }
    }

    /// Discover the buckets of a domain under a key, in natural order.
    ///
    /// The search needle participates here and only here: it decides
    /// which buckets appear, never what they sum to.
    fn discover(&self, key: GroupbyKey, domain: &Domain) -> Result<Vec<Bucket>, EngineError> {
        let mut scoped = domain.narrowed(&self.options.scope_filter());
        if let Some(search) = self.options.search_filter() {
            scoped = scoped.narrowed(&search);
        }
        let entries = self.aggregator.store().list_entries(
            &scoped,
            self.discovery_bounds(),
            &self.options.companies,
            None,
            0,
        )?;

        let buckets = match key {
            GroupbyKey::Account => {
                let mut by_code = BTreeMap::new();
                for entry in &entries {
                    let account = self.aggregator.store().account(entry.account)?;
                    by_code.insert(account.code.clone(), account);
                }
                by_code
                    .into_values()
                    .map(|account| Bucket {
                        record: account.id.0.to_string(),
                        name: account.label(),
                        narrow: EntryFilter {
                            accounts: Some(BTreeSet::from([account.id])),
                            ..EntryFilter::default()
                        },
                        section: account.code.chars().next(),
                    })
                    .collect()
            }
            GroupbyKey::Partner => {
                let partners: BTreeSet<InternedStr> = entries
                    .iter()
                    .filter_map(|entry| entry.partner.clone())
                    .collect();
                partners
                    .into_iter()
                    .map(|partner| Bucket {
                        record: partner.to_string(),
                        name: partner.to_string(),
                        narrow: EntryFilter {
                            partners: Some(BTreeSet::from([partner])),
                            ..EntryFilter::default()
                        },
                        section: None,
                    })
                    .collect()
            }
            GroupbyKey::Journal => {
                let journals: BTreeSet<InternedStr> =
                    entries.iter().map(|entry| entry.journal.clone()).collect();
                journals
                    .into_iter()
                    .map(|journal| Bucket {
                        record: journal.to_string(),
                        name: journal.to_string(),
                        narrow: EntryFilter {
                            journals: Some(BTreeSet::from([journal])),
                            ..EntryFilter::default()
                        },
                        section: None,
                    })
                    .collect()
            }
            GroupbyKey::TaxTag => {
                let tags: BTreeSet<_> = entries
                    .iter()
                    .flat_map(|entry| entry.tax_tags.iter().copied())
                    .collect();
                tags.into_iter()
                    .map(|tag| Bucket {
                        record: tag.to_string(),
                        name: tag.to_string(),
                        narrow: EntryFilter {
                            tags: Some(BTreeSet::from([tag])),
                            ..EntryFilter::default()
                        },
                        section: None,
                    })
                    .collect()
            }
        };
        Ok(buckets)
    }

    fn bucket_page(
        &self,
        parent: &GenericLineId,
        key: GroupbyKey,
        domain: &Domain,
        cursor: &ProgressCursor,
        level: u32,
    ) -> Result<Vec<DisplayLine>, EngineError> {
        let buckets = self.discover(key, domain)?;
        let offset = cursor.offset.min(buckets.len());
        let end = match self.options.effective_page_size() {
            Some(size) => (offset + size).min(buckets.len()),
            None => buckets.len(),
        };
        let has_more = end < buckets.len();
        let page = &buckets[offset..end];

        let hierarchy = self.options.hierarchy && key == GroupbyKey::Account;
        let bucket_level = if hierarchy { level + 1 } else { level };

        let mut lines = Vec::new();
        let mut section: Option<(char, usize, Vec<Decimal>)> = None;

        for (index, bucket) in page.iter().enumerate() {
            let sub_domain = domain.narrowed(&bucket.narrow);
            let values = self.cell_values(&sub_domain)?;

            if hierarchy {
                match (&mut section, bucket.section) {
                    (Some((current, _, sums)), Some(next)) if *current == next => {
                        accumulate_cells(sums, &values);
                    }
                    (slot, next) => {
                        if let Some((prefix, at, sums)) = slot.take() {
                            lines[at] = self.section_line(parent, prefix, &sums, level);
                        }
                        if let Some(prefix) = next {
                            *slot = Some((prefix, lines.len(), values.clone()));
                            // Placeholder patched once the section closes.
                            lines.push(DisplayLine::new(parent, String::new(), level));
                        }
                    }
                }
            }

            let id = parent.child(
                LineIdFrame::for_record(key.model(), bucket.record.clone())
                    .with_groupby(key.model()),
            );
            let unfolded = self.options.is_unfolded(&id);
            let mut line = DisplayLine::new(&id, bucket.name.clone(), bucket_level);
            line.unfoldable = true;
            line.unfolded = unfolded;
            line.offset = offset + index;
            line.columns = self.render_cells(&values);
            lines.push(line);

            if unfolded {
                lines.extend(self.entry_page(
                    &id,
                    &sub_domain,
                    &ProgressCursor::default(),
                    bucket_level + 1,
                )?);
            }
        }
        if let Some((prefix, at, sums)) = section.take() {
            lines[at] = self.section_line(parent, prefix, &sums, level);
        }

        if has_more {
            let next = ProgressCursor {
                offset: end,
                running_balance: Decimal::ZERO,
                groupby_cursor: Some(key.model().to_string()),
            };
            lines.push(self.load_more_line(parent, &next, bucket_level));
        }
        Ok(lines)
    }

    fn entry_page(
        &self,
        parent: &GenericLineId,
        domain: &Domain,
        cursor: &ProgressCursor,
        level: u32,
    ) -> Result<Vec<DisplayLine>, EngineError> {
        let Some(movement) = self.plan.base_movement() else {
            warn!("column plan has no base movement group, nothing to list");
            return Ok(Vec::new());
        };
        let scoped = domain.narrowed(&self.options.scope_filter());
        let page_size = self.options.effective_page_size();
        let entries = self.aggregator.store().list_entries(
            &scoped,
            DateBounds::range(movement.range),
            &self.options.companies,
            page_size.map(|size| size + 1),
            cursor.offset,
        )?;
        let has_more = page_size.is_some_and(|size| entries.len() > size);
        let shown = match page_size {
            Some(size) => &entries[..entries.len().min(size)],
            None => &entries[..],
        };

        let mut lines = Vec::new();
        let mut running = cursor.running_balance;

        if self.semantics.balance_chain && cursor.offset == 0 {
            let initial = self.initial_line(parent, domain, level)?;
            running = initial.1;
            lines.push(initial.0);
        }

        for (index, entry) in shown.iter().enumerate() {
            running += entry.balance();
            let id = parent.child(LineIdFrame::for_record("entry", entry.id.to_string()));
            let mut line = DisplayLine::new(&id, entry.label.clone(), level);
            line.offset = cursor.offset + index;
            line.columns = self.entry_cells(entry)?;
            if self.semantics.progressive_balance {
                line.progress = Some(running.to_string());
            }
            lines.push(line);
        }

        if has_more {
            let next = ProgressCursor {
                offset: cursor.offset + shown.len(),
                running_balance: running,
                groupby_cursor: None,
            };
            lines.push(self.load_more_line(parent, &next, level));
        }
        Ok(lines)
    }

    /// The synthetic initial-balance line of a detail page, plus the
    /// balance the running total starts from.
    fn initial_line(
        &self,
        parent: &GenericLineId,
        domain: &Domain,
        level: u32,
    ) -> Result<(DisplayLine, Decimal), EngineError> {
        let initial_group = self.plan.groups.iter().position(|group| {
            group.semantic == ColumnSemantic::Initial && group.range == self.plan.base
        });
        let values = match initial_group {
            Some(index) => self
                .aggregator
                .fetch(domain, &self.plan.groups[index])?,
            None => AggregateValues::zero(),
        };

        let id = parent.child(LineIdFrame::for_markup(Markup::Initial));
        let mut line = DisplayLine::new(&id, "Initial Balance", level);
        line.columns = self
            .plan
            .cells
            .iter()
            .map(|cell| {
                if Some(cell.group) == initial_group {
                    DisplayCell::of(
                        values.field(cell.field),
                        self.plan.groups[cell.group].currency.clone(),
                        cell.blank_if_zero || self.options.blank_if_zero,
                    )
                } else {
                    DisplayCell::empty()
                }
            })
            .collect();
        Ok((line, values.balance))
    }

    /// One raw value per planned cell for a domain, through the shared
    /// cache.
    fn cell_values(&self, domain: &Domain) -> Result<Vec<Decimal>, EngineError> {
        self.plan
            .cells
            .iter()
            .map(|cell| {
                let values = self.aggregator.fetch(domain, &self.plan.groups[cell.group])?;
                Ok(values.field(cell.field))
            })
            .collect()
    }

    fn render_cells(&self, values: &[Decimal]) -> Vec<DisplayCell> {
        values
            .iter()
            .zip(&self.plan.cells)
            .map(|(value, cell)| {
                DisplayCell::of(
                    *value,
                    self.plan.groups[cell.group].currency.clone(),
                    cell.blank_if_zero || self.options.blank_if_zero,
                )
            })
            .collect()
    }

    /// An entry's cells: movement columns whose period covers the entry
    /// date show the entry's own values, everything else stays empty.
    fn entry_cells(&self, entry: &JournalEntry) -> Result<Vec<DisplayCell>, EngineError> {
        self.plan
            .cells
            .iter()
            .map(|cell| {
                let group = &self.plan.groups[cell.group];
                if group.semantic != ColumnSemantic::Movement || !group.range.contains(entry.date) {
                    return Ok(DisplayCell::empty());
                }
                let mut value = entry_field(entry, cell.field);
                if let Some(currency) = &group.currency {
                    let rate = self.aggregator.store().resolve_rate(
                        currency,
                        entry.company,
                        entry.date,
                    )?;
                    value *= rate;
                }
                Ok(DisplayCell::of(
                    value,
                    group.currency.clone(),
                    cell.blank_if_zero || self.options.blank_if_zero,
                ))
            })
            .collect()
    }

    fn section_line(
        &self,
        parent: &GenericLineId,
        prefix: char,
        sums: &[Decimal],
        level: u32,
    ) -> DisplayLine {
        let id = parent.child(LineIdFrame::for_record("section", prefix.to_string()));
        let mut line = DisplayLine::new(&id, prefix.to_string(), level);
        line.columns = self.render_cells(sums);
        line
    }

    fn load_more_line(
        &self,
        parent: &GenericLineId,
        next: &ProgressCursor,
        level: u32,
    ) -> DisplayLine {
        let id = parent.child(LineIdFrame::for_markup(Markup::LoadMore(next.offset)));
        let mut line = DisplayLine::new(&id, "Load more...", level);
        line.offset = next.offset;
        line.progress = Some(next.encode());
        line
    }
}

fn accumulate_cells(sums: &mut [Decimal], values: &[Decimal]) {
    for (sum, value) in sums.iter_mut().zip(values) {
        *sum += *value;
    }
}

fn entry_field(entry: &JournalEntry, field: AggregateField) -> Decimal {
    match field {
        AggregateField::Debit => entry.debit,
        AggregateField::Credit => entry.credit,
        AggregateField::Balance => entry.balance(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use finrep_core::{
        Account, AccountId, AccountKind, Company, CompanyId, DateRange, EntryBuilder,
    };
    use finrep_ledger::MemoryLedger;
    use rust_decimal_macros::dec;

    use crate::columns::ColumnSpec;
    use crate::definition::LineDefId;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn march() -> DateRange {
        DateRange::new(date(2017, 3, 1), date(2017, 3, 31))
    }

    fn ledger() -> MemoryLedger {
        let mut ledger = MemoryLedger::new();
        ledger.add_company(Company::new(CompanyId(1), "US Co", "USD"));
        for (id, code, name) in [(1, "101401", "Bank"), (2, "121000", "Receivable")] {
            ledger.add_account(Account {
                id: AccountId(id),
                code: code.into(),
                name: name.to_string(),
                kind: AccountKind::Asset,
                company: CompanyId(1),
            });
        }
        for (id, day, account, partner, label, amount) in [
            (1, 3, 1, None, "Opening transfer", dec!(100.00)),
            (2, 7, 2, Some("Deco Addict"), "INV/2017/0042", dec!(250.00)),
            (3, 12, 2, Some("Azure Interior"), "INV/2017/0043", dec!(40.00)),
        ] {
            let mut builder = EntryBuilder::new(id, date(2017, 3, day), CompanyId(1), AccountId(account))
                .journal("INV")
                .label(label)
                .debit(amount);
            if let Some(partner) = partner {
                builder = builder.partner(partner);
            }
            ledger.add_entry(builder.build());
        }
        ledger
    }

    fn options() -> Options {
        Options::builder(march())
            .companies([CompanyId(1)])
            .build()
            .unwrap()
    }

    fn balance_columns() -> Vec<ColumnSpec> {
        vec![ColumnSpec::new("Balance", AggregateField::Balance)]
    }

    fn expand_with(
        ledger: &MemoryLedger,
        options: &Options,
        balance_chain: bool,
        groupby: Option<GroupbyKey>,
        cursor: ProgressCursor,
    ) -> Vec<DisplayLine> {
        let plan = ColumnPlan::build(options, &balance_columns(), balance_chain);
        let aggregator = Aggregator::new(ledger, options.scope_filter());
        let semantics = ReportSemantics {
            balance_chain,
            progressive_balance: balance_chain,
        };
        let expander = Expander::new(&aggregator, options, &plan, semantics);
        expander
            .expand(
                &GenericLineId::root(LineDefId(1)),
                groupby,
                &Domain::all(),
                cursor,
                1,
            )
            .unwrap()
    }

    #[test]
    fn test_account_buckets_sorted_by_code() {
        let ledger = ledger();
        let options = options();
        let lines = expand_with(&ledger, &options, false, Some(GroupbyKey::Account), ProgressCursor::default());
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].name, "101401 Bank");
        assert_eq!(lines[1].name, "121000 Receivable");
        assert!(lines.iter().all(|line| line.unfoldable));
        assert_eq!(lines[0].columns[0].value, Some(dec!(100.00)));
        assert_eq!(lines[1].columns[0].value, Some(dec!(290.00)));
    }

    #[test]
    fn test_search_narrows_buckets_not_sums() {
        let ledger = ledger();
        let options = Options::builder(march())
            .companies([CompanyId(1)])
            .search("deco")
            .build()
            .unwrap();
        let lines = expand_with(&ledger, &options, false, Some(GroupbyKey::Account), ProgressCursor::default());
        // Only the receivable account has a matching entry, but its
        // bucket still sums both invoices.
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].name, "121000 Receivable");
        assert_eq!(lines[0].columns[0].value, Some(dec!(290.00)));
    }

    #[test]
    fn test_partner_buckets_skip_partnerless_entries() {
        let ledger = ledger();
        let options = options();
        let lines = expand_with(&ledger, &options, false, Some(GroupbyKey::Partner), ProgressCursor::default());
        let names: Vec<&str> = lines.iter().map(|line| line.name.as_str()).collect();
        assert_eq!(names, vec!["Azure Interior", "Deco Addict"]);
    }

    #[test]
    fn test_entry_page_with_load_more() {
        let ledger = ledger();
        let options = Options::builder(march())
            .companies([CompanyId(1)])
            .page_size(2)
            .build()
            .unwrap();
        let lines = expand_with(&ledger, &options, false, None, ProgressCursor::default());
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0].name, "Opening transfer");
        assert_eq!(lines[1].name, "INV/2017/0042");
        let more = &lines[2];
        assert_eq!(more.name, "Load more...");
        assert_eq!(more.offset, 2);

        let cursor = ProgressCursor::decode(more.progress.as_deref().unwrap()).unwrap();
        let rest = expand_with(&ledger, &options, false, None, cursor);
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].name, "INV/2017/0043");
        assert_eq!(rest[0].offset, 2);
    }

    #[test]
    fn test_balance_chain_detail_has_initial_and_progress() {
        let mut ledger = ledger();
        ledger.add_entry(
            EntryBuilder::new(9, date(2017, 2, 1), CompanyId(1), AccountId(1))
                .debit(dec!(50.00))
                .build(),
        );
        let options = options();
        let lines = expand_with(&ledger, &options, true, None, ProgressCursor::default());
        assert_eq!(lines[0].name, "Initial Balance");
        // Initial cell, movement cell, end cell.
        assert_eq!(lines[0].columns[0].value, Some(dec!(50.00)));
        assert_eq!(lines[0].columns[1].value, None);
        // 50 carried in, then 100 + 250 + 40 in March.
        assert_eq!(lines[1].progress.as_deref(), Some("150.00"));
        assert_eq!(lines[3].progress.as_deref(), Some("440.00"));
    }

    #[test]
    fn test_stale_cursor_restarts_page() {
        let ledger = ledger();
        let options = options();
        let stale = ProgressCursor {
            offset: 7,
            running_balance: dec!(99),
            groupby_cursor: Some("partner".to_string()),
        };
        let lines = expand_with(&ledger, &options, false, Some(GroupbyKey::Account), stale);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].offset, 0);
    }

    #[test]
    fn test_export_mode_ignores_pagination() {
        let ledger = ledger();
        let options = Options::builder(march())
            .companies([CompanyId(1)])
            .page_size(1)
            .export_mode(true)
            .build()
            .unwrap();
        let lines = expand_with(&ledger, &options, false, None, ProgressCursor::default());
        assert_eq!(lines.len(), 3);
        assert!(lines.iter().all(|line| line.name != "Load more..."));
    }

    #[test]
    fn test_hierarchy_inserts_section_headers() {
        let ledger = ledger();
        let options = Options::builder(march())
            .companies([CompanyId(1)])
            .hierarchy(true)
            .build()
            .unwrap();
        let lines = expand_with(&ledger, &options, false, Some(GroupbyKey::Account), ProgressCursor::default());
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0].name, "1");
        assert_eq!(lines[0].level, 1);
        assert_eq!(lines[0].columns[0].value, Some(dec!(390.00)));
        assert_eq!(lines[1].level, 2);
    }

    #[test]
    fn test_cursor_wire_round_trip() {
        let cursor = ProgressCursor {
            offset: 160,
            running_balance: dec!(-12.50),
            groupby_cursor: Some("account".to_string()),
        };
        assert_eq!(ProgressCursor::decode(&cursor.encode()), Some(cursor));
        assert_eq!(ProgressCursor::decode("{not json"), None);
    }
}
