//! Expression and tag aggregation with a per-render cache.
//!
//! Every aggregate a render needs flows through one [`Aggregator`], so
//! the batch prefill path and the per-line path read the same numbers by
//! construction. The cache is keyed by `(Domain, ColumnGroup)` and lives
//! exactly one render.

use std::collections::{BTreeSet, HashMap, HashSet};

use parking_lot::RwLock;
use rayon::prelude::*;
use tracing::debug;

use finrep_core::{AggregateValues, CompanyId, DateRange, NaiveDate};
use finrep_ledger::{DateBounds, Domain, EntryFilter, LedgerStore};

use crate::columns::{ColumnGroup, ColumnSemantic};
use crate::error::EngineError;

type CacheKey = (Domain, ColumnGroup);

/// One render's aggregation front end over the ledger store.
pub struct Aggregator<'a, S> {
    store: &'a S,
    scope: EntryFilter,
    cache: RwLock<HashMap<CacheKey, AggregateValues>>,
}

impl<'a, S: LedgerStore + Sync> Aggregator<'a, S> {
    /// A fresh aggregator scoped by the render's journal filter.
    pub fn new(store: &'a S, scope: EntryFilter) -> Self {
        Self {
            store,
            scope,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// The aggregate of a domain under a column group, cached.
    ///
    /// # Errors
    ///
    /// Propagates the store failure as [`EngineError::Aggregation`],
    /// failing the whole render.
    pub fn fetch(&self, domain: &Domain, group: &ColumnGroup) -> Result<AggregateValues, EngineError> {
        let key = (domain.clone(), group.clone());
        if let Some(hit) = self.cache.read().get(&key) {
            debug!(range = %group.range, "aggregate cache hit");
            return Ok(hit.clone());
        }
        let values = self.compute(domain, group)?;
        self.cache.write().insert(key, values.clone());
        Ok(values)
    }

    /// Compute the distinct missing pairs in parallel and fill the cache.
    ///
    /// # Errors
    ///
    /// The first store failure fails the whole prefill.
    pub fn prefill(&self, pairs: Vec<(Domain, ColumnGroup)>) -> Result<(), EngineError> {
        let todo: HashSet<CacheKey> = {
            let cache = self.cache.read();
            pairs
                .into_iter()
                .filter(|key| !cache.contains_key(key))
                .collect()
        };
        let computed = todo
            .into_par_iter()
            .map(|(domain, group)| {
                self.compute(&domain, &group)
                    .map(|values| ((domain, group), values))
            })
            .collect::<Result<Vec<_>, EngineError>>()?;
        self.cache.write().extend(computed);
        Ok(())
    }

    fn compute(&self, domain: &Domain, group: &ColumnGroup) -> Result<AggregateValues, EngineError> {
        match group.semantic {
            ColumnSemantic::Movement => {
                let scoped = domain.narrowed(&self.scope);
                let values = self.store.aggregate(
                    &scoped,
                    DateBounds::range(group.range),
                    &group.companies,
                    group.currency.as_ref(),
                )?;
                Ok(values)
            }
            ColumnSemantic::Initial => match group.range.day_before() {
                Some(cut) => self.point_in_time(domain, group, cut, group.range.from),
                None => Ok(AggregateValues::zero()),
            },
            ColumnSemantic::End => self.point_in_time(domain, group, group.range.to, group.range.to),
        }
    }

    /// A balance as of `cut`, with profit-and-loss accounts reset at the
    /// fiscal year containing `anchor`.
    fn point_in_time(
        &self,
        domain: &Domain,
        group: &ColumnGroup,
        cut: NaiveDate,
        anchor: NaiveDate,
    ) -> Result<AggregateValues, EngineError> {
        let (sheet, profit_and_loss) = self.split_profit_and_loss(domain)?;

        let mut total = self.store.aggregate(
            &sheet.narrowed(&self.scope),
            DateBounds::through(cut),
            &group.companies,
            group.currency.as_ref(),
        )?;

        if let Some(reset) = profit_and_loss {
            let scoped = reset.narrowed(&self.scope);
            for &company in &group.companies {
                let fiscal_start = self.store.company(company)?.fiscal_year_start_on(anchor);
                if fiscal_start > cut {
                    continue;
                }
                let part = self.store.aggregate(
                    &scoped,
                    DateBounds::range(DateRange::new(fiscal_start, cut)),
                    &[company],
                    group.currency.as_ref(),
                )?;
                total.accumulate(&part);
            }
        }
        Ok(total)
    }

    /// Partition an account domain into its balance-sheet part and its
    /// profit-and-loss part. Non-account domains carry no fiscal reset.
    fn split_profit_and_loss(&self, domain: &Domain) -> Result<(Domain, Option<Domain>), EngineError> {
        let Domain::Accounts(accounts) = domain else {
            return Ok((domain.clone(), None));
        };
        let mut sheet = BTreeSet::new();
        let mut profit_and_loss = BTreeSet::new();
        for &id in accounts {
            if self.store.account(id)?.kind.is_profit_and_loss() {
                profit_and_loss.insert(id);
            } else {
                sheet.insert(id);
            }
        }
        if profit_and_loss.is_empty() {
            return Ok((domain.clone(), None));
        }
        Ok((
            Domain::Accounts(sheet),
            Some(Domain::Accounts(profit_and_loss)),
        ))
    }

    /// The undistributed profit-and-loss balance of one company: every
    /// profit-and-loss posting strictly before the fiscal year containing
    /// `anchor`.
    pub fn undistributed_profit_and_loss(
        &self,
        company: CompanyId,
        anchor: NaiveDate,
        currency: Option<&finrep_core::InternedStr>,
    ) -> Result<AggregateValues, EngineError> {
        let accounts: BTreeSet<_> = self
            .store
            .chart_of_accounts()
            .into_iter()
            .filter(|account| account.company == company && account.kind.is_profit_and_loss())
            .map(|account| account.id)
            .collect();
        if accounts.is_empty() {
            return Ok(AggregateValues::zero());
        }
        let fiscal_start = self.store.company(company)?.fiscal_year_start_on(anchor);
        let Some(cut) = fiscal_start.pred_opt() else {
            return Ok(AggregateValues::zero());
        };
        let domain = Domain::Accounts(accounts).narrowed(&self.scope);
        let values = self
            .store
            .aggregate(&domain, DateBounds::through(cut), &[company], currency)?;
        Ok(values)
    }

    /// The backing store.
    pub const fn store(&self) -> &'a S {
        self.store
    }

    /// The render's journal scope.
    pub const fn scope(&self) -> &EntryFilter {
        &self.scope
    }
}
