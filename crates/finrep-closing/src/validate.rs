//! Return validation: the closing workflow itself.
//!
//! Validating a return sweeps every use-in-closing tag balance of the
//! period into its destination account, netted per account, with the
//! counterpart on the company closing account. One balanced entry per
//! member company; a tax unit's result never depends on member order.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use tracing::debug;

use finrep_core::{AccountId, CompanyId, Counterpart, EntryId};
use finrep_engine::strategy_for;
use finrep_ledger::{DateBounds, Domain, LedgerStore};

use crate::config::ClosingConfig;
use crate::entry::{ClosingEntry, ClosingLine, ReturnSubject, TaxReturn};
use crate::error::ClosingError;
use crate::lock::LockRegistry;
use crate::reconcile::ReconciliationLedger;
use crate::store::ClosingStore;

/// The closing workflow over one ledger store.
pub struct TaxCloser<'a, S> {
    store: &'a S,
    config: &'a ClosingConfig,
    locks: &'a LockRegistry,
    reconciliations: &'a ReconciliationLedger,
}

impl<'a, S: LedgerStore> TaxCloser<'a, S> {
    /// A closer reading the given store, routing config and cash-basis
    /// recognitions, serialized through the given lock registry.
    pub fn new(
        store: &'a S,
        config: &'a ClosingConfig,
        locks: &'a LockRegistry,
        reconciliations: &'a ReconciliationLedger,
    ) -> Self {
        Self {
            store,
            config,
            locks,
            reconciliations,
        }
    }

    /// Validate a return: compute and post one balanced closing entry
    /// per member company, marking the swept entries settled.
    ///
    /// # Errors
    ///
    /// [`ClosingError::ConcurrentClosing`] while another closing holds
    /// an overlapping company/period, [`ClosingError::AlreadyValidated`]
    /// when any member already validated this return,
    /// [`ClosingError::UnknownTaxUnit`] and
    /// [`ClosingError::MissingClosingAccount`] for configuration gaps,
    /// and any store failure. Per company, posting is all-or-nothing.
    pub fn action_validate_return<J: ClosingStore>(
        &self,
        tax_return: &TaxReturn,
        journal: &mut J,
    ) -> Result<Vec<ClosingEntry>, ClosingError> {
        let members = self.members(tax_return)?;
        let _guard = self.locks.acquire(&members, tax_return.period)?;

        for &company in &members {
            if journal.is_validated(tax_return.report, tax_return.period, company) {
                return Err(ClosingError::AlreadyValidated {
                    company,
                    period: tax_return.period,
                });
            }
        }

        let mut entries = Vec::with_capacity(members.len());
        for &company in &members {
            entries.push(self.company_closing(company, tax_return)?);
        }
        for entry in &entries {
            journal.commit(entry.clone())?;
        }
        Ok(entries)
    }

    /// Member companies of the return's subject, in id order.
    fn members(&self, tax_return: &TaxReturn) -> Result<Vec<CompanyId>, ClosingError> {
        let mut members = match tax_return.subject {
            ReturnSubject::Company(company) => vec![company],
            ReturnSubject::Unit(unit) => self
                .store
                .tax_unit(unit)
                .ok_or(ClosingError::UnknownTaxUnit(unit))?
                .members
                .clone(),
        };
        members.sort_unstable();
        members.dedup();
        Ok(members)
    }

    /// One company's balanced closing entry for the return period.
    fn company_closing(
        &self,
        company: CompanyId,
        tax_return: &TaxReturn,
    ) -> Result<ClosingEntry, ClosingError> {
        let company_ref = self.store.company(company)?;
        let strategy = strategy_for(company_ref.country.as_ref());
        let closing_account = self
            .config
            .closing_account_of(company)
            .or_else(|| strategy.carryover_account(company_ref))
            .ok_or(ClosingError::MissingClosingAccount(company))?;

        let entries = self.store.list_entries(
            &Domain::all(),
            DateBounds::range(tax_return.period),
            &[company],
            None,
            0,
        )?;

        let mut per_destination: BTreeMap<AccountId, Decimal> = BTreeMap::new();
        let mut settled: Vec<EntryId> = Vec::new();
        for entry in &entries {
            let mut swept = false;
            for reference in &entry.tax_tags {
                let Some(destination) = self.config.destination(reference.tag) else {
                    continue;
                };
                let amount = if entry.cash_basis
                    && entry.counterpart == Counterpart::PayableReceivable
                {
                    self.reconciliations.recognized(entry.id, reference.tag)
                } else {
                    // No payable/receivable counterpart means immediately
                    // exigible, whatever the tax configuration says.
                    reference.sign.apply(entry.balance())
                };
                if amount.is_zero() {
                    continue;
                }
                *per_destination.entry(destination).or_default() += amount;
                swept = true;
            }
            if swept {
                settled.push(entry.id);
            }
        }

        let label = format!("Tax closing {}", tax_return.period);
        let mut lines = Vec::new();
        let mut counterweight = Decimal::ZERO;
        for (account, amount) in per_destination {
            let rounded = strategy.closing_rounding(amount);
            if rounded.is_zero() {
                continue;
            }
            // Cancel the accumulated tag balance on its destination.
            lines.push(ClosingLine::from_balance(account, label.clone(), -rounded));
            counterweight += rounded;
        }
        if !counterweight.is_zero() {
            lines.push(ClosingLine::from_balance(
                closing_account,
                label,
                counterweight,
            ));
        }

        debug!(%company, period = %tax_return.period, lines = lines.len(), "computed closing");
        Ok(ClosingEntry {
            company,
            report: tax_return.report,
            period: tax_return.period,
            date: tax_return.period.to,
            lines,
            settled,
        })
    }
}
