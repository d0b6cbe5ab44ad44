//! The closing write path.
//!
//! Posting a closing entry and marking its contributing journal entries
//! settled happens inside one all-or-nothing transaction per company; a
//! failure leaves no partial entry behind.

use std::collections::{BTreeSet, HashSet};

use tracing::info;

use finrep_core::{CompanyId, DateRange, EntryId};
use finrep_engine::ReportId;

use crate::entry::ClosingEntry;
use crate::error::ClosingError;

/// The transactional contract the closing workflow writes through.
pub trait ClosingStore {
    /// Whether a closing is already on record for the triple.
    fn is_validated(&self, report: ReportId, period: DateRange, company: CompanyId) -> bool;

    /// Post one company's closing entry and mark its contributing
    /// entries settled, all-or-nothing.
    ///
    /// # Errors
    ///
    /// [`ClosingError::AlreadyValidated`] when the triple is on record,
    /// [`ClosingError::Unbalanced`] when the entry does not net to zero.
    /// On any error nothing is written.
    fn commit(&mut self, entry: ClosingEntry) -> Result<(), ClosingError>;
}

/// In-memory closing store backing the CLI and the test suites.
#[derive(Debug, Default)]
pub struct ClosingJournal {
    posted: Vec<ClosingEntry>,
    validated: HashSet<(ReportId, DateRange, CompanyId)>,
    settled: BTreeSet<EntryId>,
}

impl ClosingJournal {
    /// An empty journal.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every committed closing entry, in commit order.
    #[must_use]
    pub fn posted(&self) -> &[ClosingEntry] {
        &self.posted
    }

    /// Whether a journal entry was swept by a committed closing.
    #[must_use]
    pub fn is_settled(&self, entry: EntryId) -> bool {
        self.settled.contains(&entry)
    }
}

impl ClosingStore for ClosingJournal {
    fn is_validated(&self, report: ReportId, period: DateRange, company: CompanyId) -> bool {
        self.validated.contains(&(report, period, company))
    }

    fn commit(&mut self, entry: ClosingEntry) -> Result<(), ClosingError> {
        // Every check runs before the first write, so a rejected commit
        // leaves the journal untouched.
        if self.is_validated(entry.report, entry.period, entry.company) {
            return Err(ClosingError::AlreadyValidated {
                company: entry.company,
                period: entry.period,
            });
        }
        if !entry.is_balanced() {
            return Err(ClosingError::Unbalanced {
                company: entry.company,
                residual: entry.residual(),
            });
        }

        info!(
            company = %entry.company,
            period = %entry.period,
            lines = entry.lines.len(),
            settled = entry.settled.len(),
            "posted closing entry"
        );
        self.validated
            .insert((entry.report, entry.period, entry.company));
        self.settled.extend(entry.settled.iter().copied());
        self.posted.push(entry);
        Ok(())
    }
}
