//! Closing errors.

use finrep_core::{CompanyId, DateRange, Decimal, MoveId, TagId, TaxUnitId};
use finrep_ledger::LedgerError;
use thiserror::Error;

use crate::reconcile::ReconciliationId;

/// Errors raised by the closing workflow.
#[derive(Debug, Clone, Error)]
pub enum ClosingError {
    /// The return was already validated for this company and period.
    /// Re-validation is a caller mistake, not a no-op.
    #[error("return already validated for company {company} over {period}")]
    AlreadyValidated {
        /// Company whose closing is already posted.
        company: CompanyId,
        /// The return period.
        period: DateRange,
    },

    /// Another closing is in flight for an overlapping company/period.
    /// The caller should retry; failure does not mean already closed.
    #[error("a closing is already in flight for company {company} over {period}")]
    ConcurrentClosing {
        /// Company the in-flight closing holds.
        company: CompanyId,
        /// Period the caller asked for.
        period: DateRange,
    },

    /// A cash-basis reversal failed to net back to the prior balance.
    /// Internal invariant violation; surfaced, never silently corrected.
    #[error("reversal of reconciliation {reconciliation} left a residual of {residual} on tag {tag}")]
    ReconciliationDrift {
        /// The reversed reconciliation.
        reconciliation: ReconciliationId,
        /// The drifting tag.
        tag: TagId,
        /// Leftover recognized amount that should be zero.
        residual: Decimal,
    },

    /// The reconciliation id is not recorded.
    #[error("unknown reconciliation {0}")]
    UnknownReconciliation(ReconciliationId),

    /// The cumulative recognized fraction of a move would exceed one.
    #[error("move {0} would be reconciled beyond its full amount")]
    OverReconciled(MoveId),

    /// The return names a tax unit the store does not know.
    #[error("unknown tax unit {0}")]
    UnknownTaxUnit(TaxUnitId),

    /// No closing account is configured for the company.
    #[error("company {0} has no closing account configured")]
    MissingClosingAccount(CompanyId),

    /// A computed closing entry does not balance. Internal invariant
    /// violation; the entry is not posted.
    #[error("closing entry for company {company} does not balance: residual {residual}")]
    Unbalanced {
        /// Company of the rejected entry.
        company: CompanyId,
        /// `sum(debit) - sum(credit)` of the rejected entry.
        residual: Decimal,
    },

    /// The backing ledger store failed.
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}
