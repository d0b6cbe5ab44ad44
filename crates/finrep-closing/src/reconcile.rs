//! Cash-basis recognition and reversal.
//!
//! A cash-basis tax line contributes to the closing only as its invoice
//! is reconciled against payment, pro-rata on partial payment. The
//! [`ReconciliationLedger`] records the exact amounts recognized by each
//! reconciliation, so reversing one restores the prior tag balance to
//! the cent.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use finrep_core::{Counterpart, EntryId, JournalEntry, MoveId, TagId};

use crate::error::ClosingError;

/// Stable identifier of one recognition.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct ReconciliationId(pub u64);

impl fmt::Display for ReconciliationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The amounts one reconciliation recognized, keyed by tax line and tag.
#[derive(Debug, Clone)]
struct Recognition {
    move_id: MoveId,
    fraction: Decimal,
    amounts: HashMap<(EntryId, TagId), Decimal>,
}

/// Running record of cash-basis recognitions.
#[derive(Debug, Default)]
pub struct ReconciliationLedger {
    next: u64,
    recognitions: BTreeMap<ReconciliationId, Recognition>,
    fractions: HashMap<MoveId, Decimal>,
    totals: HashMap<(EntryId, TagId), Decimal>,
}

impl ReconciliationLedger {
    /// An empty ledger; nothing is recognized under it.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Recognize `fraction` of the cash-basis tags carried by the lines
    /// of `move_id`.
    ///
    /// Only lines of the move that are cash-basis and whose move has a
    /// payable/receivable counterpart are recognized; other lines are
    /// exigible through the ordinary path and ignored here.
    ///
    /// # Errors
    ///
    /// [`ClosingError::OverReconciled`] when `fraction` is not positive
    /// or the move's cumulative recognized fraction would exceed one.
    pub fn recognize(
        &mut self,
        move_id: MoveId,
        lines: &[JournalEntry],
        fraction: Decimal,
    ) -> Result<ReconciliationId, ClosingError> {
        let prior = self.fraction_of(move_id);
        if fraction <= Decimal::ZERO || prior + fraction > Decimal::ONE {
            return Err(ClosingError::OverReconciled(move_id));
        }

        let mut amounts: HashMap<(EntryId, TagId), Decimal> = HashMap::new();
        for line in lines {
            if line.move_id != move_id
                || !line.cash_basis
                || line.counterpart != Counterpart::PayableReceivable
            {
                continue;
            }
            for reference in &line.tax_tags {
                let amount = (reference.sign.apply(line.balance()) * fraction).round_dp(2);
                *amounts.entry((line.id, reference.tag)).or_default() += amount;
            }
        }

        for (key, amount) in &amounts {
            *self.totals.entry(*key).or_default() += *amount;
        }
        *self.fractions.entry(move_id).or_default() += fraction;

        self.next += 1;
        let id = ReconciliationId(self.next);
        debug!(%id, %move_id, %fraction, lines = amounts.len(), "recognized cash-basis fraction");
        self.recognitions.insert(
            id,
            Recognition {
                move_id,
                fraction,
                amounts,
            },
        );
        Ok(id)
    }

    /// The recognized amount of one tax line's tag.
    #[must_use]
    pub fn recognized(&self, entry: EntryId, tag: TagId) -> Decimal {
        self.totals.get(&(entry, tag)).copied().unwrap_or_default()
    }

    /// The cumulative recognized fraction of a move.
    #[must_use]
    pub fn fraction_of(&self, move_id: MoveId) -> Decimal {
        self.fractions.get(&move_id).copied().unwrap_or_default()
    }

    /// Reverse one recognition, restoring the tag balances it moved.
    ///
    /// # Errors
    ///
    /// [`ClosingError::UnknownReconciliation`] when the id is not on
    /// record; [`ClosingError::ReconciliationDrift`] when the running
    /// totals disagree with the per-recognition record after reversal.
    /// Drift is surfaced as-is, never corrected.
    pub fn reverse(&mut self, id: ReconciliationId) -> Result<(), ClosingError> {
        let recognition = self
            .recognitions
            .remove(&id)
            .ok_or(ClosingError::UnknownReconciliation(id))?;

        if let Some(fraction) = self.fractions.get_mut(&recognition.move_id) {
            *fraction -= recognition.fraction;
            if fraction.is_zero() {
                self.fractions.remove(&recognition.move_id);
            }
        }
        for (key, amount) in &recognition.amounts {
            if let Some(total) = self.totals.get_mut(key) {
                *total -= *amount;
                if total.is_zero() {
                    self.totals.remove(key);
                }
            }
        }

        // The running totals must equal the sum of the surviving
        // recognitions for every key the reversal touched.
        for &(entry, tag) in recognition.amounts.keys() {
            let expected: Decimal = self
                .recognitions
                .values()
                .filter_map(|r| r.amounts.get(&(entry, tag)))
                .sum();
            let actual = self.recognized(entry, tag);
            if actual != expected {
                let residual = actual - expected;
                error!(reconciliation = %id, %tag, %residual, "cash-basis reversal drifted");
                return Err(ClosingError::ReconciliationDrift {
                    reconciliation: id,
                    tag,
                    residual,
                });
            }
        }
        debug!(%id, move_id = %recognition.move_id, "reversed recognition");
        Ok(())
    }
}
