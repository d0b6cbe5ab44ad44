//! Per-company-period closing locks.
//!
//! Closings for overlapping company/period pairs must be serialized. A
//! second concurrent attempt fails with
//! [`ClosingError::ConcurrentClosing`]; the caller retries and must
//! never read that failure as "already closed".

use finrep_core::{CompanyId, DateRange};
use parking_lot::Mutex;

use crate::error::ClosingError;

/// Registry of in-flight closings.
#[derive(Debug, Default)]
pub struct LockRegistry {
    active: Mutex<Vec<(CompanyId, DateRange)>>,
}

impl LockRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim every `(company, period)` pair at once.
    ///
    /// The claim is released when the returned guard drops.
    ///
    /// # Errors
    ///
    /// [`ClosingError::ConcurrentClosing`] when any requested company
    /// already has an in-flight closing over an overlapping period; in
    /// that case nothing is claimed.
    pub fn acquire(
        &self,
        companies: &[CompanyId],
        period: DateRange,
    ) -> Result<ClosingGuard<'_>, ClosingError> {
        let mut active = self.active.lock();
        for &company in companies {
            if active
                .iter()
                .any(|(held, span)| *held == company && span.overlaps(&period))
            {
                return Err(ClosingError::ConcurrentClosing { company, period });
            }
        }
        active.extend(companies.iter().map(|&company| (company, period)));
        Ok(ClosingGuard {
            registry: self,
            held: companies.to_vec(),
            period,
        })
    }
}

/// Holds `(company, period)` claims until dropped.
#[derive(Debug)]
pub struct ClosingGuard<'a> {
    registry: &'a LockRegistry,
    held: Vec<CompanyId>,
    period: DateRange,
}

impl Drop for ClosingGuard<'_> {
    fn drop(&mut self) {
        let mut active = self.registry.active.lock();
        active.retain(|(company, span)| !(self.held.contains(company) && *span == self.period));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use finrep_core::NaiveDate;

    fn period(m1: u32, m2: u32, d2: u32) -> DateRange {
        DateRange::new(
            NaiveDate::from_ymd_opt(2017, m1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2017, m2, d2).unwrap(),
        )
    }

    #[test]
    fn test_overlap_is_rejected() {
        let registry = LockRegistry::new();
        let q1 = period(1, 3, 31);
        let _guard = registry.acquire(&[CompanyId(1)], q1).unwrap();

        let overlapping = period(3, 6, 30);
        let denied = registry.acquire(&[CompanyId(1)], overlapping);
        assert!(matches!(
            denied,
            Err(ClosingError::ConcurrentClosing { company, .. }) if company == CompanyId(1)
        ));
    }

    #[test]
    fn test_disjoint_claims_coexist() {
        let registry = LockRegistry::new();
        let _q1 = registry.acquire(&[CompanyId(1)], period(1, 3, 31)).unwrap();
        // A different period for the same company, and the same period
        // for a different company, both go through.
        let _q2 = registry.acquire(&[CompanyId(1)], period(4, 6, 30)).unwrap();
        let _other = registry.acquire(&[CompanyId(2)], period(1, 3, 31)).unwrap();
    }

    #[test]
    fn test_drop_releases() {
        let registry = LockRegistry::new();
        let q1 = period(1, 3, 31);
        drop(registry.acquire(&[CompanyId(1), CompanyId(2)], q1).unwrap());
        let _again = registry.acquire(&[CompanyId(1), CompanyId(2)], q1).unwrap();
    }

    #[test]
    fn test_failed_acquire_claims_nothing() {
        let registry = LockRegistry::new();
        let q1 = period(1, 3, 31);
        let _held = registry.acquire(&[CompanyId(2)], q1).unwrap();
        // Company 1 was free, but the batch fails on company 2 and must
        // not leave company 1 claimed behind.
        assert!(registry.acquire(&[CompanyId(1), CompanyId(2)], q1).is_err());
        let _one = registry.acquire(&[CompanyId(1)], q1).unwrap();
    }
}
