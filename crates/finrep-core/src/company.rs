//! Companies and tax units.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::intern::InternedStr;

/// Stable identifier of a company (legal entity).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct CompanyId(pub u32);

impl fmt::Display for CompanyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Stable identifier of a tax unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaxUnitId(pub u32);

impl fmt::Display for TaxUnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One legal entity posting into the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Company {
    /// Stable identifier.
    pub id: CompanyId,
    /// Display name.
    pub name: String,
    /// Functional currency entries of this company are booked in.
    pub currency: InternedStr,
    /// First day of the fiscal year as (month, day). (1, 1) for calendar
    /// years.
    pub fiscal_year_start: (u32, u32),
    /// ISO country code selecting the country strategy, if any.
    pub country: Option<InternedStr>,
}

impl Company {
    /// Create a calendar-fiscal-year company.
    #[must_use]
    pub fn new(id: CompanyId, name: impl Into<String>, currency: impl Into<InternedStr>) -> Self {
        Self {
            id,
            name: name.into(),
            currency: currency.into(),
            fiscal_year_start: (1, 1),
            country: None,
        }
    }

    /// The most recent fiscal-year opening on or before `date`.
    ///
    /// A nonsensical configured `(month, day)` falls back to January 1st
    /// rather than failing the render.
    #[must_use]
    pub fn fiscal_year_start_on(&self, date: NaiveDate) -> NaiveDate {
        let (month, day) = self.fiscal_year_start;
        let opening = |year: i32| {
            NaiveDate::from_ymd_opt(year, month, day)
                .or_else(|| NaiveDate::from_ymd_opt(year, month, 28))
                .or_else(|| NaiveDate::from_ymd_opt(year, 1, 1))
                .unwrap_or(date)
        };
        let this_year = opening(date.year());
        if this_year <= date {
            this_year
        } else {
            opening(date.year() - 1)
        }
    }
}

/// Companies filing one consolidated tax return under a shared identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxUnit {
    /// Stable identifier.
    pub id: TaxUnitId,
    /// Display name of the unit.
    pub name: String,
    /// Member companies. The consolidated result never depends on member
    /// order or on which member is "active" for the caller.
    pub members: Vec<CompanyId>,
    /// The member that files the consolidated return.
    pub main: CompanyId,
    /// Filing currency of the unit.
    pub currency: InternedStr,
}

impl TaxUnit {
    /// Whether the given company belongs to this unit.
    #[must_use]
    pub fn contains(&self, company: CompanyId) -> bool {
        self.members.contains(&company)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_calendar_fiscal_year() {
        let company = Company::new(CompanyId(1), "Acme", "EUR");
        assert_eq!(
            company.fiscal_year_start_on(date(2017, 6, 15)),
            date(2017, 1, 1)
        );
        assert_eq!(
            company.fiscal_year_start_on(date(2017, 1, 1)),
            date(2017, 1, 1)
        );
    }

    #[test]
    fn test_shifted_fiscal_year() {
        let mut company = Company::new(CompanyId(1), "Acme", "EUR");
        company.fiscal_year_start = (7, 1);
        // Before July 1st the fiscal year opened the previous calendar year.
        assert_eq!(
            company.fiscal_year_start_on(date(2017, 3, 10)),
            date(2016, 7, 1)
        );
        assert_eq!(
            company.fiscal_year_start_on(date(2017, 9, 1)),
            date(2017, 7, 1)
        );
    }

    #[test]
    fn test_tax_unit_membership() {
        let unit = TaxUnit {
            id: TaxUnitId(1),
            name: "Group".to_string(),
            members: vec![CompanyId(1), CompanyId(2)],
            main: CompanyId(1),
            currency: "EUR".into(),
        };
        assert!(unit.contains(CompanyId(2)));
        assert!(!unit.contains(CompanyId(3)));
    }
}
