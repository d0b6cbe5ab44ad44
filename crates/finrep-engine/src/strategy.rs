//! Country-specific report behavior.
//!
//! A strategy is chosen once, at report construction, from the
//! definition's country code. Strategies add columns, round closing
//! amounts, and name carryover accounts; they are never swapped at
//! runtime.

use finrep_core::{AccountId, Company, Decimal, InternedStr};

use crate::columns::ColumnSpec;

/// Country-specific hooks a report consults while rendering and closing.
pub trait CountryStrategy: Send + Sync {
    /// Extra columns appended after the declared ones.
    fn extra_columns(&self) -> &[ColumnSpec] {
        &[]
    }

    /// Rounding applied to closing amounts.
    fn closing_rounding(&self, amount: Decimal) -> Decimal {
        amount.round_dp(2)
    }

    /// The carryover account for a company, when the country defines one.
    fn carryover_account(&self, _company: &Company) -> Option<AccountId> {
        None
    }
}

/// The default strategy: no extra columns, cent rounding, no carryover.
#[derive(Debug, Clone, Copy, Default)]
pub struct GenericStrategy;

impl CountryStrategy for GenericStrategy {}

/// Countries whose returns are filed in whole currency units round every
/// closing amount to zero decimal places.
#[derive(Debug, Clone, Copy, Default)]
pub struct WholeUnitStrategy;

impl CountryStrategy for WholeUnitStrategy {
    fn closing_rounding(&self, amount: Decimal) -> Decimal {
        amount.round_dp(0)
    }
}

/// The strategy for a country code. Unknown codes get the generic one.
#[must_use]
pub fn strategy_for(country: Option<&InternedStr>) -> Box<dyn CountryStrategy> {
    match country.map(InternedStr::as_str) {
        Some("DK" | "HU" | "IS") => Box::new(WholeUnitStrategy),
        _ => Box::new(GenericStrategy),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_generic_strategy_defaults() {
        let strategy = GenericStrategy;
        assert!(strategy.extra_columns().is_empty());
        assert_eq!(strategy.closing_rounding(dec!(10.505)), dec!(10.50));
    }

    #[test]
    fn test_whole_unit_selection() {
        let danish: InternedStr = "DK".into();
        let strategy = strategy_for(Some(&danish));
        assert_eq!(strategy.closing_rounding(dec!(10.50)), dec!(10));

        let unknown: InternedStr = "ZZ".into();
        let strategy = strategy_for(Some(&unknown));
        assert_eq!(strategy.closing_rounding(dec!(10.505)), dec!(10.50));
    }
}
