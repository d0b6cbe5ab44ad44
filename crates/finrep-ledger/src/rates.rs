//! Exchange-rate resolution.
//!
//! Rates are piecewise constant: each [`RateEntry`] opens a validity
//! sub-period that lasts until the next entry for the same currency
//! pair. Entry-level conversion always resolves the rate at the entry's
//! own date; range-level conversion of values that carry no single date
//! uses a day-weighted proration across the sub-periods the range spans.

use chrono::NaiveDate;
use finrep_core::{DateRange, InternedStr};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::LedgerError;

/// One rate quotation: 1 unit of `from` = `rate` units of `to`, valid
/// from `valid_from` until superseded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateEntry {
    /// Source currency.
    pub from: InternedStr,
    /// Target currency.
    pub to: InternedStr,
    /// First day the quotation applies.
    pub valid_from: NaiveDate,
    /// Conversion factor.
    pub rate: Decimal,
}

/// Piecewise-constant rate table over currency pairs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RateTable {
    /// (from, to) -> valid_from -> rate, kept sorted by date.
    #[serde(with = "rate_map_serde")]
    rates: BTreeMap<(InternedStr, InternedStr), BTreeMap<NaiveDate, Decimal>>,
}

impl RateTable {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a quotation and its reciprocal.
    pub fn insert(&mut self, entry: RateEntry) {
        if entry.rate.is_zero() {
            return;
        }
        let reciprocal = Decimal::ONE / entry.rate;
        self.rates
            .entry((entry.from.clone(), entry.to.clone()))
            .or_default()
            .insert(entry.valid_from, entry.rate);
        self.rates
            .entry((entry.to, entry.from))
            .or_default()
            .insert(entry.valid_from, reciprocal);
    }

    /// The rate converting `from` into `to` as of `date`.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::MissingRate`] when no quotation is valid on
    /// or before `date`.
    pub fn resolve(
        &self,
        from: &InternedStr,
        to: &InternedStr,
        date: NaiveDate,
    ) -> Result<Decimal, LedgerError> {
        if from == to {
            return Ok(Decimal::ONE);
        }
        self.rates
            .get(&(from.clone(), to.clone()))
            .and_then(|by_date| by_date.range(..=date).next_back())
            .map(|(_, rate)| *rate)
            .ok_or_else(|| LedgerError::MissingRate {
                from: from.to_string(),
                to: to.to_string(),
                date,
            })
    }

    /// Day-weighted average rate over a range spanning one or more
    /// rate-validity sub-periods.
    ///
    /// Each sub-period contributes its rate weighted by the number of
    /// days of the range it covers.
    pub fn prorated(
        &self,
        from: &InternedStr,
        to: &InternedStr,
        range: DateRange,
    ) -> Result<Decimal, LedgerError> {
        if from == to {
            return Ok(Decimal::ONE);
        }
        let by_date =
            self.rates
                .get(&(from.clone(), to.clone()))
                .ok_or_else(|| LedgerError::MissingRate {
                    from: from.to_string(),
                    to: to.to_string(),
                    date: range.from,
                })?;

        // Cut points inside the range where the rate changes.
        let mut cursor = range.from;
        let mut weighted = Decimal::ZERO;
        let total_days = Decimal::from(range.days());
        let cuts: Vec<NaiveDate> = by_date
            .range((
                std::ops::Bound::Excluded(range.from),
                std::ops::Bound::Included(range.to),
            ))
            .map(|(date, _)| *date)
            .collect();

        for cut in cuts.into_iter().chain(std::iter::once(
            range.to.succ_opt().unwrap_or(range.to),
        )) {
            let sub = DateRange::new(cursor, cut.pred_opt().unwrap_or(cut));
            if !sub.is_valid() {
                continue;
            }
            let rate = self.resolve(from, to, sub.from)?;
            weighted += rate * Decimal::from(sub.days());
            cursor = cut;
        }

        Ok(weighted / total_days)
    }
}

/// Serde support: flatten the pair-keyed map into a rate-entry list.
mod rate_map_serde {
    use super::{BTreeMap, Decimal, InternedStr, NaiveDate, RateEntry};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    type RateMap = BTreeMap<(InternedStr, InternedStr), BTreeMap<NaiveDate, Decimal>>;

    pub fn serialize<S: Serializer>(map: &RateMap, serializer: S) -> Result<S::Ok, S::Error> {
        let entries: Vec<RateEntry> = map
            .iter()
            .flat_map(|((from, to), by_date)| {
                by_date.iter().map(move |(valid_from, rate)| RateEntry {
                    from: from.clone(),
                    to: to.clone(),
                    valid_from: *valid_from,
                    rate: *rate,
                })
            })
            .collect();
        entries.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<RateMap, D::Error> {
        let entries = Vec::<RateEntry>::deserialize(deserializer)?;
        let mut map = RateMap::new();
        for entry in entries {
            map.entry((entry.from, entry.to))
                .or_default()
                .insert(entry.valid_from, entry.rate);
        }
        Ok(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn table() -> RateTable {
        let mut table = RateTable::new();
        table.insert(RateEntry {
            from: "USD".into(),
            to: "EUR".into(),
            valid_from: date(2017, 1, 1),
            rate: dec!(0.8),
        });
        table.insert(RateEntry {
            from: "USD".into(),
            to: "EUR".into(),
            valid_from: date(2017, 1, 21),
            rate: dec!(0.9),
        });
        table
    }

    #[test]
    fn test_identity_rate() {
        let table = RateTable::new();
        assert_eq!(
            table
                .resolve(&"EUR".into(), &"EUR".into(), date(2017, 5, 5))
                .unwrap(),
            Decimal::ONE
        );
    }

    #[test]
    fn test_resolve_picks_rate_as_of_date() {
        let table = table();
        let usd: InternedStr = "USD".into();
        let eur: InternedStr = "EUR".into();
        assert_eq!(table.resolve(&usd, &eur, date(2017, 1, 10)).unwrap(), dec!(0.8));
        assert_eq!(table.resolve(&usd, &eur, date(2017, 1, 21)).unwrap(), dec!(0.9));
        assert_eq!(table.resolve(&usd, &eur, date(2017, 3, 1)).unwrap(), dec!(0.9));
        assert!(table.resolve(&usd, &eur, date(2016, 12, 31)).is_err());
    }

    #[test]
    fn test_reciprocal_inserted() {
        let table = table();
        let rate = table
            .resolve(&"EUR".into(), &"USD".into(), date(2017, 1, 10))
            .unwrap();
        assert_eq!(rate, Decimal::ONE / dec!(0.8));
    }

    #[test]
    fn test_prorated_weights_by_days() {
        let table = table();
        // January 2017: 20 days at 0.8, 11 days at 0.9.
        let rate = table
            .prorated(
                &"USD".into(),
                &"EUR".into(),
                DateRange::new(date(2017, 1, 1), date(2017, 1, 31)),
            )
            .unwrap();
        let expected = (dec!(0.8) * dec!(20) + dec!(0.9) * dec!(11)) / dec!(31);
        assert_eq!(rate, expected);
    }

    #[test]
    fn test_prorated_single_subperiod_is_flat() {
        let table = table();
        let rate = table
            .prorated(
                &"USD".into(),
                &"EUR".into(),
                DateRange::new(date(2017, 2, 1), date(2017, 2, 28)),
            )
            .unwrap();
        assert_eq!(rate, dec!(0.9));
    }
}
