//! Inclusive date ranges and period arithmetic.

use chrono::{Datelike, Days, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

/// An inclusive date range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DateRange {
    /// First day of the range.
    pub from: NaiveDate,
    /// Last day of the range.
    pub to: NaiveDate,
}

impl DateRange {
    /// Create a range; `from` must not exceed `to`.
    #[must_use]
    pub const fn new(from: NaiveDate, to: NaiveDate) -> Self {
        Self { from, to }
    }

    /// Whether the range is well-formed.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.from <= self.to
    }

    /// Number of days in the range, endpoints included.
    #[must_use]
    pub fn days(&self) -> i64 {
        (self.to - self.from).num_days() + 1
    }

    /// Whether `date` falls within the range.
    #[must_use]
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.from <= date && date <= self.to
    }

    /// Whether two ranges share at least one day.
    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        self.from <= other.to && other.from <= self.to
    }

    /// Whether the range covers whole calendar months.
    #[must_use]
    pub fn is_month_aligned(&self) -> bool {
        self.from.day() == 1 && self.to.succ_opt().is_some_and(|next| next.day() == 1)
    }

    /// The immediately preceding period of the same shape.
    ///
    /// Month-aligned ranges step back by their whole number of months so
    /// that January follows December correctly; arbitrary ranges step
    /// back by their exact day count.
    #[must_use]
    pub fn preceding(&self) -> Self {
        if self.is_month_aligned() {
            let months = month_span(self.from, self.to);
            let from = self.from - Months::new(months);
            let to = self.from.pred_opt().unwrap_or(self.from);
            Self { from, to }
        } else {
            let span = self.days() as u64;
            Self {
                from: self.from - Days::new(span),
                to: self.to - Days::new(span),
            }
        }
    }

    /// The same range shifted one year back (for same-period-last-year
    /// comparisons). Month-aligned ranges stay month-aligned across leap
    /// years.
    #[must_use]
    pub fn previous_year(&self) -> Self {
        if self.is_month_aligned() {
            let from = self.from - Months::new(12);
            let to_base = self.to.with_day(1).unwrap_or(self.to) - Months::new(12);
            let to = end_of_month(to_base);
            Self { from, to }
        } else {
            Self {
                from: shift_year(self.from, -1),
                to: shift_year(self.to, -1),
            }
        }
    }

    /// The day immediately before the range, if representable.
    #[must_use]
    pub fn day_before(&self) -> Option<NaiveDate> {
        self.from.pred_opt()
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.from, self.to)
    }
}

/// Whole months spanned by a month-aligned range.
fn month_span(from: NaiveDate, to: NaiveDate) -> u32 {
    let months =
        (to.year() - from.year()) * 12 + i32::try_from(to.month()).unwrap_or(0)
            - i32::try_from(from.month()).unwrap_or(0)
            + 1;
    u32::try_from(months.max(1)).unwrap_or(1)
}

/// Last day of the month containing `date`.
fn end_of_month(date: NaiveDate) -> NaiveDate {
    let first = date.with_day(1).unwrap_or(date);
    (first + Months::new(1)).pred_opt().unwrap_or(date)
}

fn shift_year(date: NaiveDate, delta: i32) -> NaiveDate {
    NaiveDate::from_ymd_opt(date.year() + delta, date.month(), date.day())
        .unwrap_or_else(|| end_of_month(
            NaiveDate::from_ymd_opt(date.year() + delta, date.month(), 1)
                .unwrap_or(date),
        ))
}
