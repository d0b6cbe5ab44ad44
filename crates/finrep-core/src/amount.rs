//! Amount and aggregate value types.
//!
//! An [`Amount`] pairs a decimal number with a currency code and is used
//! wherever a value is carried in a specific currency (foreign-currency
//! columns, rate conversion). [`AggregateValues`] is the debit / credit /
//! balance / foreign-amount quadruple every ledger aggregation produces.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};

use crate::intern::InternedStr;

/// A decimal quantity paired with a currency.
///
/// # Examples
///
/// ```
/// use finrep_core::Amount;
/// use rust_decimal_macros::dec;
///
/// let amount = Amount::new(dec!(100.00), "USD");
/// assert_eq!(amount.number, dec!(100.00));
/// assert_eq!(amount.currency, "USD");
///
/// let other = Amount::new(dec!(50.00), "USD");
/// let sum = &amount + &other;
/// assert_eq!(sum.number, dec!(150.00));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Amount {
    /// The decimal quantity
    pub number: Decimal,
    /// The currency code (e.g., "USD", "EUR")
    pub currency: InternedStr,
}

impl Amount {
    /// Create a new amount.
    #[must_use]
    pub fn new(number: Decimal, currency: impl Into<InternedStr>) -> Self {
        Self {
            number,
            currency: currency.into(),
        }
    }

    /// Create a zero amount with the given currency.
    #[must_use]
    pub fn zero(currency: impl Into<InternedStr>) -> Self {
        Self {
            number: Decimal::ZERO,
            currency: currency.into(),
        }
    }

    /// Check if the amount is zero.
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.number.is_zero()
    }

    /// Get the absolute value of this amount.
    #[must_use]
    pub fn abs(&self) -> Self {
        Self {
            number: self.number.abs(),
            currency: self.currency.clone(),
        }
    }

    /// Round this amount to the given number of decimal places.
    #[must_use]
    pub fn round_dp(&self, dp: u32) -> Self {
        Self {
            number: self.number.round_dp(dp),
            currency: self.currency.clone(),
        }
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.number, self.currency)
    }
}

impl Add for &Amount {
    type Output = Amount;

    fn add(self, other: &Amount) -> Amount {
        debug_assert_eq!(
            self.currency, other.currency,
            "Cannot add amounts with different currencies"
        );
        Amount {
            number: self.number + other.number,
            currency: self.currency.clone(),
        }
    }
}

impl Sub for &Amount {
    type Output = Amount;

    fn sub(self, other: &Amount) -> Amount {
        debug_assert_eq!(
            self.currency, other.currency,
            "Cannot subtract amounts with different currencies"
        );
        Amount {
            number: self.number - other.number,
            currency: self.currency.clone(),
        }
    }
}

impl Neg for &Amount {
    type Output = Amount;

    fn neg(self) -> Amount {
        Amount {
            number: -self.number,
            currency: self.currency.clone(),
        }
    }
}

impl Add for Amount {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        &self + &other
    }
}

impl Sub for Amount {
    type Output = Self;

    fn sub(self, other: Self) -> Self {
        &self - &other
    }
}

impl Neg for Amount {
    type Output = Self;

    fn neg(self) -> Self {
        -&self
    }
}

impl AddAssign<&Self> for Amount {
    fn add_assign(&mut self, other: &Self) {
        debug_assert_eq!(
            self.currency, other.currency,
            "Cannot add amounts with different currencies"
        );
        self.number += other.number;
    }
}

impl SubAssign<&Self> for Amount {
    fn sub_assign(&mut self, other: &Self) {
        debug_assert_eq!(
            self.currency, other.currency,
            "Cannot subtract amounts with different currencies"
        );
        self.number -= other.number;
    }
}

/// The quadruple produced by every ledger aggregation.
///
/// An aggregation over zero rows is the exact-zero quadruple, never a
/// null. `amount_currency` is only populated when every contributing
/// entry shares exactly one non-company currency.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AggregateValues {
    /// Sum of debits, converted to the target currency.
    pub debit: Decimal,
    /// Sum of credits, converted to the target currency.
    pub credit: Decimal,
    /// `debit - credit`.
    pub balance: Decimal,
    /// Sum in the single shared foreign currency, if there is one.
    pub amount_currency: Option<Amount>,
}

impl AggregateValues {
    /// The exact-zero aggregate.
    #[must_use]
    pub fn zero() -> Self {
        Self::default()
    }

    /// Build from debit and credit totals.
    #[must_use]
    pub fn from_debit_credit(debit: Decimal, credit: Decimal) -> Self {
        Self {
            debit,
            credit,
            balance: debit - credit,
            amount_currency: None,
        }
    }

    /// Check whether every component is zero.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.debit.is_zero()
            && self.credit.is_zero()
            && self.balance.is_zero()
            && self.amount_currency.as_ref().map_or(true, Amount::is_zero)
    }

    /// Accumulate another aggregate into this one.
    ///
    /// Foreign-currency sums survive only while both sides agree on one
    /// currency; a mismatch collapses `amount_currency` to `None`. An
    /// empty side (no contributing rows) leaves the other side's foreign
    /// sum intact.
    pub fn accumulate(&mut self, other: &Self) {
        let self_empty = self.debit.is_zero() && self.credit.is_zero();
        let other_empty = other.debit.is_zero() && other.credit.is_zero();
        self.amount_currency = match (self.amount_currency.take(), other.amount_currency.clone()) {
            (Some(mine), Some(theirs)) if mine.currency == theirs.currency => {
                Some(&mine + &theirs)
            }
            (mine, None) if other_empty => mine,
            (None, theirs) if self_empty => theirs,
            _ => None,
        };
        self.debit += other.debit;
        self.credit += other.credit;
        self.balance += other.balance;
    }

    /// The signed value selected by a field name used in formulas.
    #[must_use]
    pub fn field(&self, field: AggregateField) -> Decimal {
        match field {
            AggregateField::Debit => self.debit,
            AggregateField::Credit => self.credit,
            AggregateField::Balance => self.balance,
        }
    }
}

/// One of the three numeric components of an aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregateField {
    /// The debit total.
    Debit,
    /// The credit total.
    Credit,
    /// `debit - credit`.
    Balance,
}

impl fmt::Display for AggregateField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Debit => write!(f, "debit"),
            Self::Credit => write!(f, "credit"),
            Self::Balance => write!(f, "balance"),
        }
    }
}

impl std::str::FromStr for AggregateField {
    type Err = UnknownFieldError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "debit" => Ok(Self::Debit),
            "credit" => Ok(Self::Credit),
            "balance" => Ok(Self::Balance),
            other => Err(UnknownFieldError(other.to_string())),
        }
    }
}

/// Error returned when parsing an unknown aggregate field name.
#[derive(Debug, Clone, thiserror::Error)]
#[error("unknown aggregate field `{0}` (expected debit, credit or balance)")]
pub struct UnknownFieldError(pub String);
