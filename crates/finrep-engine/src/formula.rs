//! Cross-line formula expressions.
//!
//! A formula line computes a signed sum of other lines' aggregate
//! fields, written `code.field [+|- code.field]*`. Formulas are parsed
//! once at definition load; evaluation is pure arithmetic over already
//! resolved operands and never touches the ledger.

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use finrep_core::{AggregateField, InternedStr, Sign};
use thiserror::Error;

/// One signed `code.field` operand.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FormulaTerm {
    /// Contribution sign.
    pub sign: Sign,
    /// The code of the referenced line.
    pub code: InternedStr,
    /// Which aggregate field of the referenced line contributes.
    pub field: AggregateField,
}

/// A parsed formula expression.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FormulaExpr {
    terms: Vec<FormulaTerm>,
}

impl FormulaExpr {
    /// The operands in source order.
    #[must_use]
    pub fn terms(&self) -> &[FormulaTerm] {
        &self.terms
    }

    /// The distinct codes the formula depends on.
    pub fn codes(&self) -> impl Iterator<Item = &InternedStr> {
        self.terms.iter().map(|term| &term.code)
    }

    /// Evaluate against resolved operand values.
    ///
    /// `resolve` maps a referenced code and field to its value for the
    /// column under evaluation.
    pub fn evaluate(&self, mut resolve: impl FnMut(&InternedStr, AggregateField) -> Decimal) -> Decimal {
        self.terms
            .iter()
            .map(|term| term.sign.apply(resolve(&term.code, term.field)))
            .sum()
    }
}

/// A formula string was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormulaParseError {
    /// The formula contains no terms.
    #[error("empty formula")]
    Empty,
    /// A token is not of the form `code.field`.
    #[error("expected `code.field`, found '{0}'")]
    ExpectedTerm(String),
    /// The field part is not debit, credit, or balance.
    #[error("unknown aggregate field '{0}'")]
    UnknownField(String),
    /// The formula ends on a sign.
    #[error("dangling sign at end of formula")]
    DanglingSign,
}

impl FromStr for FormulaExpr {
    type Err = FormulaParseError;

    fn from_str(source: &str) -> Result<Self, Self::Err> {
        let spaced: String = source
            .chars()
            .flat_map(|c| {
                if c == '+' || c == '-' {
                    vec![' ', c, ' ']
                } else {
                    vec![c]
                }
            })
            .collect();

        let mut terms = Vec::new();
        let mut sign = Sign::Plus;
        let mut expect_term = true;
        for token in spaced.split_whitespace() {
            match token {
                "+" if !expect_term => {
                    sign = Sign::Plus;
                    expect_term = true;
                }
                "-" if !expect_term => {
                    sign = Sign::Minus;
                    expect_term = true;
                }
                // A leading sign before the first term.
                "+" | "-" if terms.is_empty() && expect_term => {
                    sign = if token == "+" { Sign::Plus } else { Sign::Minus };
                }
                _ => {
                    let (code, field) = token
                        .split_once('.')
                        .filter(|(code, _)| !code.is_empty())
                        .ok_or_else(|| FormulaParseError::ExpectedTerm(token.to_string()))?;
                    let field = field
                        .parse()
                        .map_err(|_| FormulaParseError::UnknownField(field.to_string()))?;
                    terms.push(FormulaTerm {
                        sign,
                        code: InternedStr::new(code),
                        field,
                    });
                    sign = Sign::Plus;
                    expect_term = false;
                }
            }
        }

        if expect_term && !terms.is_empty() {
            return Err(FormulaParseError::DanglingSign);
        }
        if terms.is_empty() {
            return Err(FormulaParseError::Empty);
        }
        Ok(Self { terms })
    }
}

impl fmt::Display for FormulaExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (position, term) in self.terms.iter().enumerate() {
            match (position, term.sign) {
                (0, Sign::Plus) => {}
                (0, Sign::Minus) => write!(f, "-")?,
                (_, Sign::Plus) => write!(f, " + ")?,
                (_, Sign::Minus) => write!(f, " - ")?,
            }
            write!(f, "{}.{}", term.code, term.field)?;
        }
        Ok(())
    }
}

impl Serialize for FormulaExpr {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for FormulaExpr {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let source = String::deserialize(deserializer)?;
        source.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::collections::HashMap;

    fn expr(source: &str) -> FormulaExpr {
        source.parse().unwrap()
    }

    #[test]
    fn test_parse_signed_sequence() {
        let formula = expr("OPINC.balance + OTHINC.balance - COS.debit");
        let terms = formula.terms();
        assert_eq!(terms.len(), 3);
        assert_eq!(terms[0].sign, Sign::Plus);
        assert_eq!(terms[2].sign, Sign::Minus);
        assert_eq!(terms[2].field, AggregateField::Debit);
        assert_eq!(terms[2].code.as_str(), "COS");
    }

    #[test]
    fn test_parse_without_spaces_and_leading_sign() {
        let formula = expr("-A.balance+B.credit");
        assert_eq!(formula.terms()[0].sign, Sign::Minus);
        assert_eq!(formula.terms()[1].sign, Sign::Plus);
    }

    #[test]
    fn test_parse_rejections() {
        assert_eq!("".parse::<FormulaExpr>(), Err(FormulaParseError::Empty));
        assert_eq!(
            "A.balance +".parse::<FormulaExpr>(),
            Err(FormulaParseError::DanglingSign)
        );
        assert!(matches!(
            "A.total".parse::<FormulaExpr>(),
            Err(FormulaParseError::UnknownField(_))
        ));
        assert!(matches!(
            ".balance".parse::<FormulaExpr>(),
            Err(FormulaParseError::ExpectedTerm(_))
        ));
    }

    #[test]
    fn test_evaluate_is_exact_algebra() {
        let formula = expr("A.balance - B.balance + C.credit");
        let values = HashMap::from([
            (("A".to_string(), AggregateField::Balance), dec!(100.10)),
            (("B".to_string(), AggregateField::Balance), dec!(40.05)),
            (("C".to_string(), AggregateField::Credit), dec!(1.95)),
        ]);
        let total = formula.evaluate(|code, field| values[&(code.to_string(), field)]);
        assert_eq!(total, dec!(62.00));
    }

    #[test]
    fn test_display_round_trip() {
        for source in ["A.balance - B.debit", "-A.balance + B.credit"] {
            let formula = expr(source);
            assert_eq!(formula.to_string(), source);
            assert_eq!(expr(&formula.to_string()), formula);
        }
    }
}
