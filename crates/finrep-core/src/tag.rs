//! Tax report tags.
//!
//! A tag is a signed label placed on tax repartition lines; it routes
//! amounts into report lines without referencing accounts directly. The
//! same tag can appear with a plus sign on one repartition line and a
//! minus sign on another, so a tag reference always carries its sign.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identifier of a tax report tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TagId(pub u32);

impl fmt::Display for TagId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The sign a tag reference carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sign {
    /// The entry balance contributes as-is.
    Plus,
    /// The entry balance contributes negated.
    Minus,
}

impl Sign {
    /// Apply this sign to a value.
    #[must_use]
    pub fn apply(self, value: Decimal) -> Decimal {
        match self {
            Self::Plus => value,
            Self::Minus => -value,
        }
    }
}

/// A signed tag reference as it appears on a journal entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SignedTag {
    /// The referenced tag.
    pub tag: TagId,
    /// Contribution sign.
    pub sign: Sign,
}

impl SignedTag {
    /// A `+tag` reference.
    #[must_use]
    pub const fn plus(tag: TagId) -> Self {
        Self {
            tag,
            sign: Sign::Plus,
        }
    }

    /// A `-tag` reference.
    #[must_use]
    pub const fn minus(tag: TagId) -> Self {
        Self {
            tag,
            sign: Sign::Minus,
        }
    }
}

impl fmt::Display for SignedTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.sign {
            Sign::Plus => write!(f, "+{}", self.tag),
            Sign::Minus => write!(f, "-{}", self.tag),
        }
    }
}
