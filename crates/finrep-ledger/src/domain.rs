//! Aggregation domains.
//!
//! A domain selects which journal entries an aggregation or listing
//! covers: a set of accounts, a set of signed tags, or a generic entry
//! filter. Domains are value types and hash-stable so the engine can use
//! them as cache keys.

use std::collections::BTreeSet;

use finrep_core::{AccountId, InternedStr, JournalEntry, SignedTag};
use serde::{Deserialize, Serialize};

/// The entry-selection part of an aggregation request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    /// Entries posted to any of these accounts.
    Accounts(BTreeSet<AccountId>),
    /// Entries carrying any of these tags; each match contributes with
    /// the sign carried by the entry's own tag reference.
    Tags(BTreeSet<SignedTag>),
    /// Entries matching a generic filter.
    Predicate(EntryFilter),
}

impl Domain {
    /// Domain over a single account.
    #[must_use]
    pub fn account(id: AccountId) -> Self {
        Self::Accounts(BTreeSet::from([id]))
    }

    /// Domain over a set of signed tags.
    #[must_use]
    pub fn tags(tags: impl IntoIterator<Item = SignedTag>) -> Self {
        Self::Tags(tags.into_iter().collect())
    }

    /// The unrestricted domain (matches every entry).
    #[must_use]
    pub fn all() -> Self {
        Self::Predicate(EntryFilter::default())
    }

    /// Whether an entry falls inside this domain, ignoring sign.
    #[must_use]
    pub fn matches(&self, entry: &JournalEntry) -> bool {
        match self {
            Self::Accounts(accounts) => accounts.contains(&entry.account),
            Self::Tags(tags) => entry.tax_tags.iter().any(|t| tags.contains(t)),
            Self::Predicate(filter) => filter.matches(entry),
        }
    }

    /// Narrow this domain with an extra filter (journals, search text).
    ///
    /// Account and tag domains become a predicate carrying the original
    /// restriction intersected with the filter's.
    #[must_use]
    pub fn narrowed(&self, extra: &EntryFilter) -> Self {
        if extra.is_empty() {
            return self.clone();
        }
        let own = match self {
            Self::Accounts(accounts) => EntryFilter {
                accounts: Some(accounts.clone()),
                ..EntryFilter::default()
            },
            Self::Tags(tags) => EntryFilter {
                tags: Some(tags.clone()),
                ..EntryFilter::default()
            },
            Self::Predicate(inner) => inner.clone(),
        };
        Self::Predicate(own.merged(extra))
    }

    /// The account-code prefix restriction, when the domain carries one.
    ///
    /// Prefix matching needs the chart of accounts, so stores apply it
    /// themselves rather than [`EntryFilter::matches`].
    #[must_use]
    pub fn code_prefix(&self) -> Option<&str> {
        match self {
            Self::Predicate(filter) => filter.code_prefix.as_deref(),
            _ => None,
        }
    }
}

/// A generic conjunctive entry filter. Empty fields match everything.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct EntryFilter {
    /// Restrict to these accounts.
    pub accounts: Option<BTreeSet<AccountId>>,
    /// Restrict to entries carrying one of these signed tags.
    pub tags: Option<BTreeSet<SignedTag>>,
    /// Restrict to these journal codes.
    pub journals: Option<BTreeSet<InternedStr>>,
    /// Restrict to these partners.
    pub partners: Option<BTreeSet<InternedStr>>,
    /// Restrict to accounts whose code starts with this prefix. Applied
    /// by the store, which knows the chart of accounts.
    pub code_prefix: Option<String>,
    /// Case-insensitive needle searched in label and partner.
    pub needle: Option<String>,
}

impl EntryFilter {
    /// Whether no restriction is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.accounts.is_none()
            && self.tags.is_none()
            && self.journals.is_none()
            && self.partners.is_none()
            && self.code_prefix.is_none()
            && self.needle.is_none()
    }

    /// Whether an entry passes every set restriction.
    #[must_use]
    pub fn matches(&self, entry: &JournalEntry) -> bool {
        if let Some(accounts) = &self.accounts {
            if !accounts.contains(&entry.account) {
                return false;
            }
        }
        if let Some(tags) = &self.tags {
            if !entry.tax_tags.iter().any(|t| tags.contains(t)) {
                return false;
            }
        }
        if let Some(journals) = &self.journals {
            if !journals.contains(&entry.journal) {
                return false;
            }
        }
        if let Some(partners) = &self.partners {
            match &entry.partner {
                Some(partner) if partners.contains(partner) => {}
                _ => return false,
            }
        }
        if let Some(needle) = &self.needle {
            let needle = needle.to_lowercase();
            let in_label = entry.label.to_lowercase().contains(&needle);
            let in_partner = entry
                .partner
                .as_ref()
                .is_some_and(|p| p.to_lowercase().contains(&needle));
            if !in_label && !in_partner {
                return false;
            }
        }
        true
    }

    /// Conjunction of two filters.
    #[must_use]
    pub fn merged(&self, other: &Self) -> Self {
        fn intersect<T: Ord + Clone>(
            a: &Option<BTreeSet<T>>,
            b: &Option<BTreeSet<T>>,
        ) -> Option<BTreeSet<T>> {
            match (a, b) {
                (Some(a), Some(b)) => Some(a.intersection(b).cloned().collect()),
                (Some(a), None) => Some(a.clone()),
                (None, Some(b)) => Some(b.clone()),
                (None, None) => None,
            }
        }
        Self {
            accounts: intersect(&self.accounts, &other.accounts),
            tags: intersect(&self.tags, &other.tags),
            journals: intersect(&self.journals, &other.journals),
            partners: intersect(&self.partners, &other.partners),
            code_prefix: longer_prefix(&self.code_prefix, &other.code_prefix),
            needle: other.needle.clone().or_else(|| self.needle.clone()),
        }
    }
}

/// The more specific of two compatible prefixes; incompatible prefixes
/// yield an unmatchable sentinel so the conjunction stays empty.
fn longer_prefix(a: &Option<String>, b: &Option<String>) -> Option<String> {
    match (a, b) {
        (Some(a), Some(b)) if a.starts_with(b.as_str()) => Some(a.clone()),
        (Some(a), Some(b)) if b.starts_with(a.as_str()) => Some(b.clone()),
        (Some(_), Some(_)) => Some("\u{0}".to_string()),
        (Some(a), None) => Some(a.clone()),
        (None, Some(b)) => Some(b.clone()),
        (None, None) => None,
    }
}
