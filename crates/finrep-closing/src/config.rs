//! Closing configuration.
//!
//! Routing tables the closing workflow reads: which tags participate in
//! the closing, which account each tag's balance is posted to, and the
//! payable/receivable account the counterpart lands on per company.

use std::collections::HashMap;

use finrep_core::{AccountId, CompanyId, TagId};
use serde::{Deserialize, Serialize};

/// Closing routing for one tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagRule {
    /// Whether the tag's balance is swept by the closing at all.
    pub use_in_closing: bool,
    /// Account the swept balance is posted to.
    pub destination: AccountId,
}

/// Per-tag and per-company closing routing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClosingConfig {
    #[serde(default)]
    tags: HashMap<TagId, TagRule>,
    #[serde(default)]
    closing_accounts: HashMap<CompanyId, AccountId>,
}

impl ClosingConfig {
    /// An empty configuration; nothing closes under it.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Route a tag into the closing, posting its balance to `destination`.
    #[must_use]
    pub fn route(mut self, tag: TagId, destination: AccountId) -> Self {
        self.tags.insert(
            tag,
            TagRule {
                use_in_closing: true,
                destination,
            },
        );
        self
    }

    /// Keep a tag out of the closing while remembering its destination.
    #[must_use]
    pub fn exclude(mut self, tag: TagId, destination: AccountId) -> Self {
        self.tags.insert(
            tag,
            TagRule {
                use_in_closing: false,
                destination,
            },
        );
        self
    }

    /// Set the counterpart closing account of a company.
    #[must_use]
    pub fn closing_account(mut self, company: CompanyId, account: AccountId) -> Self {
        self.closing_accounts.insert(company, account);
        self
    }

    /// The destination of a tag, when it participates in the closing.
    #[must_use]
    pub fn destination(&self, tag: TagId) -> Option<AccountId> {
        self.tags
            .get(&tag)
            .filter(|rule| rule.use_in_closing)
            .map(|rule| rule.destination)
    }

    /// The configured closing account of a company.
    #[must_use]
    pub fn closing_account_of(&self, company: CompanyId) -> Option<AccountId> {
        self.closing_accounts.get(&company).copied()
    }
}
