//! Account directory - what each raw account reference resolved to
//!
//! The directory is an immutable snapshot. Resolution results arrive as a
//! [`DirectoryPatch`] and are folded in with [`AccountDirectory::merge`],
//! which returns a new snapshot. Entries are never removed.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use super::account::{Account, AccountIdentifierKind};

/// A raw account reference: how to look it up and the parsed column text
pub type AccountReference = (AccountIdentifierKind, String);

/// The state of one reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "account", rename_all = "camelCase")]
pub enum Resolution {
    Resolved(Account),
    /// Lookup in flight
    Unresolved,
    /// Searched, not found
    Missing,
}

/// New resolution results for a set of references
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectoryPatch {
    entries: BTreeMap<AccountReference, Resolution>,
}

impl DirectoryPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, kind: AccountIdentifierKind, value: impl Into<String>, resolution: Resolution) {
        self.entries.insert((kind.lookup_kind(), value.into()), resolution);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&AccountReference, &Resolution)> {
        self.entries.iter()
    }
}

/// Snapshot of `kind -> raw value -> resolution`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountDirectory {
    entries: BTreeMap<AccountReference, Resolution>,
}

impl AccountDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a fully resolved directory from a list of accounts, indexed by
    /// every searchable kind
    pub fn from_accounts<'a>(accounts: impl IntoIterator<Item = &'a Account>) -> Self {
        let mut patch = DirectoryPatch::new();
        for account in accounts {
            for kind in AccountIdentifierKind::SEARCHABLE {
                if let Some(value) = account.identifier(kind) {
                    patch.insert(kind, value, Resolution::Resolved(account.clone()));
                }
            }
        }
        Self::new().merge(&patch)
    }

    /// Look up a reference. `None` means it was never requested.
    pub fn lookup(&self, kind: AccountIdentifierKind, value: &str) -> Option<&Resolution> {
        self.entries.get(&(kind.lookup_kind(), value.to_string()))
    }

    pub fn contains(&self, kind: AccountIdentifierKind, value: &str) -> bool {
        self.lookup(kind, value).is_some()
    }

    /// References that are not in the directory at all
    pub fn unknown<'a>(
        &self,
        references: impl IntoIterator<Item = &'a AccountReference>,
    ) -> BTreeSet<AccountReference> {
        references
            .into_iter()
            .filter(|(kind, value)| !self.contains(*kind, value))
            .map(|(kind, value)| (kind.lookup_kind(), value.clone()))
            .collect()
    }

    /// Apply a patch, returning the new snapshot
    ///
    /// A patch may settle an `Unresolved` entry or correct an earlier result,
    /// but it never downgrades a settled entry back to `Unresolved`.
    pub fn merge(&self, patch: &DirectoryPatch) -> Self {
        let mut entries = self.entries.clone();
        for (reference, resolution) in patch.iter() {
            match (entries.get(reference), resolution) {
                (Some(Resolution::Resolved(_)) | Some(Resolution::Missing), Resolution::Unresolved) => {}
                _ => {
                    entries.insert(reference.clone(), resolution.clone());
                }
            }
        }
        Self { entries }
    }

    /// Mark references as in flight. Known references are left alone.
    pub fn mark_pending<'a>(&self, references: impl IntoIterator<Item = &'a AccountReference>) -> Self {
        let mut patch = DirectoryPatch::new();
        for (kind, value) in self.unknown(references) {
            patch.insert(kind, value, Resolution::Unresolved);
        }
        self.merge(&patch)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of references still in flight
    pub fn pending_count(&self) -> usize {
        self.entries
            .values()
            .filter(|r| matches!(r, Resolution::Unresolved))
            .count()
    }
}
