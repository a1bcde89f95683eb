//! Account resolver - turns raw account references into ledger accounts

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use tracing::debug;

use crate::domain::result::Result;
use crate::domain::{
    AccountDirectory, AccountIdentifierKind, AccountReference, DirectoryPatch, ImportProfile, RawTable,
    Resolution,
};
use crate::ports::AccountSearch;
use crate::services::mapper::account_text;

/// Resolves account references against the ledger's account search
pub struct AccountResolver {
    search: Arc<dyn AccountSearch>,
}

impl AccountResolver {
    pub fn new(search: Arc<dyn AccountSearch>) -> Self {
        Self { search }
    }

    /// Every reference the profile will look up for these rows.
    ///
    /// Uses the same parsed text as the field mapper, so each lookup the
    /// mapper makes is covered.
    pub fn references(table: &RawTable, profile: &ImportProfile) -> BTreeSet<AccountReference> {
        let mut references = BTreeSet::new();

        for mapping in [&profile.source_account, &profile.destination_account] {
            if let (AccountIdentifierKind::Select, Some(id)) = (mapping.kind, mapping.account_id) {
                references.insert((AccountIdentifierKind::Id, id.to_string()));
                continue;
            }
            if mapping.kind == AccountIdentifierKind::Select || mapping.column.is_none() {
                continue;
            }
            for row in &table.rows {
                let text = account_text(mapping, row);
                if !text.is_empty() {
                    references.insert((mapping.kind.lookup_kind(), text));
                }
            }
        }

        references
    }

    /// Look up every reference that is absent or still in flight.
    ///
    /// One search per kind covers all of that kind's values. Values the
    /// search does not return become `Missing`. References that are already
    /// settled are skipped, so calling this again is a no-op.
    pub async fn ensure_resolved(
        &self,
        directory: &AccountDirectory,
        references: &BTreeSet<AccountReference>,
    ) -> Result<DirectoryPatch> {
        let mut by_kind: BTreeMap<AccountIdentifierKind, BTreeSet<String>> = BTreeMap::new();
        for (kind, value) in references {
            match directory.lookup(*kind, value) {
                None | Some(Resolution::Unresolved) => {
                    by_kind.entry(kind.lookup_kind()).or_default().insert(value.clone());
                }
                Some(_) => {}
            }
        }

        let mut patch = DirectoryPatch::new();
        for (kind, values) in by_kind {
            debug!("Searching {} account(s) by {}", values.len(), kind);
            let found = self.search.search_accounts(kind, &values).await?;
            for value in values {
                let resolution = match found.get(&value) {
                    Some(account) => Resolution::Resolved(account.clone()),
                    None => Resolution::Missing,
                };
                patch.insert(kind, value, resolution);
            }
        }

        Ok(patch)
    }

    /// Resolve everything the profile needs and return the merged directory
    pub async fn resolve(
        &self,
        directory: &AccountDirectory,
        table: &RawTable,
        profile: &ImportProfile,
    ) -> Result<AccountDirectory> {
        let references = Self::references(table, profile);
        let patch = self.ensure_resolved(directory, &references).await?;
        Ok(directory.merge(&patch))
    }
}
