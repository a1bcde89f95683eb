//! Ledger ports - the three remote operations the import pipeline needs
//!
//! Implementations may talk to a server or a local database. Errors returned
//! here are transport errors: the pipeline propagates them and never turns
//! them into per-row failures.

use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;

use crate::domain::result::Result;
use crate::domain::{Account, AccountIdentifierKind, BatchOutcome, CreateTransactionRequest};

/// Account lookup by id, name or account number
#[async_trait]
pub trait AccountSearch: Send + Sync {
    /// Resolve every value of one kind in a single round trip.
    ///
    /// Values missing from the returned map were not found.
    async fn search_accounts(
        &self,
        kind: AccountIdentifierKind,
        values: &BTreeSet<String>,
    ) -> Result<HashMap<String, Account>>;
}

/// Which import identifiers the ledger already holds
#[async_trait]
pub trait DuplicateCheck: Send + Sync {
    async fn find_duplicate_identifiers(&self, identifiers: &BTreeSet<String>) -> Result<BTreeSet<String>>;
}

/// Create many transactions at once
#[async_trait]
pub trait BatchCreate: Send + Sync {
    /// Classify every request as succeeded, failed or duplicate. Each list in
    /// the outcome keeps the input order.
    async fn create_many(&self, requests: &[CreateTransactionRequest]) -> Result<BatchOutcome>;
}

/// A ledger that supports the whole import pipeline
pub trait Ledger: AccountSearch + DuplicateCheck + BatchCreate {}

impl<T: AccountSearch + DuplicateCheck + BatchCreate> Ledger for T {}
