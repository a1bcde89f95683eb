//! Scripted in-memory ledger for testing
//!
//! Implements all three ledger ports, records every call, and can be told to
//! fail a given batch or every account search to simulate an outage.

use std::collections::{BTreeSet, HashMap};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::domain::result::{Error, Result};
use crate::domain::{Account, AccountIdentifierKind, BatchOutcome, CreateTransactionRequest};
use crate::ports::{AccountSearch, BatchCreate, DuplicateCheck};

pub struct MockLedger {
    accounts: Vec<Account>,
    identifiers: Mutex<BTreeSet<String>>,
    search_calls: Mutex<Vec<(AccountIdentifierKind, BTreeSet<String>)>>,
    batch_calls: Mutex<Vec<Vec<CreateTransactionRequest>>>,
    /// 1-based index of the create_many call that fails
    fail_batch: Option<usize>,
    fail_search: bool,
}

impl MockLedger {
    pub fn with_accounts(accounts: Vec<Account>) -> Self {
        Self {
            accounts,
            identifiers: Mutex::new(BTreeSet::new()),
            search_calls: Mutex::new(Vec::new()),
            batch_calls: Mutex::new(Vec::new()),
            fail_batch: None,
            fail_search: false,
        }
    }

    /// Identifiers the ledger already holds
    pub fn with_identifiers(self, identifiers: &[&str]) -> Self {
        self.identifiers
            .lock()
            .unwrap()
            .extend(identifiers.iter().map(|s| s.to_string()));
        self
    }

    pub fn failing_batch(mut self, call: usize) -> Self {
        self.fail_batch = Some(call);
        self
    }

    pub fn failing_search(mut self) -> Self {
        self.fail_search = true;
        self
    }

    pub fn search_calls(&self) -> Vec<(AccountIdentifierKind, BTreeSet<String>)> {
        self.search_calls.lock().unwrap().clone()
    }

    pub fn batch_calls(&self) -> Vec<Vec<CreateTransactionRequest>> {
        self.batch_calls.lock().unwrap().clone()
    }

    pub fn stored_identifiers(&self) -> BTreeSet<String> {
        self.identifiers.lock().unwrap().clone()
    }
}

#[async_trait]
impl AccountSearch for MockLedger {
    async fn search_accounts(
        &self,
        kind: AccountIdentifierKind,
        values: &BTreeSet<String>,
    ) -> Result<HashMap<String, Account>> {
        self.search_calls.lock().unwrap().push((kind, values.clone()));
        if self.fail_search {
            return Err(Error::transport("account search unavailable"));
        }

        Ok(self
            .accounts
            .iter()
            .filter_map(|a| a.identifier(kind).map(|v| (v, a)))
            .filter(|(v, _)| values.contains(v))
            .map(|(v, a)| (v, a.clone()))
            .collect())
    }
}

#[async_trait]
impl DuplicateCheck for MockLedger {
    async fn find_duplicate_identifiers(&self, identifiers: &BTreeSet<String>) -> Result<BTreeSet<String>> {
        let stored = self.identifiers.lock().unwrap();
        Ok(identifiers.intersection(&stored).cloned().collect())
    }
}

#[async_trait]
impl BatchCreate for MockLedger {
    async fn create_many(&self, requests: &[CreateTransactionRequest]) -> Result<BatchOutcome> {
        let call = {
            let mut calls = self.batch_calls.lock().unwrap();
            calls.push(requests.to_vec());
            calls.len()
        };
        if self.fail_batch == Some(call) {
            return Err(Error::transport(format!("batch {} timed out", call)));
        }

        let mut stored = self.identifiers.lock().unwrap();
        let mut outcome = BatchOutcome::default();
        for request in requests {
            let unusable = request.amount.is_none()
                || request.date.is_none()
                || (request.source_account_id.is_none() && request.destination_account_id.is_none());

            if unusable {
                outcome.failed.push(request.clone());
            } else if let Some(id) = &request.identifier {
                if stored.insert(id.clone()) {
                    outcome.succeeded.push(request.clone());
                } else {
                    outcome.duplicate.push(request.clone());
                }
            } else {
                outcome.succeeded.push(request.clone());
            }
        }
        Ok(outcome)
    }
}
