//! Candidate transaction - one CSV row mapped into ledger-shaped fields

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;

use super::account::Account;

/// The cleaned amount text did not parse as a decimal
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("invalid amount: '{text}'")]
pub struct InvalidAmount {
    pub text: String,
}

/// A decoded amount or the reason it could not be decoded
pub type Amount = std::result::Result<Decimal, InvalidAmount>;

/// What a row's account reference resolved to
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "account", rename_all = "camelCase")]
pub enum AccountRef {
    /// No reference in the row (blank column, or no column configured)
    None,
    /// Lookup still in flight
    Unresolved,
    /// Searched, no such account
    Missing,
    Resolved(Account),
}

impl AccountRef {
    pub fn account(&self) -> Option<&Account> {
        match self {
            Self::Resolved(account) => Some(account),
            _ => None,
        }
    }

    pub fn account_id(&self) -> Option<i64> {
        self.account().map(|a| a.id)
    }

    /// True when there is no account and none is coming
    pub fn is_absent(&self) -> bool {
        matches!(self, Self::None | Self::Missing)
    }
}

/// One row's pure-function mapping, before submission
///
/// Candidates are always rebuilt from `(rows, profile, directory)`; nothing
/// edits one in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateTransaction {
    /// 1-based data row number (header excluded)
    pub row_number: usize,
    pub date_text: String,
    pub date_time: Option<NaiveDateTime>,
    pub description: String,
    pub category: String,
    pub source_text: String,
    pub source: AccountRef,
    pub destination_text: String,
    pub destination: AccountRef,
    pub amount_text: String,
    pub amount: Amount,
    pub identifier: Option<String>,
}

impl CandidateTransaction {
    pub fn amount_value(&self) -> Option<Decimal> {
        self.amount.as_ref().ok().copied()
    }

    /// The date and amount both decoded
    pub fn is_parsed(&self) -> bool {
        self.amount.is_ok() && self.date_time.is_some()
    }
}
