//! Server-facing shapes for batch creation

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::candidate::CandidateTransaction;

/// One transaction to create in the ledger
///
/// Rows rejected before submission still produce a request (with `None` for
/// whatever failed to parse) so that every outcome list has the same shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTransactionRequest {
    pub row_number: usize,
    pub identifier: Option<String>,
    pub date: Option<NaiveDateTime>,
    pub amount: Option<Decimal>,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub source_account_id: Option<i64>,
    pub destination_account_id: Option<i64>,
}

impl From<&CandidateTransaction> for CreateTransactionRequest {
    fn from(candidate: &CandidateTransaction) -> Self {
        Self {
            row_number: candidate.row_number,
            identifier: candidate.identifier.clone(),
            date: candidate.date_time,
            amount: candidate.amount_value(),
            description: candidate.description.clone(),
            category: Some(candidate.category.clone()).filter(|c| !c.is_empty()),
            source_account_id: candidate.source.account_id(),
            destination_account_id: candidate.destination.account_id(),
        }
    }
}

/// The ledger's classification of one submitted batch
///
/// Each list is an order-preserving subsequence of the submitted requests.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchOutcome {
    pub succeeded: Vec<CreateTransactionRequest>,
    pub failed: Vec<CreateTransactionRequest>,
    pub duplicate: Vec<CreateTransactionRequest>,
}

impl BatchOutcome {
    pub fn len(&self) -> usize {
        self.succeeded.len() + self.failed.len() + self.duplicate.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
