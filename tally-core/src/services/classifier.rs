//! Issue classifier - stateless predicates over candidate transactions

use std::collections::{BTreeSet, HashMap};

use serde::Serialize;

use crate::domain::CandidateTransaction;

/// Problems found on one row
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueFlags {
    /// Neither source nor destination is (or will be) an account
    pub no_account: bool,
    /// Source and destination are the same account
    pub same_account: bool,
    /// Amount or date did not parse
    pub parse_error: bool,
    /// The identifier is already taken
    pub duplicate: bool,
}

impl IssueFlags {
    pub fn any(&self) -> bool {
        self.no_account || self.same_account || self.parse_error || self.duplicate
    }

    /// Rows that are never sent to the ledger
    pub fn blocks_import(&self) -> bool {
        self.parse_error || self.same_account
    }

    /// Human-readable reasons, for previews and tooltips
    pub fn reasons(&self) -> Vec<&'static str> {
        let mut reasons = Vec::new();
        if self.no_account {
            reasons.push("no source or destination account");
        }
        if self.same_account {
            reasons.push("source and destination are the same account");
        }
        if self.parse_error {
            reasons.push("amount or date could not be parsed");
        }
        if self.duplicate {
            reasons.push("already imported");
        }
        reasons
    }
}

pub fn no_account(candidate: &CandidateTransaction) -> bool {
    candidate.source.is_absent() && candidate.destination.is_absent()
}

pub fn same_account(candidate: &CandidateTransaction) -> bool {
    match (candidate.source.account_id(), candidate.destination.account_id()) {
        (Some(source), Some(destination)) => source == destination,
        _ => false,
    }
}

pub fn parse_error(candidate: &CandidateTransaction) -> bool {
    !candidate.is_parsed()
}

pub fn duplicate(candidate: &CandidateTransaction, duplicate_ids: &BTreeSet<String>) -> bool {
    candidate
        .identifier
        .as_ref()
        .map_or(false, |id| duplicate_ids.contains(id))
}

/// Never submitted: the ledger cannot accept it
pub fn is_locally_rejected(candidate: &CandidateTransaction) -> bool {
    parse_error(candidate) || same_account(candidate)
}

pub fn classify_one(candidate: &CandidateTransaction, duplicate_ids: &BTreeSet<String>) -> IssueFlags {
    IssueFlags {
        no_account: no_account(candidate),
        same_account: same_account(candidate),
        parse_error: parse_error(candidate),
        duplicate: duplicate(candidate, duplicate_ids),
    }
}

/// Flags for every candidate, in row order
pub fn classify(candidates: &[CandidateTransaction], duplicate_ids: &BTreeSet<String>) -> Vec<IssueFlags> {
    candidates
        .iter()
        .map(|c| classify_one(c, duplicate_ids))
        .collect()
}

/// Identifiers to treat as duplicates: those the ledger already holds plus
/// those used by more than one candidate in this batch
pub fn known_duplicates(
    candidates: &[CandidateTransaction],
    ledger_duplicates: &BTreeSet<String>,
) -> BTreeSet<String> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for id in candidates.iter().filter_map(|c| c.identifier.as_deref()) {
        *counts.entry(id).or_insert(0) += 1;
    }

    let mut duplicates = ledger_duplicates.clone();
    duplicates.extend(
        counts
            .into_iter()
            .filter(|(_, count)| *count > 1)
            .map(|(id, _)| id.to_string()),
    );
    duplicates
}

/// Distinct identifiers of a batch, for the ledger duplicate check
pub fn identifier_set(candidates: &[CandidateTransaction]) -> BTreeSet<String> {
    candidates
        .iter()
        .filter_map(|c| c.identifier.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    use super::*;
    use crate::domain::{Account, AccountRef, InvalidAmount};

    fn candidate(source: AccountRef, destination: AccountRef) -> CandidateTransaction {
        CandidateTransaction {
            row_number: 1,
            date_text: "2024-01-02".to_string(),
            date_time: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap().and_hms_opt(0, 0, 0),
            description: "Rent".to_string(),
            category: String::new(),
            source_text: String::new(),
            source,
            destination_text: String::new(),
            destination,
            amount_text: "1".to_string(),
            amount: Ok(Decimal::from_str("1").unwrap()),
            identifier: None,
        }
    }

    fn acct(id: i64) -> AccountRef {
        AccountRef::Resolved(Account::new(id, "x"))
    }

    #[test]
    fn test_no_account() {
        let c = candidate(AccountRef::None, AccountRef::Missing);
        let flags = classify_one(&c, &BTreeSet::new());
        assert!(flags.no_account);
        assert!(!flags.blocks_import());

        // In-flight lookups may still resolve
        let c = candidate(AccountRef::None, AccountRef::Unresolved);
        assert!(!no_account(&c));
    }

    #[test]
    fn test_same_account() {
        let c = candidate(acct(4), acct(4));
        let flags = classify_one(&c, &BTreeSet::new());
        assert!(flags.same_account);
        assert!(flags.blocks_import());
        assert!(!same_account(&candidate(acct(4), acct(5))));
    }

    #[test]
    fn test_parse_error() {
        let mut c = candidate(acct(1), acct(2));
        c.amount = Err(InvalidAmount { text: "x".to_string() });
        assert!(parse_error(&c));
        assert!(is_locally_rejected(&c));

        let mut c = candidate(acct(1), acct(2));
        c.date_time = None;
        assert!(classify_one(&c, &BTreeSet::new()).parse_error);
    }

    #[test]
    fn test_duplicate() {
        let mut c = candidate(acct(1), acct(2));
        c.identifier = Some("abc".to_string());
        let dups: BTreeSet<String> = ["abc".to_string()].into();
        let flags = classify_one(&c, &dups);
        assert!(flags.duplicate);
        assert_eq!(flags.reasons(), vec!["already imported"]);
        assert!(!flags.blocks_import());
    }

    #[test]
    fn test_known_duplicates_include_intra_batch() {
        let mut a = candidate(acct(1), acct(2));
        a.identifier = Some("REF-1".to_string());
        let mut b = candidate(acct(1), acct(2));
        b.identifier = Some("REF-1".to_string());
        let mut c = candidate(acct(1), acct(2));
        c.identifier = Some("REF-2".to_string());

        let ledger: BTreeSet<String> = ["REF-9".to_string()].into();
        let known = known_duplicates(&[a, b, c], &ledger);
        assert!(known.contains("REF-1"));
        assert!(known.contains("REF-9"));
        assert!(!known.contains("REF-2"));
    }

    #[test]
    fn test_clean_row_has_no_flags() {
        let flags = classify(&[candidate(acct(1), acct(2))], &BTreeSet::new());
        assert!(!flags[0].any());
        assert!(flags[0].reasons().is_empty());
    }
}
