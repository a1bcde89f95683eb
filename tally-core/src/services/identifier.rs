//! Identifier engine - deduplication keys for candidate transactions
//!
//! The automatic mode is content addressed: two imports of the same money
//! movement produce the same identifier, whichever way round the bank
//! exported it.

use std::collections::HashMap;

use rust_decimal::{Decimal, RoundingStrategy};

use crate::domain::{AccountRef, CandidateTransaction, DuplicateHandling};

/// Compute the identifier of every candidate, in row order
pub fn assign_identifiers(candidates: &[CandidateTransaction], handling: DuplicateHandling) -> Vec<Option<String>> {
    match handling {
        DuplicateHandling::NoDedup => vec![None; candidates.len()],
        DuplicateHandling::ExplicitColumn => candidates.iter().map(|c| c.identifier.clone()).collect(),
        DuplicateHandling::Automatic => {
            let mut seen: HashMap<String, usize> = HashMap::new();
            candidates
                .iter()
                .map(|candidate| {
                    let base = base_identifier(candidate)?;
                    let ordinal = seen.entry(base.clone()).or_insert(0);
                    *ordinal += 1;
                    Some(format!("{}|{}", base, ordinal))
                })
                .collect()
        }
    }
}

/// `payer→payee|timestamp|magnitude`, before ordinal disambiguation
///
/// `None` when the amount or the date did not parse.
pub fn base_identifier(candidate: &CandidateTransaction) -> Option<String> {
    let amount = candidate.amount_value()?;
    let date_time = candidate.date_time?;

    let (payer, payee, magnitude) = if amount.is_sign_negative() && !amount.is_zero() {
        (&candidate.destination, &candidate.source, -amount)
    } else {
        (&candidate.source, &candidate.destination, amount)
    };

    Some(format!(
        "{}→{}|{}|{}",
        side(payer),
        side(payee),
        date_time.format("%Y-%m-%dT%H:%M:%S"),
        format_magnitude(magnitude)
    ))
}

fn side(account: &AccountRef) -> String {
    match account {
        AccountRef::Resolved(a) => a.id.to_string(),
        AccountRef::Unresolved => "?".to_string(),
        AccountRef::None | AccountRef::Missing => ".".to_string(),
    }
}

/// Round to 4 places and drop trailing zeros: `10.50` -> `10.5`
fn format_magnitude(value: Decimal) -> String {
    value
        .round_dp_with_strategy(4, RoundingStrategy::MidpointAwayFromZero)
        .normalize()
        .to_string()
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use chrono::{NaiveDate, NaiveDateTime};

    use super::*;
    use crate::domain::{Account, InvalidAmount};

    fn at(h: u32, m: u32, s: u32) -> Option<NaiveDateTime> {
        NaiveDate::from_ymd_opt(2024, 1, 2).unwrap().and_hms_opt(h, m, s)
    }

    fn candidate(source: AccountRef, destination: AccountRef, amount: &str) -> CandidateTransaction {
        CandidateTransaction {
            row_number: 1,
            date_text: "2024-01-02".to_string(),
            date_time: at(0, 0, 0),
            description: String::new(),
            category: String::new(),
            source_text: String::new(),
            source,
            destination_text: String::new(),
            destination,
            amount_text: amount.to_string(),
            amount: Decimal::from_str(amount).map_err(|_| InvalidAmount { text: amount.to_string() }),
            identifier: None,
        }
    }

    fn acct(id: i64) -> AccountRef {
        AccountRef::Resolved(Account::new(id, format!("Account {}", id)))
    }

    #[test]
    fn test_base_identifier_scenario() {
        let c = candidate(acct(1), acct(2), "10.50");
        assert_eq!(base_identifier(&c).unwrap(), "1→2|2024-01-02T00:00:00|10.5");
    }

    #[test]
    fn test_sign_invariance() {
        let forward = candidate(acct(1), acct(2), "10");
        let backward = candidate(acct(2), acct(1), "-10");
        assert_eq!(base_identifier(&forward), base_identifier(&backward));
    }

    #[test]
    fn test_side_markers() {
        let c = candidate(AccountRef::Unresolved, AccountRef::Missing, "1");
        assert_eq!(base_identifier(&c).unwrap(), "?→.|2024-01-02T00:00:00|1");

        let c = candidate(AccountRef::None, acct(3), "-2");
        assert_eq!(base_identifier(&c).unwrap(), "3→.|2024-01-02T00:00:00|2");
    }

    #[test]
    fn test_magnitude_rounding() {
        let c = candidate(acct(1), acct(2), "0.123456");
        assert!(base_identifier(&c).unwrap().ends_with("|0.1235"));

        let c = candidate(acct(1), acct(2), "0.00005");
        assert!(base_identifier(&c).unwrap().ends_with("|0.0001"));

        let c = candidate(acct(1), acct(2), "100.0000");
        assert!(base_identifier(&c).unwrap().ends_with("|100"));
    }

    #[test]
    fn test_timestamp_truncated_to_seconds() {
        let mut c = candidate(acct(1), acct(2), "1");
        c.date_time = NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_milli_opt(13, 5, 9, 750);
        assert_eq!(base_identifier(&c).unwrap(), "1→2|2024-01-02T13:05:09|1");
    }

    #[test]
    fn test_unparsed_rows_have_no_identifier() {
        let c = candidate(acct(1), acct(2), "abc");
        assert_eq!(base_identifier(&c), None);

        let mut c = candidate(acct(1), acct(2), "1");
        c.date_time = None;
        assert_eq!(base_identifier(&c), None);
    }

    #[test]
    fn test_ordinal_disambiguation() {
        let rows = vec![
            candidate(acct(1), acct(2), "5"),
            candidate(acct(1), acct(3), "5"),
            candidate(acct(2), acct(1), "-5"),
            candidate(acct(1), acct(2), "abc"),
        ];
        let ids = assign_identifiers(&rows, DuplicateHandling::Automatic);
        assert_eq!(ids[0].as_deref(), Some("1→2|2024-01-02T00:00:00|5|1"));
        assert_eq!(ids[1].as_deref(), Some("1→3|2024-01-02T00:00:00|5|1"));
        assert_eq!(ids[2].as_deref(), Some("1→2|2024-01-02T00:00:00|5|2"));
        assert_eq!(ids[3], None);
    }

    #[test]
    fn test_no_dedup_and_explicit() {
        let mut rows = vec![candidate(acct(1), acct(2), "5")];
        assert_eq!(assign_identifiers(&rows, DuplicateHandling::NoDedup), vec![None]);

        rows[0].identifier = Some("REF-1".to_string());
        assert_eq!(
            assign_identifiers(&rows, DuplicateHandling::ExplicitColumn),
            vec![Some("REF-1".to_string())]
        );
    }
}
