//! Field mapper - raw rows to candidate transactions
//!
//! Everything here is pure and total: malformed input turns into sentinel
//! values (`InvalidAmount`, absent date, `AccountRef::None`/`Missing`) for the
//! issue classifier to pick up, never into an error.

use std::str::FromStr;

use rust_decimal::Decimal;

use crate::domain::{
    AccountDirectory, AccountIdentifierKind, AccountMapping, AccountRef, Amount, AmountMapping,
    CandidateTransaction, DuplicateHandling, ImportProfile, InvalidAmount, RawRow, RawTable,
    Resolution,
};
use crate::services::identifier;

/// Map every row and compute identifiers for the whole batch.
///
/// This is the recompute step: call it again whenever the rows, the profile
/// or the directory change. Identifiers depend on row order, so patching
/// individual candidates is never correct.
pub fn map_all(table: &RawTable, profile: &ImportProfile, directory: &AccountDirectory) -> Vec<CandidateTransaction> {
    let drafts: Vec<CandidateTransaction> = table
        .rows
        .iter()
        .enumerate()
        .map(|(i, row)| map_row(i + 1, row, profile, directory))
        .collect();

    let identifiers = identifier::assign_identifiers(&drafts, profile.duplicate_handling);

    drafts
        .into_iter()
        .zip(identifiers)
        .map(|(draft, identifier)| CandidateTransaction { identifier, ..draft })
        .collect()
}

/// Map one row. Automatic identifiers need the whole batch and are left
/// empty here; see [`map_all`].
pub fn map_row(
    row_number: usize,
    row: &RawRow,
    profile: &ImportProfile,
    directory: &AccountDirectory,
) -> CandidateTransaction {
    let date_text = profile
        .date
        .parse_options
        .apply(row.get_opt(profile.date.column.as_deref()));
    let date_time = profile.date.format.parse(&date_text);

    let description = profile
        .description
        .parse_options
        .apply(row.get_opt(profile.description.column.as_deref()));
    let category = profile
        .category
        .parse_options
        .apply(row.get_opt(profile.category.column.as_deref()));

    let source_text = account_text(&profile.source_account, row);
    let source = resolve_account(&profile.source_account, &source_text, directory);
    let destination_text = account_text(&profile.destination_account, row);
    let destination = resolve_account(&profile.destination_account, &destination_text, directory);

    let (amount_text, amount) = decode_amount(&profile.amount, row);

    let identifier = match profile.duplicate_handling {
        DuplicateHandling::ExplicitColumn => {
            let text = profile
                .identifier
                .parse_options
                .apply(row.get_opt(profile.identifier.column.as_deref()));
            Some(text).filter(|t| !t.is_empty())
        }
        DuplicateHandling::NoDedup | DuplicateHandling::Automatic => None,
    };

    CandidateTransaction {
        row_number,
        date_text,
        date_time,
        description,
        category,
        source_text,
        source,
        destination_text,
        destination,
        amount_text,
        amount,
        identifier,
    }
}

/// The text a mapping will look up for this row. Selected accounts use the
/// fixed id; column kinds use the parsed column value.
pub(crate) fn account_text(mapping: &AccountMapping, row: &RawRow) -> String {
    match mapping.kind {
        AccountIdentifierKind::Select => mapping.account_id.map(|id| id.to_string()).unwrap_or_default(),
        _ => mapping.parse_options.apply(row.get_opt(mapping.column.as_deref())),
    }
}

fn resolve_account(mapping: &AccountMapping, text: &str, directory: &AccountDirectory) -> AccountRef {
    if text.is_empty() {
        return AccountRef::None;
    }
    match directory.lookup(mapping.kind, text) {
        Some(Resolution::Resolved(account)) => AccountRef::Resolved(account.clone()),
        Some(Resolution::Missing) => AccountRef::Missing,
        Some(Resolution::Unresolved) | None => AccountRef::Unresolved,
    }
}

/// Decode the amount, returning the text it was decoded from
fn decode_amount(mapping: &AmountMapping, row: &RawRow) -> (String, Amount) {
    let debit_text = mapping
        .debit_parse_options
        .apply(row.get_opt(mapping.debit_column.as_deref()));

    if !mapping.separate_credit_debit_columns {
        let amount = parse_decimal(&debit_text, &mapping.decimal_separator);
        return (debit_text, amount);
    }

    let debit = parse_decimal(&debit_text, &mapping.decimal_separator);
    if !debit_text.is_empty() && debit.is_ok() {
        return (debit_text, debit);
    }

    let credit_text = mapping
        .credit_parse_options
        .apply(row.get_opt(mapping.credit_column.as_deref()));
    let credit = parse_decimal(&credit_text, &mapping.decimal_separator).map(negate);
    (credit_text, credit)
}

fn negate(value: Decimal) -> Decimal {
    if value.is_zero() {
        Decimal::ZERO
    } else {
        -value
    }
}

/// Keep digits, `-` and the decimal separator, then parse with `.` as the
/// separator. Thousands separators and currency symbols fall away.
pub fn parse_decimal(text: &str, decimal_separator: &str) -> Amount {
    let separator = decimal_separator.chars().next().unwrap_or('.');

    let cleaned: String = text
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '-' || *c == separator)
        .map(|c| if c == separator { '.' } else { c })
        .collect();

    Decimal::from_str(&cleaned).map_err(|_| InvalidAmount {
        text: text.to_string(),
    })
}
