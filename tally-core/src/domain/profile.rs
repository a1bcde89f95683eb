//! Import profile - which column feeds which ledger field, and how to clean it
//!
//! Stored in settings.json under `importProfiles`:
//! ```json
//! {
//!   "date": { "column": "Booking date", "format": "dd.MM.yyyy" },
//!   "description": { "column": "Text" },
//!   "sourceAccount": { "kind": "select", "accountId": 1 },
//!   "destinationAccount": { "kind": "name", "column": "Counterparty" },
//!   "amount": { "debitColumn": "Amount", "decimalSeparator": "," },
//!   "duplicateHandling": "automatic"
//! }
//! ```

use serde::{Deserialize, Serialize};

use super::account::AccountIdentifierKind;
use super::date_format::DateFormat;
use super::parse_options::ParseOptions;
use super::result::{Error, Result};

/// A plain text field: optional column plus its parse options
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldMapping {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,
    #[serde(default)]
    pub parse_options: ParseOptions,
}

impl FieldMapping {
    pub fn column(column: impl Into<String>) -> Self {
        Self {
            column: Some(column.into()),
            parse_options: ParseOptions::default(),
        }
    }

    pub fn with_parse_options(mut self, parse_options: ParseOptions) -> Self {
        self.parse_options = parse_options;
        self
    }
}

/// The date field
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DateMapping {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,
    #[serde(default)]
    pub format: DateFormat,
    #[serde(default)]
    pub parse_options: ParseOptions,
}

/// Source or destination account
///
/// With kind `select`, `account_id` names the fixed account and `column` is
/// unused. With any other kind, `column` is read and `account_id` is unused;
/// a column kind without a column means "no account" for every row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountMapping {
    pub kind: AccountIdentifierKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_id: Option<i64>,
    #[serde(default)]
    pub parse_options: ParseOptions,
}

impl AccountMapping {
    /// A fixed account for every row
    pub fn select(account_id: i64) -> Self {
        Self {
            kind: AccountIdentifierKind::Select,
            column: None,
            account_id: Some(account_id),
            parse_options: ParseOptions::default(),
        }
    }

    /// Read `column` and match accounts by `kind`
    pub fn column(kind: AccountIdentifierKind, column: impl Into<String>) -> Self {
        Self {
            kind,
            column: Some(column.into()),
            account_id: None,
            parse_options: ParseOptions::default(),
        }
    }

    pub fn with_parse_options(mut self, parse_options: ParseOptions) -> Self {
        self.parse_options = parse_options;
        self
    }

    fn validate(&self, field: &str, problems: &mut Vec<String>) {
        match self.kind {
            AccountIdentifierKind::Select => {
                if self.account_id.is_none() {
                    problems.push(format!("{}: a selected account needs an account id", field));
                }
                if self.column.is_some() {
                    problems.push(format!("{}: a selected account cannot also read a column", field));
                }
            }
            kind => {
                if self.account_id.is_some() {
                    problems.push(format!("{}: kind '{}' cannot also name a fixed account", field, kind));
                }
            }
        }
    }
}

impl Default for AccountMapping {
    /// No account: a column-kind mapping without a column reads "" for every row
    fn default() -> Self {
        Self {
            kind: AccountIdentifierKind::Name,
            column: None,
            account_id: None,
            parse_options: ParseOptions::default(),
        }
    }
}

/// Debit/credit amount columns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AmountMapping {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debit_column: Option<String>,
    #[serde(default)]
    pub debit_parse_options: ParseOptions,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credit_column: Option<String>,
    #[serde(default)]
    pub credit_parse_options: ParseOptions,
    /// When false only the debit column is used, sign as given
    #[serde(default)]
    pub separate_credit_debit_columns: bool,
    #[serde(default = "default_decimal_separator")]
    pub decimal_separator: String,
}

fn default_decimal_separator() -> String {
    ".".to_string()
}

impl Default for AmountMapping {
    fn default() -> Self {
        Self {
            debit_column: None,
            debit_parse_options: ParseOptions::default(),
            credit_column: None,
            credit_parse_options: ParseOptions::default(),
            separate_credit_debit_columns: false,
            decimal_separator: default_decimal_separator(),
        }
    }
}

/// How import identifiers are produced
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DuplicateHandling {
    /// No identifier, nothing is deduplicated
    NoDedup,
    /// The identifier is read from a column
    ExplicitColumn,
    /// The identifier is derived from accounts, timestamp and magnitude
    #[default]
    Automatic,
}

/// The full column-to-field mapping for one CSV import
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportProfile {
    #[serde(default)]
    pub date: DateMapping,
    #[serde(default)]
    pub description: FieldMapping,
    #[serde(default)]
    pub category: FieldMapping,
    #[serde(default)]
    pub source_account: AccountMapping,
    #[serde(default)]
    pub destination_account: AccountMapping,
    #[serde(default)]
    pub amount: AmountMapping,
    #[serde(default)]
    pub duplicate_handling: DuplicateHandling,
    #[serde(default)]
    pub identifier: FieldMapping,
}

impl ImportProfile {
    /// Check the cross-field invariants. Regexes are already compiled by the
    /// time a profile exists, so only structural problems are reported here.
    pub fn validate(&self) -> Result<()> {
        let mut problems = Vec::new();

        self.source_account.validate("sourceAccount", &mut problems);
        self.destination_account.validate("destinationAccount", &mut problems);

        let has_identifier_column = self.identifier.column.as_deref().map_or(false, |c| !c.is_empty());
        match self.duplicate_handling {
            DuplicateHandling::ExplicitColumn if !has_identifier_column => {
                problems.push("identifier: explicit column handling needs a column".to_string());
            }
            DuplicateHandling::NoDedup | DuplicateHandling::Automatic if has_identifier_column => {
                problems.push("identifier: a column is only used with explicit column handling".to_string());
            }
            _ => {}
        }

        if self.amount.decimal_separator.chars().count() != 1 {
            problems.push("amount: decimal separator must be a single character".to_string());
        }
        if self.amount.separate_credit_debit_columns && self.amount.credit_column.is_none() {
            problems.push("amount: separate credit/debit columns need a credit column".to_string());
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(Error::config(problems.join("; ")))
        }
    }

    /// Parse and validate a profile from JSON
    pub fn from_json(json: &str) -> Result<Self> {
        let profile: Self =
            serde_json::from_str(json).map_err(|e| Error::config(format!("invalid profile: {}", e)))?;
        profile.validate()?;
        Ok(profile)
    }

    /// The account mappings that read a column, with the column name
    pub fn account_columns(&self) -> impl Iterator<Item = (&AccountMapping, &str)> {
        [&self.source_account, &self.destination_account]
            .into_iter()
            .filter(|m| m.kind != AccountIdentifierKind::Select)
            .filter_map(|m| m.column.as_deref().map(|c| (m, c)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_profile() -> ImportProfile {
        ImportProfile {
            date: DateMapping {
                column: Some("Date".to_string()),
                ..Default::default()
            },
            source_account: AccountMapping::select(1),
            destination_account: AccountMapping::column(AccountIdentifierKind::Name, "Payee"),
            amount: AmountMapping {
                debit_column: Some("Amount".to_string()),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_valid_profile() {
        assert!(valid_profile().validate().is_ok());
    }

    #[test]
    fn test_select_requires_account_id() {
        let mut profile = valid_profile();
        profile.source_account.account_id = None;
        let err = profile.validate().unwrap_err().to_string();
        assert!(err.contains("sourceAccount"));
    }

    #[test]
    fn test_column_kind_rejects_fixed_id() {
        let mut profile = valid_profile();
        profile.destination_account.account_id = Some(3);
        assert!(profile.validate().is_err());
    }

    #[test]
    fn test_identifier_column_iff_explicit() {
        let mut profile = valid_profile();
        profile.duplicate_handling = DuplicateHandling::ExplicitColumn;
        assert!(profile.validate().is_err());

        profile.identifier = FieldMapping::column("Reference");
        assert!(profile.validate().is_ok());

        profile.duplicate_handling = DuplicateHandling::Automatic;
        assert!(profile.validate().is_err());
    }

    #[test]
    fn test_separator_must_be_single_char() {
        let mut profile = valid_profile();
        profile.amount.decimal_separator = ",.".to_string();
        assert!(profile.validate().is_err());
    }

    #[test]
    fn test_from_json() {
        let json = r#"{
            "date": { "column": "Booking date", "format": "dd.MM.yyyy" },
            "description": { "column": "Text", "parseOptions": { "regex": "^(.*?) REF", "pattern": "{1}" } },
            "sourceAccount": { "kind": "select", "accountId": 1 },
            "destinationAccount": { "kind": "accountNumber", "column": "IBAN" },
            "amount": { "debitColumn": "Amount", "decimalSeparator": "," },
            "duplicateHandling": "automatic"
        }"#;
        let profile = ImportProfile::from_json(json).unwrap();
        assert_eq!(profile.date.format.as_str(), "dd.MM.yyyy");
        assert_eq!(profile.destination_account.kind, AccountIdentifierKind::AccountNumber);
        assert_eq!(profile.amount.decimal_separator, ",");
        assert!(profile.description.parse_options.regex().is_some());
        assert_eq!(profile.account_columns().count(), 1);
    }

    #[test]
    fn test_from_json_rejects_bad_regex() {
        let json = r#"{ "description": { "column": "Text", "parseOptions": { "regex": "(" } } }"#;
        let err = ImportProfile::from_json(json).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
