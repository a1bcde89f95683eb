//! Account domain model

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A ledger account that imported transactions can move money between
///
/// Note: account_type is a freeform string ("asset", "expense", "revenue",
/// "liability", ...). Any string is accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Stable numeric ledger id, used in import identifiers
    pub id: i64,
    pub name: String,
    /// IBAN or bank account number, if the ledger knows it
    pub account_number: Option<String>,
    pub account_type: Option<String>,
    /// ISO 4217 currency code, normalized to uppercase
    pub currency: String,
}

impl Account {
    /// Create a new account with the given id and name
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            account_number: None,
            account_type: None,
            currency: "EUR".to_string(),
        }
    }

    pub fn with_account_number(mut self, number: impl Into<String>) -> Self {
        self.account_number = Some(number.into());
        self
    }

    pub fn with_account_type(mut self, account_type: impl Into<String>) -> Self {
        self.account_type = Some(account_type.into());
        self
    }

    pub fn with_currency(mut self, currency: &str) -> Self {
        self.currency = Self::normalize_currency(currency);
        self
    }

    /// Normalize currency code to uppercase
    pub fn normalize_currency(currency: &str) -> String {
        currency.trim().to_uppercase()
    }

    /// Validate account data
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.name.trim().is_empty() {
            return Err("account name cannot be empty");
        }
        if self.currency.trim().is_empty() {
            return Err("currency cannot be empty");
        }
        Ok(())
    }

    /// The value of this account's field for a given lookup kind
    pub fn identifier(&self, kind: AccountIdentifierKind) -> Option<String> {
        match kind {
            AccountIdentifierKind::Select | AccountIdentifierKind::Id => Some(self.id.to_string()),
            AccountIdentifierKind::Name => Some(self.name.clone()),
            AccountIdentifierKind::AccountNumber => self.account_number.clone(),
        }
    }
}

/// How a raw account reference is interpreted
///
/// `Select` is a fixed account chosen once for the whole import. The other
/// kinds read a column and match accounts whose field equals the parsed value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AccountIdentifierKind {
    Select,
    Id,
    Name,
    AccountNumber,
}

impl AccountIdentifierKind {
    /// Kinds that can be searched in the ledger
    pub const SEARCHABLE: [AccountIdentifierKind; 3] = [Self::Id, Self::Name, Self::AccountNumber];

    /// The kind used for directory lookups. A selected account is looked up by id.
    pub fn lookup_kind(self) -> Self {
        match self {
            Self::Select => Self::Id,
            other => other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Select => "select",
            Self::Id => "id",
            Self::Name => "name",
            Self::AccountNumber => "accountNumber",
        }
    }
}

impl fmt::Display for AccountIdentifierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccountIdentifierKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace(['-', '_'], "").as_str() {
            "select" => Ok(Self::Select),
            "id" => Ok(Self::Id),
            "name" => Ok(Self::Name),
            "accountnumber" | "number" | "iban" => Ok(Self::AccountNumber),
            other => Err(format!("unknown account identifier kind: {}", other)),
        }
    }
}
