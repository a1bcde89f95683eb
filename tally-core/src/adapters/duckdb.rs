//! DuckDB ledger implementation

use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use duckdb::{params, params_from_iter, Connection};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, warn};

use crate::domain::result::{Error, Result};
use crate::domain::{Account, AccountIdentifierKind, BatchOutcome, CreateTransactionRequest};
use crate::ports::{AccountSearch, BatchCreate, DuplicateCheck};
use crate::services::migration::{MigrationResult, MigrationService};

/// Maximum number of attempts when the database file is locked
const MAX_RETRIES: u32 = 5;

/// Initial retry delay in milliseconds (doubles each retry: 50, 100, 200, 400ms)
const INITIAL_RETRY_DELAY_MS: u64 = 50;

/// Identifier lookups are split into IN lists of this size
const LOOKUP_CHUNK: usize = 500;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// Fractional digits kept by sys_transactions.amount, DECIMAL(28, 10)
const AMOUNT_SCALE: u32 = 10;

/// Integer digits kept by sys_transactions.amount
const AMOUNT_INTEGER_DIGITS: u32 = 18;

/// Whether an amount is stored exactly by the amount column
fn fits_amount_column(amount: &Decimal) -> bool {
    let amount = amount.normalize();
    let limit = Decimal::from_i128_with_scale(10i128.pow(AMOUNT_INTEGER_DIGITS), 0);
    amount.scale() <= AMOUNT_SCALE && amount.trunc().abs() < limit
}

/// Whether an open error is a file lock that may clear on its own
fn is_retryable_error(err_msg: &str) -> bool {
    let lower = err_msg.to_lowercase();
    // Windows
    lower.contains("being used by another process")
        || lower.contains("cannot access the file")
        // Unix/macOS
        || lower.contains("resource temporarily unavailable")
        || lower.contains("database is locked")
        || lower.contains("file is already open")
        || lower.contains("could not set lock on file")
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

/// A transaction as stored by an import
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportedTransaction {
    pub id: i64,
    pub identifier: Option<String>,
    pub date: NaiveDateTime,
    pub amount: Decimal,
    pub description: String,
    pub category: Option<String>,
    pub source_account_id: Option<i64>,
    pub destination_account_id: Option<i64>,
    pub batch_id: Option<String>,
    pub source_row: Option<i64>,
}

/// Ledger stored in a local DuckDB file
pub struct DuckDbLedger {
    conn: Mutex<Connection>,
    db_path: Option<PathBuf>,
}

impl DuckDbLedger {
    /// Open (or create) the ledger file.
    ///
    /// Retries with exponential backoff while another process holds the
    /// file lock.
    pub fn new(db_path: &Path) -> Result<Self> {
        let mut attempt = 0;
        loop {
            match Self::try_open_connection(db_path) {
                Ok(conn) => {
                    return Ok(Self {
                        conn: Mutex::new(conn),
                        db_path: Some(db_path.to_path_buf()),
                    });
                }
                Err(e) if attempt + 1 < MAX_RETRIES && is_retryable_error(&e.to_string()) => {
                    let delay = Duration::from_millis(INITIAL_RETRY_DELAY_MS * 2u64.pow(attempt));
                    warn!(
                        "Ledger database busy, retrying in {}ms (attempt {}/{}): {}",
                        delay.as_millis(),
                        attempt + 1,
                        MAX_RETRIES,
                        e
                    );
                    thread::sleep(delay);
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Throwaway ledger, migrated and empty
    pub fn open_in_memory() -> Result<Self> {
        let ledger = Self {
            conn: Mutex::new(Connection::open_in_memory()?),
            db_path: None,
        };
        ledger.ensure_schema()?;
        Ok(ledger)
    }

    fn try_open_connection(db_path: &Path) -> Result<Connection> {
        // Extension autoloading stays off; nothing here needs extensions
        let config = duckdb::Config::default().enable_autoload_extension(false)?;
        Ok(Connection::open_with_flags(db_path, config)?)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| Error::database(format!("Lock poisoned: {}", e)))
    }

    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    pub fn run_migrations(&self) -> Result<MigrationResult> {
        let conn = self.lock()?;
        MigrationService::new(&conn).run_pending()
    }

    pub fn ensure_schema(&self) -> Result<()> {
        let result = self.run_migrations()?;
        if !result.applied.is_empty() {
            debug!("Applied ledger migrations: {}", result.applied.join(", "));
        }
        Ok(())
    }

    /// Writer that tags every inserted transaction with `batch_id`
    pub fn batch(self: &Arc<Self>, batch_id: impl Into<String>) -> ImportBatch {
        ImportBatch {
            ledger: Arc::clone(self),
            batch_id: batch_id.into(),
        }
    }

    // === Accounts ===

    /// Insert an account; the id is assigned by the ledger
    pub fn add_account(&self, draft: &Account) -> Result<Account> {
        draft.validate().map_err(Error::validation)?;

        let conn = self.lock()?;
        let id: i64 = conn.query_row(
            "INSERT INTO sys_accounts (name, account_number, account_type, currency)
             VALUES (?, ?, ?, ?)
             RETURNING account_id",
            params![
                draft.name.trim(),
                draft.account_number,
                draft.account_type,
                Account::normalize_currency(&draft.currency),
            ],
            |row| row.get(0),
        )?;

        Ok(Account {
            id,
            name: draft.name.trim().to_string(),
            currency: Account::normalize_currency(&draft.currency),
            ..draft.clone()
        })
    }

    pub fn get_accounts(&self) -> Result<Vec<Account>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT account_id, name, account_number, account_type, currency
             FROM sys_accounts
             ORDER BY account_id",
        )?;
        let accounts = stmt
            .query_map([], row_to_account)?
            .collect::<duckdb::Result<Vec<_>>>()?;
        Ok(accounts)
    }

    fn find_accounts(&self, kind: AccountIdentifierKind, values: &BTreeSet<String>) -> Result<HashMap<String, Account>> {
        if values.is_empty() {
            return Ok(HashMap::new());
        }
        let kind = kind.lookup_kind();
        let column = match kind {
            AccountIdentifierKind::Select | AccountIdentifierKind::Id => "account_id",
            AccountIdentifierKind::Name => "name",
            AccountIdentifierKind::AccountNumber => "account_number",
        };

        let conn = self.lock()?;
        let values: Vec<&String> = values.iter().collect();

        let mut accounts = Vec::new();
        for chunk in values.chunks(LOOKUP_CHUNK) {
            let mut stmt = conn.prepare(&format!(
                "SELECT account_id, name, account_number, account_type, currency
                 FROM sys_accounts
                 WHERE CAST({} AS VARCHAR) IN ({})",
                column,
                placeholders(chunk.len())
            ))?;
            let rows = stmt
                .query_map(params_from_iter(chunk.iter()), row_to_account)?
                .collect::<duckdb::Result<Vec<_>>>()?;
            accounts.extend(rows);
        }
        accounts.sort_by_key(|account| account.id);

        // Lowest id wins when several accounts share a name
        let mut found = HashMap::new();
        for account in accounts {
            if let Some(key) = account.identifier(kind) {
                found.entry(key).or_insert(account);
            }
        }
        Ok(found)
    }

    // === Transactions ===

    pub fn transaction_count(&self) -> Result<i64> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM sys_transactions", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Stored transactions in insertion order, optionally for one batch
    pub fn get_transactions(&self, batch_id: Option<&str>) -> Result<Vec<ImportedTransaction>> {
        let conn = self.lock()?;
        let filter = if batch_id.is_some() { "WHERE import_batch_id = ?" } else { "" };
        let mut stmt = conn.prepare(&format!(
            "SELECT transaction_id, import_identifier, transaction_date::VARCHAR, amount::VARCHAR,
                    description, category, source_account_id, destination_account_id,
                    import_batch_id, source_row
             FROM sys_transactions
             {}
             ORDER BY transaction_id",
            filter
        ))?;

        let rows = stmt
            .query_map(params_from_iter(batch_id), |row| {
                let date: String = row.get(2)?;
                let amount: String = row.get(3)?;
                Ok((
                    date,
                    amount,
                    ImportedTransaction {
                        id: row.get(0)?,
                        identifier: row.get(1)?,
                        date: NaiveDateTime::default(),
                        amount: Decimal::ZERO,
                        description: row.get(4)?,
                        category: row.get(5)?,
                        source_account_id: row.get(6)?,
                        destination_account_id: row.get(7)?,
                        batch_id: row.get(8)?,
                        source_row: row.get(9)?,
                    },
                ))
            })?
            .collect::<duckdb::Result<Vec<_>>>()?;

        rows.into_iter()
            .map(|(date, amount, tx)| {
                Ok(ImportedTransaction {
                    date: NaiveDateTime::parse_from_str(&date, TIMESTAMP_FORMAT)
                        .map_err(|e| Error::database(format!("bad timestamp '{}': {}", date, e)))?,
                    amount: Decimal::from_str(&amount)
                        .map_err(|e| Error::database(format!("bad amount '{}': {}", amount, e)))?,
                    ..tx
                })
            })
            .collect()
    }

    fn existing_identifiers(&self, identifiers: &BTreeSet<String>) -> Result<BTreeSet<String>> {
        let conn = self.lock()?;
        let values: Vec<&String> = identifiers.iter().collect();

        let mut found = BTreeSet::new();
        for chunk in values.chunks(LOOKUP_CHUNK) {
            let mut stmt = conn.prepare(&format!(
                "SELECT import_identifier FROM sys_transactions WHERE import_identifier IN ({})",
                placeholders(chunk.len())
            ))?;
            let ids = stmt
                .query_map(params_from_iter(chunk.iter()), |row| row.get::<_, String>(0))?
                .collect::<duckdb::Result<Vec<_>>>()?;
            found.extend(ids);
        }
        Ok(found)
    }

    /// Classify and insert one batch inside a single database transaction
    fn insert_batch(&self, requests: &[CreateTransactionRequest], batch_id: Option<&str>) -> Result<BatchOutcome> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let known_accounts: HashSet<i64> = {
            let mut stmt = tx.prepare("SELECT account_id FROM sys_accounts")?;
            let ids = stmt
                .query_map([], |row| row.get::<_, i64>(0))?
                .collect::<duckdb::Result<HashSet<_>>>()?;
            ids
        };

        let mut outcome = BatchOutcome::default();
        for request in requests {
            let (Some(date), Some(amount)) = (request.date, request.amount) else {
                outcome.failed.push(request.clone());
                continue;
            };

            let accounts = [request.source_account_id, request.destination_account_id];
            let unknown = accounts.iter().flatten().any(|id| !known_accounts.contains(id));
            let no_account = accounts.iter().all(Option::is_none);
            let same_account = request.source_account_id.is_some()
                && request.source_account_id == request.destination_account_id;
            if unknown || no_account || same_account {
                outcome.failed.push(request.clone());
                continue;
            }

            if !fits_amount_column(&amount) {
                debug!("Row {}: amount {} does not fit the ledger column", request.row_number, amount);
                outcome.failed.push(request.clone());
                continue;
            }

            if let Some(identifier) = &request.identifier {
                let taken: i64 = tx.query_row(
                    "SELECT COUNT(*) FROM sys_transactions WHERE import_identifier = ?",
                    [identifier],
                    |row| row.get(0),
                )?;
                if taken > 0 {
                    outcome.duplicate.push(request.clone());
                    continue;
                }
            }

            tx.execute(
                "INSERT INTO sys_transactions (
                    import_identifier, transaction_date, amount, description, category,
                    source_account_id, destination_account_id, import_batch_id, source_row
                 ) VALUES (?, CAST(? AS TIMESTAMP), CAST(? AS DECIMAL(28, 10)), ?, ?, ?, ?, ?, ?)",
                params![
                    request.identifier,
                    date.format(TIMESTAMP_FORMAT).to_string(),
                    amount.normalize().to_string(),
                    request.description,
                    request.category,
                    request.source_account_id,
                    request.destination_account_id,
                    batch_id,
                    request.row_number as i64,
                ],
            )?;
            outcome.succeeded.push(request.clone());
        }

        tx.commit()?;
        debug!(
            "Batch stored: {} succeeded, {} failed, {} duplicate",
            outcome.succeeded.len(),
            outcome.failed.len(),
            outcome.duplicate.len()
        );
        Ok(outcome)
    }
}

fn row_to_account(row: &duckdb::Row<'_>) -> duckdb::Result<Account> {
    Ok(Account {
        id: row.get(0)?,
        name: row.get(1)?,
        account_number: row.get(2)?,
        account_type: row.get(3)?,
        currency: row.get(4)?,
    })
}

#[async_trait]
impl AccountSearch for DuckDbLedger {
    async fn search_accounts(
        &self,
        kind: AccountIdentifierKind,
        values: &BTreeSet<String>,
    ) -> Result<HashMap<String, Account>> {
        self.find_accounts(kind, values)
    }
}

#[async_trait]
impl DuplicateCheck for DuckDbLedger {
    async fn find_duplicate_identifiers(&self, identifiers: &BTreeSet<String>) -> Result<BTreeSet<String>> {
        self.existing_identifiers(identifiers)
    }
}

#[async_trait]
impl BatchCreate for DuckDbLedger {
    async fn create_many(&self, requests: &[CreateTransactionRequest]) -> Result<BatchOutcome> {
        self.insert_batch(requests, None)
    }
}

/// Batch writer returned by [`DuckDbLedger::batch`]
pub struct ImportBatch {
    ledger: Arc<DuckDbLedger>,
    batch_id: String,
}

impl ImportBatch {
    pub fn batch_id(&self) -> &str {
        &self.batch_id
    }
}

#[async_trait]
impl BatchCreate for ImportBatch {
    async fn create_many(&self, requests: &[CreateTransactionRequest]) -> Result<BatchOutcome> {
        self.ledger.insert_batch(requests, Some(&self.batch_id))
    }
}
