//! Import service - CSV transaction import
//!
//! Wires the pipeline together for one session: read the file, resolve
//! accounts, map rows, check the ledger for duplicates, classify, then hand
//! the candidates to a batch importer.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{info, warn};

use crate::adapters::csv::{self as csv_adapter, CsvOptions};
use crate::adapters::duckdb::DuckDbLedger;
use crate::config::Config;
use crate::domain::{
    AccountDirectory, AccountIdentifierKind, AccountMapping, AmountMapping, CandidateTransaction,
    CreateTransactionRequest, DateMapping, DuplicateHandling, FieldMapping, ImportProfile, RawTable,
};
use crate::ports::DuplicateCheck;
use crate::services::classifier::{self, IssueFlags};
use crate::services::importer::{ImportState, Importer, ProgressListener};
use crate::services::mapper;
use crate::services::resolver::AccountResolver;

/// Import service for CSV imports
pub struct ImportService {
    ledger: Arc<DuckDbLedger>,
    tally_dir: PathBuf,
}

impl ImportService {
    pub fn new(ledger: Arc<DuckDbLedger>, tally_dir: PathBuf) -> Self {
        Self { ledger, tally_dir }
    }

    // === Profiles ===

    pub fn list_profiles(&self) -> Result<BTreeMap<String, ImportProfile>> {
        Ok(Config::load(&self.tally_dir)?.import_profiles)
    }

    pub fn get_profile(&self, name: &str) -> Result<ImportProfile> {
        let mut profiles = self.list_profiles()?;
        profiles
            .remove(name)
            .with_context(|| format!("Import profile not found: {}", name))
    }

    /// Validate and store a profile, replacing any profile of that name
    pub fn save_profile(&self, name: &str, profile: &ImportProfile) -> Result<()> {
        if name.trim().is_empty() {
            anyhow::bail!("Profile name cannot be empty");
        }
        profile.validate()?;

        let mut config = Config::load(&self.tally_dir)?;
        config.import_profiles.insert(name.to_string(), profile.clone());
        config.save(&self.tally_dir)
    }

    /// Returns false if there was no such profile
    pub fn remove_profile(&self, name: &str) -> Result<bool> {
        let mut config = Config::load(&self.tally_dir)?;
        if config.import_profiles.remove(name).is_none() {
            return Ok(false);
        }
        config.save(&self.tally_dir)?;
        Ok(true)
    }

    // === Pipeline ===

    /// Read a CSV file using the configured delimiter and skipped rows
    pub fn load_table(&self, file_path: &Path) -> Result<RawTable> {
        let settings = Config::load(&self.tally_dir)?.import;
        let options = CsvOptions {
            delimiter: settings.delimiter_byte()?,
            skip_rows: settings.skip_rows,
        };
        csv_adapter::read_table(file_path, options)
            .with_context(|| format!("Failed to read CSV file {}", file_path.display()))
    }

    /// Resolve accounts, map every row, look up duplicates and classify.
    ///
    /// Row problems never fail this call; they show up in the flags. It
    /// fails on an invalid profile, a mapped column the file does not have,
    /// or a ledger error.
    pub async fn prepare(&self, table: &RawTable, profile: &ImportProfile) -> Result<ImportPreview> {
        profile.validate()?;

        let missing = missing_columns(table, profile);
        if !missing.is_empty() {
            anyhow::bail!(
                "Column(s) not found in file: {} (available: {})",
                missing.join(", "),
                table.column_names.join(", ")
            );
        }

        let resolver = AccountResolver::new(self.ledger.clone());
        let directory = resolver
            .resolve(&AccountDirectory::new(), table, profile)
            .await
            .context("Account lookup failed")?;

        let candidates = mapper::map_all(table, profile, &directory);

        let identifiers = classifier::identifier_set(&candidates);
        let in_ledger = self
            .ledger
            .find_duplicate_identifiers(&identifiers)
            .await
            .context("Duplicate check failed")?;
        let known_duplicates = classifier::known_duplicates(&candidates, &in_ledger);

        let flags = classifier::classify(&candidates, &known_duplicates);
        let summary = PreviewSummary::from_flags(&flags);
        info!(
            "Prepared {} rows: {} ready, {} rejected, {} duplicate",
            summary.total, summary.ready, summary.rejected, summary.duplicate
        );

        Ok(ImportPreview {
            candidates,
            flags,
            known_duplicates,
            summary,
        })
    }

    /// Submit a prepared import.
    ///
    /// Always returns a report. A ledger failure stops the run and is
    /// recorded in `error`; everything classified before it stays in the
    /// report and in the ledger, so running the same preview again is safe.
    pub async fn run(
        &self,
        preview: &ImportPreview,
        batch_size: usize,
        listener: Option<ProgressListener>,
    ) -> ImportReport {
        let batch_id = format!("import_{}", chrono::Utc::now().format("%Y%m%d_%H%M%S"));
        let batch = Arc::new(self.ledger.batch(batch_id.clone()));

        let mut importer = Importer::new(batch, preview.candidates.clone(), batch_size);
        if let Some(listener) = listener {
            importer = importer.with_listener(listener);
        }

        let error = match importer.start().await {
            Ok(()) => None,
            Err(e) => {
                warn!("Import {} did not complete: {}", batch_id, e);
                Some(e.to_string())
            }
        };

        ImportReport {
            batch_id,
            state: importer.state(),
            total: importer.total(),
            progress: importer.progress(),
            succeeded: importer.succeeded().to_vec(),
            failed: importer.failed().to_vec(),
            duplicate: importer.duplicate().to_vec(),
            error,
        }
    }

    /// Best-guess column roles from the header names
    pub fn detect_columns(table: &RawTable) -> DetectedColumns {
        detect_columns(&table.column_names)
    }
}

/// Columns the profile reads that the table lacks
fn missing_columns(table: &RawTable, profile: &ImportProfile) -> Vec<String> {
    let mut wanted: Vec<&str> = Vec::new();
    wanted.extend(profile.date.column.as_deref());
    wanted.extend(profile.description.column.as_deref());
    wanted.extend(profile.category.column.as_deref());
    wanted.extend(profile.account_columns().map(|(_, column)| column));
    wanted.extend(profile.amount.debit_column.as_deref());
    if profile.amount.separate_credit_debit_columns {
        wanted.extend(profile.amount.credit_column.as_deref());
    }
    if profile.duplicate_handling == DuplicateHandling::ExplicitColumn {
        wanted.extend(profile.identifier.column.as_deref());
    }

    let missing: BTreeSet<&str> = wanted.into_iter().filter(|c| !table.has_column(c)).collect();
    missing.into_iter().map(str::to_string).collect()
}

/// Candidates with their flags and counts, ready to show the user
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportPreview {
    pub candidates: Vec<CandidateTransaction>,
    pub flags: Vec<IssueFlags>,
    pub known_duplicates: BTreeSet<String>,
    pub summary: PreviewSummary,
}

impl ImportPreview {
    pub fn rows(&self) -> impl Iterator<Item = (&CandidateTransaction, &IssueFlags)> {
        self.candidates.iter().zip(self.flags.iter())
    }

    /// Rows with at least one flag
    pub fn issues(&self) -> impl Iterator<Item = (&CandidateTransaction, &IssueFlags)> {
        self.rows().filter(|(_, flags)| flags.any())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewSummary {
    pub total: usize,
    /// No flags at all
    pub ready: usize,
    /// Will be failed without being submitted
    pub rejected: usize,
    pub no_account: usize,
    pub same_account: usize,
    pub parse_error: usize,
    pub duplicate: usize,
}

impl PreviewSummary {
    fn from_flags(flags: &[IssueFlags]) -> Self {
        let count = |pred: fn(&IssueFlags) -> bool| flags.iter().filter(|f| pred(f)).count();
        Self {
            total: flags.len(),
            ready: count(|f| !f.any()),
            rejected: count(|f| f.blocks_import()),
            no_account: count(|f| f.no_account),
            same_account: count(|f| f.same_account),
            parse_error: count(|f| f.parse_error),
            duplicate: count(|f| f.duplicate),
        }
    }
}

/// What one run did
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportReport {
    pub batch_id: String,
    pub state: ImportState,
    pub total: usize,
    pub progress: usize,
    pub succeeded: Vec<CreateTransactionRequest>,
    pub failed: Vec<CreateTransactionRequest>,
    pub duplicate: Vec<CreateTransactionRequest>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ImportReport {
    pub fn is_complete(&self) -> bool {
        self.state == ImportState::Imported
    }
}

/// Result of column auto-detection
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DetectedColumns {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// The other party of each transaction
    #[serde(skip_serializing_if = "Option::is_none")]
    pub counterparty: Option<String>,
    /// The exporting account's own number, for multi-account exports
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_number: Option<String>,
}

impl DetectedColumns {
    /// A starting profile built from the detected columns. Accounts without
    /// a detected column are left unmapped.
    pub fn suggest_profile(&self) -> ImportProfile {
        let amount = match (&self.amount, &self.debit, &self.credit) {
            (Some(amount), _, _) => AmountMapping {
                debit_column: Some(amount.clone()),
                ..Default::default()
            },
            (None, debit, Some(credit)) => AmountMapping {
                debit_column: debit.clone(),
                credit_column: Some(credit.clone()),
                separate_credit_debit_columns: true,
                ..Default::default()
            },
            (None, debit, None) => AmountMapping {
                debit_column: debit.clone(),
                ..Default::default()
            },
        };

        ImportProfile {
            date: DateMapping {
                column: self.date.clone(),
                ..Default::default()
            },
            description: self.description.clone().map(FieldMapping::column).unwrap_or_default(),
            category: self.category.clone().map(FieldMapping::column).unwrap_or_default(),
            source_account: self
                .account_number
                .as_ref()
                .map(|c| AccountMapping::column(AccountIdentifierKind::AccountNumber, c.as_str()))
                .unwrap_or_default(),
            destination_account: self
                .counterparty
                .as_ref()
                .map(|c| AccountMapping::column(AccountIdentifierKind::Name, c.as_str()))
                .unwrap_or_default(),
            amount,
            duplicate_handling: DuplicateHandling::Automatic,
            identifier: FieldMapping::default(),
        }
    }
}

/// Short patterns must match the whole header; longer ones may match a part
fn header_matches(header: &str, patterns: &[&str]) -> bool {
    let lower = header.trim().to_lowercase();
    patterns
        .iter()
        .any(|p| lower == *p || (p.len() > 3 && lower.contains(p)))
}

fn detect_columns(headers: &[String]) -> DetectedColumns {
    let date_patterns = ["date", "transaction date", "trans date", "txn date", "booking", "posted", "post date", "dt", "valuta"];
    let amount_patterns = ["amount", "amt", "total", "transaction amount", "betrag"];
    let debit_patterns = ["debit", "dr", "withdrawal", "debit amount", "money out"];
    let credit_patterns = ["credit", "cr", "deposit", "credit amount", "money in"];
    let category_patterns = ["category", "cat"];
    let counterparty_patterns = ["counterparty", "beneficiary", "recipient", "payee", "merchant", "name"];
    let account_patterns = ["iban", "account number", "account no", "acct"];
    let desc_patterns = ["description", "desc", "memo", "details", "narration", "purpose", "reference", "text"];

    let mut detected = DetectedColumns::default();
    // Indexes of headers already assigned a role
    let mut taken: Vec<usize> = Vec::new();

    let pick = |patterns: &[&str], taken: &mut Vec<usize>| -> Option<String> {
        let index = (0..headers.len()).find(|i| !taken.contains(i) && header_matches(&headers[*i], patterns))?;
        taken.push(index);
        Some(headers[index].clone())
    };

    detected.date = pick(&date_patterns, &mut taken);
    detected.amount = pick(&amount_patterns, &mut taken);
    if detected.amount.is_none() {
        detected.debit = pick(&debit_patterns, &mut taken);
        detected.credit = pick(&credit_patterns, &mut taken);
    }
    detected.category = pick(&category_patterns, &mut taken);
    detected.account_number = pick(&account_patterns, &mut taken);
    detected.counterparty = pick(&counterparty_patterns, &mut taken);
    detected.description = pick(&desc_patterns, &mut taken);

    detected
}
