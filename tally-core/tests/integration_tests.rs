//! Integration tests for tally-core
//!
//! Each test runs the whole import pipeline against a real DuckDB ledger in a
//! temporary tally directory: settings.json, CSV reading, account lookup,
//! mapping, duplicate detection and batched inserts.
//!
//! Run with: cargo test --test integration_tests -- --nocapture

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use chrono::NaiveDate;
use rust_decimal::Decimal;
use tempfile::TempDir;

use tally_core::adapters::duckdb::DuckDbLedger;
use tally_core::services::ProgressListener;
use tally_core::{Account, ImportProfile, TallyContext};

// ============================================================================
// Test Helpers
// ============================================================================

const PROFILE_JSON: &str = r#"{
    "date": {"column": "Buchungstag", "format": "dd.MM.yyyy"},
    "description": {"column": "Verwendungszweck"},
    "sourceAccount": {"kind": "select", "accountId": 1},
    "destinationAccount": {"kind": "name", "column": "Empfaenger"},
    "amount": {"debitColumn": "Betrag", "decimalSeparator": ","},
    "duplicateHandling": "automatic"
}"#;

const EXPORT_CSV: &str = "\
Kontoauszug Girokonto
Buchungstag;Verwendungszweck;Empfaenger;Betrag
02.01.2024;Coffee;Cafe;-3,50
02.01.2024;Coffee;Cafe;-3,50
05.01.2024;Salary;Employer;2.500,00
07.01.2024;Refund;Nobody;12,00
08.01.2024;Transfer;Checking;10,00
09.01.2024;Broken;Cafe;n/a
";

/// Tally directory with settings, two accounts and an export file
fn setup() -> (TempDir, TallyContext, PathBuf) {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("settings.json"),
        r#"{"import": {"delimiter": ";", "skipRows": 1, "batchSize": 2}}"#,
    )
    .unwrap();

    let ctx = TallyContext::new(dir.path()).unwrap();
    ctx.ledger.add_account(&Account::new(0, "Checking")).unwrap();
    ctx.ledger.add_account(&Account::new(0, "Cafe")).unwrap();
    ctx.ledger.add_account(&Account::new(0, "Employer")).unwrap();

    let file = dir.path().join("export.csv");
    std::fs::write(&file, EXPORT_CSV).unwrap();

    (dir, ctx, file)
}

fn profile() -> ImportProfile {
    ImportProfile::from_json(PROFILE_JSON).unwrap()
}

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

async fn import_file(ctx: &TallyContext, file: &Path, profile: &ImportProfile) -> tally_core::ImportReport {
    let table = ctx.import_service.load_table(file).unwrap();
    let preview = ctx.import_service.prepare(&table, profile).await.unwrap();
    ctx.import_service
        .run(&preview, ctx.config.import.batch_size, None)
        .await
}

// ============================================================================
// Full pipeline
// ============================================================================

#[tokio::test]
async fn test_import_csv_into_ledger() {
    let (_dir, ctx, file) = setup();
    assert_eq!(ctx.config.import.batch_size, 2);

    let table = ctx.import_service.load_table(&file).unwrap();
    assert_eq!(table.len(), 6);

    let preview = ctx.import_service.prepare(&table, &profile()).await.unwrap();
    let summary = preview.summary;
    assert_eq!(summary.total, 6);
    // Transfer to the source account itself, and the unparseable amount
    assert_eq!(summary.rejected, 2);
    assert_eq!(summary.same_account, 1);
    assert_eq!(summary.parse_error, 1);
    assert_eq!(summary.duplicate, 0);

    // Identical rows get distinct identifiers through their ordinal
    let first = preview.candidates[0].identifier.clone().unwrap();
    let second = preview.candidates[1].identifier.clone().unwrap();
    assert!(first.ends_with("|3.5|1"));
    assert!(second.ends_with("|3.5|2"));

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let listener: ProgressListener = Box::new(move |progress| sink.lock().unwrap().push(progress));
    let report = ctx
        .import_service
        .run(&preview, ctx.config.import.batch_size, Some(listener))
        .await;

    assert!(report.is_complete());
    assert_eq!(report.progress, 6);
    // Two rejected rows first, then batches of two
    assert_eq!(*seen.lock().unwrap(), vec![2, 4, 6]);
    assert_eq!(report.succeeded.len(), 4);
    assert_eq!(report.failed.len(), 2);
    assert!(report.duplicate.is_empty());

    let stored = ctx.ledger.get_transactions(Some(&report.batch_id)).unwrap();
    assert_eq!(stored.len(), 4);

    let salary = stored.iter().find(|t| t.description == "Salary").unwrap();
    assert_eq!(salary.amount, dec("2500.00"));
    assert_eq!(salary.date.date(), NaiveDate::from_ymd_opt(2024, 1, 5).unwrap());
    assert_eq!(salary.source_account_id, Some(1));
    assert_eq!(salary.destination_account_id, Some(3));
    assert_eq!(salary.source_row, Some(3));

    // Unknown payee: stored with the source account only
    let refund = stored.iter().find(|t| t.description == "Refund").unwrap();
    assert_eq!(refund.destination_account_id, None);
}

#[tokio::test]
async fn test_reimport_reports_duplicates() {
    let (dir, ctx, file) = setup();

    let first = import_file(&ctx, &file, &profile()).await;
    assert_eq!(first.succeeded.len(), 4);
    drop(ctx);

    // A fresh context reads the same ledger file
    let ctx = TallyContext::new(dir.path()).unwrap();
    let table = ctx.import_service.load_table(&file).unwrap();
    let preview = ctx.import_service.prepare(&table, &profile()).await.unwrap();
    assert_eq!(preview.summary.duplicate, 4);
    assert_eq!(preview.known_duplicates.len(), 4);

    let second = ctx.import_service.run(&preview, 2, None).await;
    assert!(second.is_complete());
    assert!(second.succeeded.is_empty());
    assert_eq!(second.duplicate.len(), 4);
    assert_eq!(second.failed.len(), 2);
    assert_eq!(ctx.ledger.transaction_count().unwrap(), 4);
}

#[tokio::test]
async fn test_explicit_identifier_column() {
    let (dir, ctx, _file) = setup();
    let file = dir.path().join("with_ids.csv");
    std::fs::write(
        &file,
        "Export\nId;Buchungstag;Verwendungszweck;Empfaenger;Betrag\n\
         A1;02.01.2024;Coffee;Cafe;-3,50\n\
         A1;02.01.2024;Coffee again;Cafe;-3,50\n\
         A2;03.01.2024;Lunch;Cafe;-8,00\n",
    )
    .unwrap();

    let mut profile = profile();
    profile.duplicate_handling = tally_core::domain::DuplicateHandling::ExplicitColumn;
    profile.identifier = tally_core::domain::FieldMapping::column("Id");

    let table = ctx.import_service.load_table(&file).unwrap();
    let preview = ctx.import_service.prepare(&table, &profile).await.unwrap();
    assert!(preview.flags[0].duplicate);
    assert!(preview.flags[1].duplicate);
    assert!(!preview.flags[2].duplicate);

    // Both A1 rows are sent; the ledger keeps the first
    let report = ctx.import_service.run(&preview, 10, None).await;
    assert_eq!(report.succeeded.len(), 2);
    assert_eq!(report.duplicate.len(), 1);
    assert_eq!(report.duplicate[0].row_number, 2);
}

// ============================================================================
// Profiles and settings
// ============================================================================

#[tokio::test]
async fn test_saved_profile_survives_reload() {
    let (dir, ctx, file) = setup();
    ctx.import_service.save_profile("giro", &profile()).unwrap();
    drop(ctx);

    let ctx = TallyContext::new(dir.path()).unwrap();
    assert!(ctx.config.import_profiles.contains_key("giro"));

    let stored = ctx.import_service.get_profile("giro").unwrap();
    assert_eq!(stored, profile());

    let report = import_file(&ctx, &file, &stored).await;
    assert_eq!(report.succeeded.len(), 4);

    let raw: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(dir.path().join("settings.json")).unwrap()).unwrap();
    assert_eq!(raw["import"]["delimiter"], ";");
    assert_eq!(raw["importProfiles"]["giro"]["sourceAccount"]["kind"], "select");
}

#[tokio::test]
async fn test_prepare_fails_on_missing_column() {
    let (_dir, ctx, file) = setup();
    let mut profile = profile();
    profile.category = tally_core::domain::FieldMapping::column("Kategorie");

    let table = ctx.import_service.load_table(&file).unwrap();
    let err = ctx.import_service.prepare(&table, &profile).await.unwrap_err();
    assert!(err.to_string().contains("Kategorie"));
    assert_eq!(ctx.ledger.transaction_count().unwrap(), 0);
}

// ============================================================================
// Ledger file handling
// ============================================================================

/// Opening the ledger file repeatedly works and keeps the data
#[test]
fn test_sequential_connections() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("ledger.duckdb");

    for i in 0..5 {
        let ledger = DuckDbLedger::new(&db_path).unwrap();
        ledger.ensure_schema().unwrap();
        ledger.add_account(&Account::new(0, format!("Account {}", i))).unwrap();
        assert_eq!(ledger.get_accounts().unwrap().len(), i + 1);
    }
}

#[test]
fn test_migrations_are_idempotent() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("ledger.duckdb");

    let ledger = DuckDbLedger::new(&db_path).unwrap();
    let first = ledger.run_migrations().unwrap();
    assert!(!first.applied.is_empty());
    drop(ledger);

    let ledger = DuckDbLedger::new(&db_path).unwrap();
    let second = ledger.run_migrations().unwrap();
    assert!(second.applied.is_empty());
}
