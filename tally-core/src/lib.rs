//! Tally Core - CSV bank export import into a double-entry ledger
//!
//! This crate follows a hexagonal architecture:
//!
//! - **domain**: Core types (profiles, parse options, candidates, accounts)
//! - **ports**: Trait definitions for the ledger operations the import needs
//! - **services**: The import pipeline and its orchestration
//! - **adapters**: Concrete implementations (DuckDB ledger, CSV reader)

pub mod adapters;
pub mod config;
pub mod domain;
pub mod log_migrations;
pub mod migrations;
pub mod ports;
pub mod services;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};

use adapters::duckdb::DuckDbLedger;
use config::Config;
use services::ImportService;

// Re-export commonly used types at crate root
pub use domain::result::Error;
pub use domain::{Account, AccountIdentifierKind, CandidateTransaction, ImportProfile, ParseOptions};
pub use services::{EntryPoint, ImportPreview, ImportReport, LogEvent, LoggingService};

/// Ledger database file inside the tally directory
pub const LEDGER_FILE: &str = "tally.duckdb";

/// Main context for Tally operations
///
/// Holds the configuration, the ledger connection and the services built
/// on it.
pub struct TallyContext {
    pub config: Config,
    pub ledger: Arc<DuckDbLedger>,
    pub import_service: ImportService,
}

impl TallyContext {
    pub fn new(tally_dir: &Path) -> Result<Self> {
        let config = Config::load(tally_dir)?;

        let db_path = tally_dir.join(LEDGER_FILE);
        let ledger = Arc::new(
            DuckDbLedger::new(&db_path).with_context(|| format!("Failed to open {}", db_path.display()))?,
        );
        ledger.ensure_schema()?;

        let import_service = ImportService::new(Arc::clone(&ledger), tally_dir.to_path_buf());

        Ok(Self {
            config,
            ledger,
            import_service,
        })
    }
}
