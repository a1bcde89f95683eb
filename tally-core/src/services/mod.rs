//! Service layer - business logic orchestration
//!
//! The import pipeline is split into pure stages (`mapper`, `identifier`,
//! `classifier`), the stages that talk to the ledger (`resolver`,
//! `importer`), and `ImportService`, which runs them for one session.

pub mod classifier;
pub mod identifier;
pub mod import;
pub mod importer;
pub mod logging;
pub mod mapper;
pub mod migration;
pub mod resolver;

pub use classifier::IssueFlags;
pub use import::{DetectedColumns, ImportPreview, ImportReport, ImportService, PreviewSummary};
pub use importer::{ImportState, Importer, ProgressListener};
pub use logging::{EntryPoint, EventCount, LogEntry, LogEvent, LoggingService};
pub use mapper::map_all;
/// Rebuild every candidate after the rows, the profile or the directory changed
pub use mapper::map_all as recompute;
pub use migration::{MigrationResult, MigrationService};
pub use resolver::AccountResolver;
