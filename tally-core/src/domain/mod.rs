//! Core domain entities
//!
//! All business entities are defined here. These are pure data structures
//! with validation logic - no I/O or external dependencies.

mod account;
mod candidate;
mod date_format;
mod directory;
mod parse_options;
mod profile;
mod request;
mod table;
pub mod result;

pub use account::{Account, AccountIdentifierKind};
pub use candidate::{AccountRef, Amount, CandidateTransaction, InvalidAmount};
pub use date_format::DateFormat;
pub use directory::{AccountDirectory, AccountReference, DirectoryPatch, Resolution};
pub use parse_options::{ParseOptions, ParseOptionsSpec};
pub use profile::{
    AccountMapping, AmountMapping, DateMapping, DuplicateHandling, FieldMapping, ImportProfile,
};
pub use request::{BatchOutcome, CreateTransactionRequest};
pub use table::{RawRow, RawTable};
