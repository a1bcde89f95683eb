//! Port definitions (hexagonal architecture)
//!
//! Ports define the interfaces for external dependencies. The import pipeline
//! depends only on these traits, not on concrete implementations.

mod ledger;

pub use ledger::{AccountSearch, BatchCreate, DuplicateCheck, Ledger};
