//! Adapter implementations
//!
//! Adapters implement the port traits with concrete technologies:
//! - DuckDB for the ledger ports
//! - the `csv` crate for reading bank exports

pub mod csv;
pub mod duckdb;

#[cfg(test)]
pub mod mock;
