//! Columns command - inspect a CSV file before writing a profile

use std::path::Path;

use anyhow::Result;
use colored::Colorize;

use super::get_context;
use crate::output;
use tally_core::services::{DetectedColumns, ImportService};

pub fn run(file: &Path, json: bool) -> Result<()> {
    let ctx = get_context()?;
    let table = ctx.import_service.load_table(file)?;
    let detected = ImportService::detect_columns(&table);
    let suggested = detected.suggest_profile();

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "columns": table.column_names,
                "rows": table.len(),
                "detected": detected,
                "suggestedProfile": suggested,
            }))?
        );
        return Ok(());
    }

    let mut out = output::create_table();
    out.set_header(vec!["Column", "Detected as", "First value"]);
    let first = table.rows.first();
    for name in &table.column_names {
        let sample = first.and_then(|row| row.get(name)).unwrap_or("");
        out.add_row(vec![
            name.clone(),
            role_of(&detected, name).unwrap_or("").to_string(),
            output::truncate(sample, 40),
        ]);
    }
    println!("{}", out);
    println!("{} data row(s)", table.len());

    println!();
    println!("{}", "Suggested profile:".cyan());
    println!("{}", serde_json::to_string_pretty(&suggested)?);
    output::info("Save it with: tally profile save <name> <file.json>");
    Ok(())
}

fn role_of(detected: &DetectedColumns, column: &str) -> Option<&'static str> {
    let roles = [
        (&detected.date, "date"),
        (&detected.amount, "amount"),
        (&detected.debit, "debit"),
        (&detected.credit, "credit"),
        (&detected.description, "description"),
        (&detected.category, "category"),
        (&detected.counterparty, "counterparty"),
        (&detected.account_number, "own account"),
    ];
    roles
        .iter()
        .find(|(name, _)| name.as_deref() == Some(column))
        .map(|(_, role)| *role)
}
