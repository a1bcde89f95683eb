//! Profile command - manage saved import profiles

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use dialoguer::Confirm;

use super::get_context;
use crate::output;
use tally_core::domain::{AccountMapping, DuplicateHandling};
use tally_core::{AccountIdentifierKind, ImportProfile};

#[derive(Subcommand)]
pub enum ProfileCommands {
    /// List saved profiles
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show one profile as JSON
    Show {
        /// Profile name
        name: String,
    },
    /// Save a profile from a JSON file (replaces an existing one)
    Save {
        /// Profile name
        name: String,
        /// JSON file holding the profile
        file: PathBuf,
    },
    /// Remove a saved profile
    Remove {
        /// Profile name
        name: String,
        /// Skip confirmation prompt
        #[arg(long, short = 'f')]
        force: bool,
    },
}

pub fn run(command: ProfileCommands) -> Result<()> {
    let ctx = get_context()?;
    let service = &ctx.import_service;

    match command {
        ProfileCommands::List { json } => {
            let profiles = service.list_profiles()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&profiles)?);
                return Ok(());
            }
            if profiles.is_empty() {
                println!("No saved profiles.");
                return Ok(());
            }

            let mut table = output::create_table();
            table.set_header(vec!["Name", "Date", "Amount", "Source", "Destination", "Duplicates"]);
            for (name, profile) in &profiles {
                table.add_row(vec![
                    name.clone(),
                    profile.date.column.clone().unwrap_or_default(),
                    amount_summary(profile),
                    account_summary(&profile.source_account),
                    account_summary(&profile.destination_account),
                    duplicate_summary(profile.duplicate_handling).to_string(),
                ]);
            }
            println!("{}", table);
        }
        ProfileCommands::Show { name } => {
            let profile = service.get_profile(&name)?;
            println!("{}", serde_json::to_string_pretty(&profile)?);
        }
        ProfileCommands::Save { name, file } => {
            let content = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let profile = ImportProfile::from_json(&content)?;
            service.save_profile(&name, &profile)?;
            output::success(&format!("Saved profile '{}'", name));
        }
        ProfileCommands::Remove { name, force } => {
            if !force
                && !Confirm::new()
                    .with_prompt(format!("Remove profile '{}'?", name))
                    .default(false)
                    .interact()?
            {
                println!("Cancelled.");
                return Ok(());
            }
            if service.remove_profile(&name)? {
                output::success(&format!("Removed profile '{}'", name));
            } else {
                output::warning(&format!("No profile named '{}'", name.bold()));
            }
        }
    }

    Ok(())
}

fn amount_summary(profile: &ImportProfile) -> String {
    let amount = &profile.amount;
    if amount.separate_credit_debit_columns {
        format!(
            "{} / {}",
            amount.debit_column.as_deref().unwrap_or("-"),
            amount.credit_column.as_deref().unwrap_or("-")
        )
    } else {
        amount.debit_column.clone().unwrap_or_default()
    }
}

fn duplicate_summary(handling: DuplicateHandling) -> &'static str {
    match handling {
        DuplicateHandling::NoDedup => "off",
        DuplicateHandling::ExplicitColumn => "column",
        DuplicateHandling::Automatic => "automatic",
    }
}

fn account_summary(mapping: &AccountMapping) -> String {
    match (mapping.kind, &mapping.column, mapping.account_id) {
        (AccountIdentifierKind::Select, _, Some(id)) => format!("account #{}", id),
        (kind, Some(column), _) => format!("{} by {}", column, kind.as_str()),
        _ => "-".to_string(),
    }
}
