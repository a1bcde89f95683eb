//! Accounts command - the ledger accounts imports resolve against

use anyhow::Result;
use clap::Subcommand;
use colored::Colorize;

use super::get_context;
use crate::output;
use tally_core::Account;

#[derive(Subcommand)]
pub enum AccountsCommands {
    /// List ledger accounts
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Add a ledger account
    Add {
        /// Account name
        name: String,
        /// Account number or IBAN
        #[arg(long)]
        number: Option<String>,
        /// Free-form account type (checking, savings, expense, ...)
        #[arg(long = "type")]
        account_type: Option<String>,
        /// ISO currency code
        #[arg(long, default_value = "EUR")]
        currency: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

pub fn run(command: AccountsCommands) -> Result<()> {
    let ctx = get_context()?;

    match command {
        AccountsCommands::List { json } => {
            let accounts = ctx.ledger.get_accounts()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&accounts)?);
                return Ok(());
            }
            if accounts.is_empty() {
                println!("No accounts yet. Add one with: tally accounts add <name>");
                return Ok(());
            }

            let mut table = output::create_table();
            table.set_header(vec!["ID", "Name", "Number", "Type", "Currency"]);
            for account in accounts {
                table.add_row(vec![
                    account.id.to_string(),
                    account.name,
                    account.account_number.unwrap_or_default(),
                    account.account_type.unwrap_or_default(),
                    account.currency,
                ]);
            }
            println!("{}", table);
        }
        AccountsCommands::Add {
            name,
            number,
            account_type,
            currency,
            json,
        } => {
            let mut draft = Account::new(0, name).with_currency(&currency);
            if let Some(number) = number {
                draft = draft.with_account_number(number);
            }
            if let Some(account_type) = account_type {
                draft = draft.with_account_type(account_type);
            }

            let account = ctx.ledger.add_account(&draft)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&account)?);
            } else {
                println!("{}", "Account created".green());
                println!("  ID:   {}", account.id);
                println!("  Name: {}", account.name);
            }
        }
    }

    Ok(())
}
