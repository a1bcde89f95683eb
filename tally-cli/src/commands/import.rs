//! Import command - import transactions from CSV

use std::path::PathBuf;

use anyhow::{Context, Result};
use colored::Colorize;
use dialoguer::Confirm;
use indicatif::{ProgressBar, ProgressStyle};

use super::{get_context, get_logger, log_event};
use crate::output;
use tally_core::domain::AccountRef;
use tally_core::services::logging::{IMPORT_COMPLETED, IMPORT_FAILED, IMPORT_STARTED};
use tally_core::services::{ImportPreview, ImportReport, IssueFlags, ProgressListener};
use tally_core::{CandidateTransaction, ImportProfile, LogEvent};

pub struct ImportArgs {
    pub file: PathBuf,
    pub profile: Option<String>,
    pub profile_file: Option<PathBuf>,
    pub preview: bool,
    pub batch_size: Option<usize>,
    pub issues_only: bool,
    pub yes: bool,
    pub json: bool,
}

pub async fn run(args: ImportArgs) -> Result<()> {
    let ctx = get_context()?;
    let service = &ctx.import_service;

    let (profile_name, profile) = match (&args.profile, &args.profile_file) {
        (Some(name), _) => (name.clone(), service.get_profile(name)?),
        (None, Some(path)) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read profile file {}", path.display()))?;
            let name = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "file".to_string());
            (name, ImportProfile::from_json(&content)?)
        }
        (None, None) => anyhow::bail!("Specify --profile <name> or --profile-file <path>"),
    };

    let table = service.load_table(&args.file)?;
    let preview = service.prepare(&table, &profile).await?;

    if args.json && args.preview {
        println!("{}", serde_json::to_string_pretty(&preview)?);
        return Ok(());
    }

    if !args.json {
        print_preview(&preview, args.issues_only);
    }

    if args.preview {
        return Ok(());
    }

    let submittable = preview.summary.total - preview.summary.rejected;
    if submittable == 0 {
        if args.json {
            println!("{}", serde_json::json!({"imported": 0, "reason": "no importable rows"}));
        } else {
            output::warning("Nothing to import.");
        }
        return Ok(());
    }

    if !args.yes && !args.json {
        let prompt = format!("Import {} transaction(s) from {}?", submittable, args.file.display());
        if !Confirm::new().with_prompt(prompt).default(true).interact()? {
            println!("Cancelled.");
            return Ok(());
        }
    }

    let batch_size = args.batch_size.unwrap_or(ctx.config.import.batch_size);
    if batch_size == 0 {
        anyhow::bail!("--batch-size must be at least 1");
    }

    let logger = get_logger();
    log_event(
        &logger,
        LogEvent::new(IMPORT_STARTED)
            .with_profile(&profile_name)
            .with_row_count(preview.summary.total),
    );

    let bar = if args.json {
        ProgressBar::hidden()
    } else {
        let bar = ProgressBar::new(preview.summary.total as u64);
        bar.set_style(
            ProgressStyle::with_template("{bar:40.cyan/blue} {pos}/{len} rows")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        bar
    };
    let handle = bar.clone();
    let listener: ProgressListener = Box::new(move |progress| handle.set_position(progress as u64));

    let report = service.run(&preview, batch_size, Some(listener)).await;
    bar.finish_and_clear();

    match &report.error {
        None => log_event(
            &logger,
            LogEvent::new(IMPORT_COMPLETED)
                .with_profile(&profile_name)
                .with_batch_id(&report.batch_id)
                .with_row_count(report.succeeded.len()),
        ),
        Some(message) => log_event(
            &logger,
            LogEvent::new(IMPORT_FAILED)
                .with_profile(&profile_name)
                .with_batch_id(&report.batch_id)
                .with_row_count(report.progress)
                .with_error(message),
        ),
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    if !report.is_complete() {
        anyhow::bail!(
            "Import stopped after {} of {} rows: {}",
            report.progress,
            report.total,
            report.error.as_deref().unwrap_or("unknown error")
        );
    }
    Ok(())
}

fn print_preview(preview: &ImportPreview, issues_only: bool) {
    let mut table = output::create_table();
    table.set_header(vec!["Row", "Date", "Description", "Amount", "From", "To", "Issues"]);

    let rows: Vec<_> = if issues_only {
        preview.issues().collect()
    } else {
        preview.rows().collect()
    };

    for (candidate, flags) in &rows {
        table.add_row(vec![
            candidate.row_number.to_string(),
            date_cell(candidate),
            output::truncate(&candidate.description, 40),
            amount_cell(candidate),
            account_cell(&candidate.source, &candidate.source_text),
            account_cell(&candidate.destination, &candidate.destination_text),
            issues_cell(flags),
        ]);
    }

    if !rows.is_empty() {
        println!("{}", table);
    }

    let summary = &preview.summary;
    println!();
    println!("{}", "Preview".bold());
    println!("  Rows:            {}", summary.total);
    println!("  Ready:           {}", summary.ready.to_string().green());
    if summary.duplicate > 0 {
        println!("  Already imported: {}", summary.duplicate.to_string().yellow());
    }
    if summary.no_account > 0 {
        println!("  No account:      {}", summary.no_account.to_string().yellow());
    }
    if summary.same_account > 0 {
        println!("  Same account:    {}", summary.same_account.to_string().red());
    }
    if summary.parse_error > 0 {
        println!("  Parse errors:    {}", summary.parse_error.to_string().red());
    }
    if summary.rejected > 0 {
        output::warning(&format!(
            "{} row(s) will be recorded as failed without being sent",
            summary.rejected
        ));
    }
}

fn print_report(report: &ImportReport) {
    println!();
    if report.is_complete() {
        output::success(&format!("Import {} finished", report.batch_id));
    } else {
        output::error(&format!("Import {} stopped", report.batch_id));
    }
    println!("  Imported:   {}", report.succeeded.len().to_string().green());
    println!("  Duplicates: {}", report.duplicate.len().to_string().yellow());
    println!("  Failed:     {}", report.failed.len().to_string().red());

    if !report.failed.is_empty() {
        let rows: Vec<String> = report.failed.iter().map(|r| r.row_number.to_string()).collect();
        println!("  Failed rows: {}", output::truncate(&rows.join(", "), 60).dimmed());
    }
    if !report.is_complete() {
        output::info("Rows already stored will show up as duplicates if you run the import again.");
    }
}

fn date_cell(candidate: &CandidateTransaction) -> String {
    match candidate.date_time {
        Some(dt) => dt.format("%Y-%m-%d").to_string(),
        None if candidate.date_text.is_empty() => "-".to_string(),
        None => format!("{} {}", candidate.date_text, "(invalid)".red()),
    }
}

fn amount_cell(candidate: &CandidateTransaction) -> String {
    match &candidate.amount {
        Ok(amount) => amount.to_string(),
        Err(invalid) => format!("{} {}", invalid.text, "(invalid)".red()),
    }
}

fn account_cell(account: &AccountRef, text: &str) -> String {
    match account {
        AccountRef::Resolved(account) => account.name.clone(),
        AccountRef::Unresolved => "?".to_string(),
        AccountRef::Missing => format!("{} {}", text, "(unknown)".yellow()),
        AccountRef::None => "-".to_string(),
    }
}

fn issues_cell(flags: &IssueFlags) -> String {
    let reasons = flags.reasons();
    if reasons.is_empty() {
        String::new()
    } else if flags.blocks_import() {
        reasons.join("; ").red().to_string()
    } else {
        reasons.join("; ").yellow().to_string()
    }
}
