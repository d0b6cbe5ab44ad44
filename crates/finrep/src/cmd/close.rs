//! The `finrep close` command.

use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::Parser;
use tracing::debug;

use finrep_core::{Account, CompanyId, DateRange, TaxUnitId};
use finrep_closing::{
    ClosingEntry, ClosingJournal, LockRegistry, ReconciliationLedger, ReturnSubject, TaxCloser,
    TaxReturn,
};
use finrep_ledger::{LedgerStore, MemoryLedger};

use crate::cmd::OutputFormat;
use crate::report::JournalRow;
use crate::{load, report};

/// Validate a tax return and post its closing entries.
#[derive(Parser, Debug)]
pub struct Args {
    /// The ledger snapshot JSON file
    #[arg(value_name = "LEDGER")]
    pub ledger: PathBuf,

    /// The report definition JSON file
    #[arg(value_name = "REPORT")]
    pub report: PathBuf,

    /// The closing routing configuration JSON file
    #[arg(long, value_name = "CONFIG")]
    pub config: PathBuf,

    /// Close this company's return
    #[arg(long, value_name = "ID", conflicts_with = "tax_unit")]
    pub company: Option<u32>,

    /// Close one consolidated return for this tax unit
    #[arg(long, value_name = "ID")]
    pub tax_unit: Option<u32>,

    /// Return period start (YYYY-MM-DD)
    #[arg(long, value_name = "DATE")]
    pub from: NaiveDate,

    /// Return period end (YYYY-MM-DD)
    #[arg(long, value_name = "DATE")]
    pub to: NaiveDate,

    /// Output format (text or json)
    #[arg(long, short = 'f', value_enum, default_value = "text")]
    pub format: OutputFormat,
}

impl Args {
    fn subject(&self) -> Result<ReturnSubject> {
        match (self.company, self.tax_unit) {
            (Some(company), None) => Ok(ReturnSubject::Company(CompanyId(company))),
            (None, Some(unit)) => Ok(ReturnSubject::Unit(TaxUnitId(unit))),
            _ => bail!("pass exactly one of --company or --tax-unit"),
        }
    }
}

fn rows(ledger: &MemoryLedger, entry: &ClosingEntry) -> Vec<JournalRow> {
    entry
        .lines
        .iter()
        .map(|line| JournalRow {
            account: ledger
                .account(line.account)
                .map_or_else(|_| line.account.to_string(), Account::label),
            label: line.label.clone(),
            debit: line.debit,
            credit: line.credit,
        })
        .collect()
}

/// Run the close command.
pub fn run(args: &Args) -> Result<ExitCode> {
    let mut stdout = io::stdout().lock();

    let ledger = load::ledger(&args.ledger)?;
    let definition = load::definition(&args.report)?;
    let config = load::closing_config(&args.config)?;

    let tax_return = TaxReturn {
        period: DateRange::new(args.from, args.to),
        report: definition.id,
        subject: args.subject()?,
    };

    let locks = LockRegistry::new();
    let reconciliations = ReconciliationLedger::new();
    let closer = TaxCloser::new(&ledger, &config, &locks, &reconciliations);
    let mut journal = ClosingJournal::new();

    let entries = closer
        .action_validate_return(&tax_return, &mut journal)
        .context("closing failed")?;
    debug!(entries = entries.len(), "closing validated");

    match args.format {
        OutputFormat::Json => {
            writeln!(stdout, "{}", serde_json::to_string_pretty(&entries)?)?;
        }
        OutputFormat::Text => {
            for entry in &entries {
                let company = ledger
                    .company(entry.company)
                    .map_or_else(|_| entry.company.to_string(), |c| c.name.clone());
                let heading = format!(
                    "{} {}: swept {} journal entries",
                    company,
                    entry.period,
                    entry.settled.len()
                );
                report::print_closing(&heading, &rows(&ledger, entry), &mut stdout)?;
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}
