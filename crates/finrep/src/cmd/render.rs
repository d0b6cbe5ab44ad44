//! The `finrep render` command.

use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::Parser;
use tracing::debug;

use finrep_core::{CompanyId, DateRange, InternedStr};
use finrep_engine::columns::{periods, ColumnPlan};
use finrep_engine::options::{Comparison, ComparisonFilter, CurrencyMode};
use finrep_engine::{Options, ReportEngine};
use finrep_ledger::MemoryLedger;

use crate::cmd::OutputFormat;
use crate::{load, report};

/// Render a report over a ledger snapshot.
#[derive(Parser, Debug)]
pub struct Args {
    /// The ledger snapshot JSON file
    #[arg(value_name = "LEDGER")]
    pub ledger: PathBuf,

    /// The report definition JSON file
    #[arg(value_name = "REPORT")]
    pub report: PathBuf,

    /// Period start (YYYY-MM-DD); defaults to the earliest entry date
    #[arg(long, value_name = "DATE")]
    pub from: Option<NaiveDate>,

    /// Period end (YYYY-MM-DD); defaults to the latest entry date
    #[arg(long, value_name = "DATE")]
    pub to: Option<NaiveDate>,

    /// Add N preceding comparison periods of the same shape
    #[arg(long, value_name = "N", default_value_t = 0)]
    pub compare: usize,

    /// Restrict to these companies; defaults to every company in the
    /// snapshot (can be specified multiple times)
    #[arg(long = "company", value_name = "ID")]
    pub companies: Vec<u32>,

    /// Restrict aggregation to these journal codes (can be specified
    /// multiple times)
    #[arg(long = "journal", value_name = "CODE")]
    pub journals: Vec<String>,

    /// Convert every column into one display currency
    #[arg(long, value_name = "CURRENCY")]
    pub currency: Option<String>,

    /// Unfold every unfoldable line
    #[arg(long)]
    pub unfold_all: bool,

    /// Nest account buckets under code-prefix headers
    #[arg(long)]
    pub hierarchy: bool,

    /// Free-text search over bucket labels and partners
    #[arg(long, value_name = "NEEDLE")]
    pub search: Option<String>,

    /// Export render: everything unfolded, no pagination
    #[arg(long)]
    pub export: bool,

    /// Render computed zeros as blank cells
    #[arg(long)]
    pub blank_if_zero: bool,

    /// Output format (text or json)
    #[arg(long, short = 'f', value_enum, default_value = "text")]
    pub format: OutputFormat,
}

/// The reporting period: explicit bounds, falling back to the span of
/// the ledger's entries.
fn resolve_period(args: &Args, ledger: &MemoryLedger) -> Result<DateRange> {
    let (from, to) = match (args.from, args.to) {
        (Some(from), Some(to)) => (from, to),
        _ => {
            let entries = ledger.entries();
            let span = entries
                .first()
                .zip(entries.last())
                .context("ledger has no entries; pass --from and --to")?;
            (
                args.from.unwrap_or(span.0.date),
                args.to.unwrap_or(span.1.date),
            )
        }
    };
    Ok(DateRange::new(from, to))
}

fn resolve_companies(args: &Args, ledger: &MemoryLedger) -> Vec<CompanyId> {
    if args.companies.is_empty() {
        let mut ids: Vec<CompanyId> = ledger.companies().map(|company| company.id).collect();
        ids.sort_unstable();
        ids
    } else {
        args.companies.iter().copied().map(CompanyId).collect()
    }
}

fn build_options(args: &Args, ledger: &MemoryLedger) -> Result<Options> {
    let mut builder = Options::builder(resolve_period(args, ledger)?)
        .companies(resolve_companies(args, ledger))
        .journals(args.journals.iter().map(|code| InternedStr::from(code.as_str())))
        .known_journals(ledger.journal_codes())
        .unfold_all(args.unfold_all)
        .hierarchy(args.hierarchy)
        .export_mode(args.export)
        .blank_if_zero(args.blank_if_zero);

    if args.compare > 0 {
        builder = builder.comparison(Comparison {
            filter: ComparisonFilter::PreviousPeriod,
            number_period: args.compare,
            ..Comparison::default()
        });
    }
    if let Some(currency) = &args.currency {
        builder = builder.currency(CurrencyMode::Converted(InternedStr::from(
            currency.as_str(),
        )));
    }
    if let Some(needle) = &args.search {
        builder = builder.search(needle.as_str());
    }
    builder.build().context("invalid render options")
}

/// Column headers in display order, qualified by period when the render
/// spans more than one.
fn headers(engine: &ReportEngine<MemoryLedger>, options: &Options) -> Vec<String> {
    let plan = ColumnPlan::build(
        options,
        engine.columns(),
        engine.definition().semantics.balance_chain,
    );
    let multi_period = periods(options.date, &options.comparison).len() > 1;
    plan.cells
        .iter()
        .map(|cell| {
            if multi_period {
                format!("{} ({})", cell.label, plan.groups[cell.group].range)
            } else {
                cell.label.clone()
            }
        })
        .collect()
}

/// Run the render command.
pub fn run(args: &Args) -> Result<ExitCode> {
    let mut stdout = io::stdout().lock();

    let ledger = load::ledger(&args.ledger)?;
    let definition = load::definition(&args.report)?;
    let options = build_options(args, &ledger)?;

    let engine = ReportEngine::new(definition, ledger).context("invalid report definition")?;
    let lines = engine.get_lines(&options)?;
    debug!(lines = lines.len(), "report rendered");

    match args.format {
        OutputFormat::Json => {
            writeln!(stdout, "{}", serde_json::to_string_pretty(&lines)?)?;
        }
        OutputFormat::Text => {
            let headers = headers(&engine, &options);
            report::print_report(
                &engine.definition().name,
                &headers,
                &lines,
                &mut stdout,
            )?;
        }
    }
    Ok(ExitCode::SUCCESS)
}
