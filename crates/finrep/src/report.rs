//! Plain-text rendering of engine output.
//!
//! Every printer is generic over [`Write`] so tests capture output in a
//! buffer and the commands hand in a locked stdout.

use std::io::{self, Write};

use rust_decimal::Decimal;

use finrep_engine::{DisplayCell, DisplayLine};

/// Render one cell's value, blank when the cell carries none.
fn cell_text(cell: &DisplayCell) -> String {
    match (&cell.value, &cell.currency) {
        (Some(value), Some(currency)) => format!("{value} {currency}"),
        (Some(value), None) => value.to_string(),
        (None, _) => String::new(),
    }
}

/// Print a rendered report as an aligned text table.
///
/// Line labels are indented two spaces per nesting level; value columns
/// are right-aligned under their headers.
pub fn print_report<W: Write>(
    title: &str,
    headers: &[String],
    lines: &[DisplayLine],
    writer: &mut W,
) -> io::Result<()> {
    let labels: Vec<String> = lines
        .iter()
        .map(|line| format!("{}{}", "  ".repeat(line.level as usize), line.name))
        .collect();
    let label_width = labels
        .iter()
        .map(String::len)
        .chain(std::iter::once(title.len()))
        .max()
        .unwrap_or(0);

    let mut widths: Vec<usize> = headers.iter().map(String::len).collect();
    let cells: Vec<Vec<String>> = lines
        .iter()
        .map(|line| {
            line.columns
                .iter()
                .enumerate()
                .map(|(index, cell)| {
                    let text = cell_text(cell);
                    if let Some(width) = widths.get_mut(index) {
                        *width = (*width).max(text.len());
                    }
                    text
                })
                .collect()
        })
        .collect();

    write!(writer, "{title:<label_width$}")?;
    for (header, width) in headers.iter().zip(&widths) {
        write!(writer, "  {header:>width$}")?;
    }
    writeln!(writer)?;

    let total_width = label_width + widths.iter().map(|w| w + 2).sum::<usize>();
    writeln!(writer, "{}", "-".repeat(total_width))?;

    for (label, row) in labels.iter().zip(&cells) {
        write!(writer, "{label:<label_width$}")?;
        for (text, width) in row.iter().zip(&widths) {
            write!(writer, "  {text:>width$}")?;
        }
        writeln!(writer)?;
    }
    Ok(())
}

/// One printable debit/credit row of a posted closing entry.
#[derive(Debug, Clone)]
pub struct JournalRow {
    /// Resolved account label.
    pub account: String,
    /// Line label.
    pub label: String,
    /// Debit amount.
    pub debit: Decimal,
    /// Credit amount.
    pub credit: Decimal,
}

/// Print a posted closing entry as a debit/credit table with totals.
pub fn print_closing<W: Write>(
    heading: &str,
    rows: &[JournalRow],
    writer: &mut W,
) -> io::Result<()> {
    writeln!(writer, "{heading}")?;

    let account_width = rows
        .iter()
        .map(|row| row.account.len())
        .chain(std::iter::once("Account".len()))
        .max()
        .unwrap_or(0);
    let label_width = rows
        .iter()
        .map(|row| row.label.len())
        .chain(std::iter::once("Label".len()))
        .max()
        .unwrap_or(0);

    let debit_total: Decimal = rows.iter().map(|row| row.debit).sum();
    let credit_total: Decimal = rows.iter().map(|row| row.credit).sum();
    let amount_width = rows
        .iter()
        .flat_map(|row| [row.debit.to_string().len(), row.credit.to_string().len()])
        .chain([
            debit_total.to_string().len(),
            credit_total.to_string().len(),
            "Debit".len(),
        ])
        .max()
        .unwrap_or(0);

    writeln!(
        writer,
        "  {:<account_width$}  {:<label_width$}  {:>amount_width$}  {:>amount_width$}",
        "Account", "Label", "Debit", "Credit"
    )?;
    for row in rows {
        writeln!(
            writer,
            "  {:<account_width$}  {:<label_width$}  {:>amount_width$}  {:>amount_width$}",
            row.account, row.label, row.debit, row.credit
        )?;
    }
    writeln!(
        writer,
        "  {:<account_width$}  {:<label_width$}  {:>amount_width$}  {:>amount_width$}",
        "", "", debit_total, credit_total
    )?;
    Ok(())
}
