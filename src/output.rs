//! Operator-facing terminal output.

use crate::error::SqlFailure;
use crate::sql::runner::{BatchReport, SqlStep, StepOutcome};
use crate::sql::{Cell, QueryResult};
use colored::Colorize;
use tabled::builder::Builder;
use tabled::settings::Style;

/// Longest cell text shown before truncation.
const MAX_CELL_CHARS: usize = 60;

pub fn heading(title: &str) {
    println!();
    println!("{}", title.bold().bright_blue());
    println!("{}", "=".repeat(title.chars().count()).bright_blue());
}

pub fn success(message: &str) {
    println!("{} {}", "✓".green(), message);
}

pub fn warning(message: &str) {
    println!("{} {}", "⚠".yellow(), message);
}

pub fn failure(message: &str) {
    println!("{} {}", "✗".red(), message);
}

/// `$1,234.56`; negative values keep their sign in front.
pub fn format_money(value: f64) -> String {
    let sign = if value < 0.0 { "-" } else { "" };
    let cents = format!("{:.2}", value.abs());
    let (whole, frac) = cents.split_once('.').unwrap_or((cents.as_str(), "00"));

    let mut grouped = String::new();
    for (i, ch) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    format!("{sign}${grouped}.{frac}")
}

pub fn format_percent(value: f64) -> String {
    format!("{value:+.1}%")
}

pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}

fn display_cell(cell: &Cell) -> String {
    let text = match cell {
        Cell::Float(v) => format!("{v:.2}"),
        other => other.to_string(),
    };
    if text.chars().count() > MAX_CELL_CHARS {
        let cut: String = text.chars().take(MAX_CELL_CHARS - 3).collect();
        format!("{cut}...")
    } else {
        text
    }
}

pub fn render_table(result: &QueryResult) -> String {
    let mut builder = Builder::default();
    builder.push_record(result.columns.iter().cloned());
    for row in &result.rows {
        builder.push_record(row.iter().map(display_cell));
    }
    builder.build().with(Style::psql()).to_string()
}

/// Print a result set, or a note when it has no rows.
pub fn print_result(result: &QueryResult) {
    if result.is_empty() {
        warning("no rows");
        return;
    }
    println!("{}", render_table(result));
    println!("({} rows)", result.rows.len());
}

/// Arbitrary rows with a header, for report output computed locally.
pub fn print_rows(header: &[&str], rows: Vec<Vec<String>>) {
    let mut builder = Builder::default();
    builder.push_record(header.iter().map(|h| h.to_string()));
    for row in rows {
        builder.push_record(row);
    }
    println!("{}", builder.build().with(Style::psql()));
}

pub fn print_batch(report: &BatchReport) {
    for (label, outcome) in &report.outcomes {
        match outcome {
            StepOutcome::Succeeded => success(label),
            StepOutcome::Skipped(kind) => warning(&format!("{label}: {}", kind.label())),
            StepOutcome::Failed { failure: kind, message } => {
                failure(&format!("{label}: {} ({message})", kind.label()))
            }
        }
    }
    println!(
        "{} succeeded, {} skipped, {} failed",
        report.succeeded().to_string().green(),
        report.skipped().to_string().yellow(),
        report.failed().to_string().red()
    );
}

/// Steps as a script runnable in Synapse Studio.
pub fn print_sql_steps(steps: &[SqlStep]) {
    for step in steps {
        println!("-- {}", step.label);
        println!("{}", step.sql);
        println!("GO");
        println!();
    }
}

pub fn print_remediation(kind: SqlFailure) {
    println!("{} {}", "Next steps for".bold(), kind.label().bold());
    for line in kind.remediation() {
        println!("  - {line}");
    }
}
