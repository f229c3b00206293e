use anyhow::{Context, Result};
use clap::ValueEnum;
use colored::*;
use contracts_core::{Diagnostic, Severity};
use contracts_validator::{CheckOutcome, CompiledSql, VerificationReport};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

pub fn print_report(report: &VerificationReport, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => print_json(report),
        OutputFormat::Text => {
            print_text_report(report);
            Ok(())
        }
    }
}

pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{}", json);
    Ok(())
}

fn outcome_label(outcome: CheckOutcome) -> ColoredString {
    let label = format!("{:<13}", outcome.to_string());
    match outcome {
        CheckOutcome::Passed => label.green().bold(),
        CheckOutcome::Failed => label.red().bold(),
        CheckOutcome::NotEvaluated => label.yellow().bold(),
        CheckOutcome::Error => label.magenta().bold(),
    }
}

fn print_text_report(report: &VerificationReport) {
    println!("\n{}", "═".repeat(60));
    println!("{}", "  VERIFICATION REPORT".bold());
    println!("{}", "═".repeat(60));

    for contract in &report.contract_results {
        println!(
            "\n{} {} ({})",
            contract.dataset.bold(),
            format!("@ {}", contract.data_source).dimmed(),
            contract.source
        );
        for result in &contract.check_results {
            println!("  {} {}", outcome_label(result.outcome), result.summary);
            for line in &result.diagnostic_lines {
                println!("  {:<13}   {}", "", line.dimmed());
            }
        }
    }

    print_diagnostics(&report.diagnostics);

    println!("\n{}", "Summary:".bold());
    println!("  Passed:        {}", report.count(CheckOutcome::Passed));
    println!("  Failed:        {}", report.count(CheckOutcome::Failed));
    println!("  Not evaluated: {}", report.count(CheckOutcome::NotEvaluated));
    println!("  Errors:        {}", report.count(CheckOutcome::Error));

    if report.is_ok() {
        println!("\n{} {}", "✓".green().bold(), "Verification PASSED".green().bold());
    } else {
        println!("\n{} {}", "✗".red().bold(), "Verification FAILED".red().bold());
    }
    println!("{}", "═".repeat(60));
}

pub fn print_diagnostics(diagnostics: &[Diagnostic]) {
    if diagnostics.is_empty() {
        return;
    }
    println!("\n{}", "Diagnostics:".bold());
    for diagnostic in diagnostics {
        let text = diagnostic.to_string();
        match diagnostic.severity {
            Severity::Error => println!("  {}", text.red()),
            Severity::Warning => println!("  {}", text.yellow()),
            Severity::Info => println!("  {}", text),
        }
    }
}

pub fn print_compiled_sql(compiled: &CompiledSql) {
    for statement in &compiled.statements {
        println!(
            "\n{}",
            format!("-- {} @ {}", statement.dataset, statement.data_source).dimmed()
        );
        println!("{}", statement.sql);
    }
}

pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message.green());
}

pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red().bold(), message.red());
}

pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}
