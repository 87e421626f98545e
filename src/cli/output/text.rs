use owo_colors::OwoColorize;
use std::collections::HashSet;

use crate::config::Settings;
use crate::errors::{ErrorMessage, Severity};

pub fn render(diagnostics: &[ErrorMessage], settings: &Settings) {
    // A custom template bypasses the pretty output entirely.
    if !settings.template.is_empty() {
        for d in diagnostics {
            println!("{}", d.format(settings.verbose, &settings.template));
        }
        return;
    }

    if diagnostics.is_empty() {
        println!();
        println!("  {}", "\u{2501}".repeat(50).dimmed());
        println!("  {}", "no issues found".green());
        println!();
        return;
    }

    let count_of = |severity: Severity| {
        diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    };
    let errors = count_of(Severity::Error);
    let warnings = count_of(Severity::Warning);
    let others = diagnostics.len() - errors - warnings;

    println!();
    println!("  {}", "\u{2501}".repeat(50).dimmed());
    let mut parts = Vec::new();
    if errors > 0 {
        parts.push(format!("{errors} errors").red().bold().to_string());
    }
    if warnings > 0 {
        parts.push(format!("{warnings} warnings").yellow().bold().to_string());
    }
    if others > 0 {
        parts.push(format!("{others} other findings").blue().to_string());
    }
    let file_count = diagnostics
        .iter()
        .filter_map(|d| d.location().map(|l| &l.file))
        .collect::<HashSet<_>>()
        .len();
    println!("  {} across {} files", parts.join(", "), file_count.bold());
    println!("  {}", "\u{2501}".repeat(50).dimmed());
    println!();

    for d in diagnostics {
        let severity_label = match d.severity {
            Severity::Error => d.severity.to_string().red().bold().to_string(),
            Severity::Warning => d.severity.to_string().yellow().bold().to_string(),
            _ => d.severity.to_string().blue().to_string(),
        };
        let location = d
            .location()
            .map(|l| format!("{}:{}", l.file, l.line))
            .unwrap_or_default();
        let message = if settings.verbose {
            d.verbose_message()
        } else {
            d.short_message()
        };
        println!(
            "  {} {} {} {}",
            location.dimmed(),
            severity_label,
            message,
            format!("[{}]", d.id).dimmed()
        );
    }
    println!();
}
