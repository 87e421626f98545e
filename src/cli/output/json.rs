use serde_json::json;

use crate::config::Settings;
use crate::errors::{ErrorMessage, Severity};

pub fn render(diagnostics: &[ErrorMessage], _settings: &Settings) {
    let count_of = |severity: Severity| {
        diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    };

    let output = json!({
        "summary": {
            "errors": count_of(Severity::Error),
            "warnings": count_of(Severity::Warning),
            "style": count_of(Severity::Style),
            "information": count_of(Severity::Information),
            "total": diagnostics.len(),
        },
        "diagnostics": diagnostics,
    });

    println!("{}", serde_json::to_string_pretty(&output).unwrap());
}
