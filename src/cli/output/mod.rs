mod json;
mod text;
mod xml;

use crate::config::Settings;
use crate::errors::ErrorMessage;

use super::OutputFormat;

pub fn render(diagnostics: &[ErrorMessage], settings: &Settings, format: OutputFormat) {
    match format {
        OutputFormat::Text => text::render(diagnostics, settings),
        OutputFormat::Json => json::render(diagnostics, settings),
        OutputFormat::Xml => xml::render(diagnostics, settings),
    }
}
