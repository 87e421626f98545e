pub mod output;

use clap::{Parser, Subcommand, ValueEnum};
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Mutex;

use crate::errors::{ErrorLogger, ErrorMessage};

#[derive(Parser, Debug)]
#[command(
    name = "cclint",
    version,
    about = "Static analysis for C and C++ source files"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check C/C++ source files
    Check {
        /// File or directory to check
        path: PathBuf,

        /// Output format
        #[arg(long)]
        format: Option<OutputFormat>,

        /// Path to config file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Preprocessor defines, e.g. -D "WIN32;DEBUG=1"
        #[arg(short = 'D', long = "define")]
        defines: Option<String>,

        /// Extra include search path (repeatable)
        #[arg(short = 'I', long = "include-path")]
        include_paths: Vec<PathBuf>,

        /// Extra diagnostic categories: style, performance, portability,
        /// information, unusedFunctions, missingInclude, all
        #[arg(long, value_delimiter = ',')]
        enable: Vec<String>,

        /// Check all #ifdef configurations in every file
        #[arg(short, long)]
        force: bool,

        /// Number of files checked in parallel
        #[arg(short, long)]
        jobs: Option<usize>,

        /// Maximum #ifdef configurations checked per file
        #[arg(long)]
        max_configs: Option<usize>,

        /// Also report findings the checks are not certain about
        #[arg(long)]
        inconclusive: bool,

        /// Use verbose diagnostic messages
        #[arg(short, long)]
        verbose: bool,

        /// Only print the findings, no progress output
        #[arg(short, long)]
        quiet: bool,

        /// Suppression rule id[:file[:line]] (repeatable)
        #[arg(long = "suppress")]
        suppress: Vec<String>,

        /// File with one suppression rule per line
        #[arg(long)]
        suppressions_list: Option<PathBuf>,

        /// Line template, e.g. "{file}:{line},{severity},{id},{message}"
        #[arg(long)]
        template: Option<String>,

        /// XML format version used with --format xml
        #[arg(long)]
        xml_version: Option<u32>,
    },
    /// Print one example of every diagnostic the checks can produce
    Errorlist {
        /// XML format version
        #[arg(long)]
        xml_version: Option<u32>,
    },
    /// Create a default .cclintrc.toml
    Init,
}

#[derive(Debug, Clone, Copy, ValueEnum, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
    Xml,
}

/// Logger used by the CLI: progress lines go to stderr immediately,
/// diagnostics are collected and rendered once the run is complete.
#[derive(Default)]
pub struct CliLogger {
    quiet: bool,
    diagnostics: Mutex<Vec<ErrorMessage>>,
}

impl CliLogger {
    pub fn new(quiet: bool) -> Self {
        Self {
            quiet,
            diagnostics: Mutex::new(Vec::new()),
        }
    }

    /// Collected diagnostics in stable order: by file, line, then id.
    pub fn into_diagnostics(self) -> Vec<ErrorMessage> {
        let mut diagnostics = self.diagnostics.into_inner().unwrap();
        diagnostics.sort_by(|a, b| {
            let ka = a.location().map(|l| (l.file.clone(), l.line));
            let kb = b.location().map(|l| (l.file.clone(), l.line));
            ka.cmp(&kb).then_with(|| a.id.cmp(&b.id))
        });
        diagnostics
    }
}

impl ErrorLogger for CliLogger {
    fn report_out(&self, outmsg: &str) {
        if !self.quiet {
            eprintln!("{outmsg}");
        }
    }

    fn report_err(&self, msg: &ErrorMessage) {
        self.diagnostics.lock().unwrap().push(msg.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{FileLocation, Severity};

    #[test]
    fn test_cli_logger_sorts_diagnostics() {
        let logger = CliLogger::new(true);
        for (file, line) in [("b.c", 1), ("a.c", 9), ("a.c", 2)] {
            logger.report_err(&ErrorMessage::new(
                vec![FileLocation::new(file, line)],
                Severity::Error,
                "m",
                "id",
                false,
            ));
        }
        let sorted = logger.into_diagnostics();
        let order: Vec<(String, u32)> = sorted
            .iter()
            .map(|d| {
                let l = d.location().unwrap();
                (l.file.clone(), l.line)
            })
            .collect();
        assert_eq!(
            order,
            vec![
                ("a.c".to_string(), 2),
                ("a.c".to_string(), 9),
                ("b.c".to_string(), 1)
            ]
        );
    }
}
