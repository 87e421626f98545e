use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use crate::config::Settings;
use crate::errors::{ErrorLogger, ErrorMessage, FileLocation, Severity};
use crate::tokenizer::Tokenizer;

use super::Check;

#[derive(Debug, Default, Clone)]
struct FunctionUsage {
    filename: String,
    line: u32,
    defined: bool,
    used: bool,
}

/// The one stateful check: it accumulates definitions and call sites
/// across every file of the run and is finalized once, after the last
/// file, by the orchestrator. Each file's contribution happens under the
/// internal lock; `finalize` must only run after all workers have joined.
#[derive(Default)]
pub struct UnusedFunctions {
    functions: Mutex<HashMap<String, FunctionUsage>>,
}

impl UnusedFunctions {
    /// Record one file's function definitions and call sites.
    pub fn parse_tokens(&self, tokenizer: &Tokenizer) {
        let mut functions = self.functions.lock().unwrap();

        for function in tokenizer.functions() {
            if !function.has_body || function.name == "main" {
                continue;
            }
            let entry = functions.entry(function.name.clone()).or_default();
            entry.defined = true;
            entry.filename = tokenizer
                .tokens()
                .file_name(function.file_index)
                .to_string();
            entry.line = function.line;
        }

        for name in tokenizer.function_calls() {
            functions.entry(name.clone()).or_default().used = true;
        }
    }

    /// Report every function that was defined but never called anywhere
    /// in the run.
    pub fn finalize(&self, logger: &dyn ErrorLogger) {
        let functions = self.functions.lock().unwrap();
        let mut names: Vec<&String> = functions
            .iter()
            .filter(|(_, usage)| usage.defined && !usage.used)
            .map(|(name, _)| name)
            .collect();
        names.sort();

        for name in names {
            let usage = &functions[name];
            logger.report_err(&ErrorMessage::new(
                vec![FileLocation::new(&usage.filename, usage.line)],
                Severity::Style,
                &format!("The function '{name}' is never used."),
                "unusedFunction",
                false,
            ));
        }
    }
}

impl Check for UnusedFunctions {
    fn name(&self) -> &'static str {
        "UnusedFunctions"
    }

    fn class_info(&self) -> &'static str {
        "Check for functions that are never called"
    }

    /// Accumulation is driven by the orchestrator through `parse_tokens`
    /// and `finalize`; the registry entry only provides the errorlist
    /// sample.
    fn run_simplified_checks(
        &self,
        _tokenizer: &Tokenizer,
        _settings: &Settings,
        _logger: &dyn ErrorLogger,
    ) {
    }

    fn error_messages(&self, logger: &dyn ErrorLogger, _settings: &Settings) {
        logger.report_err(&ErrorMessage::new(
            Vec::new(),
            Severity::Style,
            "The function 'funcName' is never used.",
            "unusedFunction",
            false,
        ));
    }

    fn analyse(&self, tokenizer: &Tokenizer, data: &mut HashSet<String>) {
        for function in tokenizer.functions() {
            if function.has_body && function.name != "main" {
                let filename = tokenizer.tokens().file_name(function.file_index);
                data.insert(format!(
                    "defined:{}:{}:{}",
                    function.name, function.line, filename
                ));
            }
        }
        for name in tokenizer.function_calls() {
            data.insert(format!("called:{name}"));
        }
    }

    fn save_analysis_data(&self, data: &HashSet<String>) {
        let mut functions = self.functions.lock().unwrap();
        for entry in data {
            if let Some(rest) = entry.strip_prefix("defined:") {
                let mut parts = rest.splitn(3, ':');
                let name = parts.next().unwrap_or("");
                let line = parts.next().and_then(|l| l.parse().ok()).unwrap_or(0);
                let filename = parts.next().unwrap_or("");
                let usage = functions.entry(name.to_string()).or_default();
                usage.defined = true;
                usage.line = line;
                usage.filename = filename.to_string();
            } else if let Some(name) = entry.strip_prefix("called:") {
                functions.entry(name.to_string()).or_default().used = true;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checks::test_support::CollectingLogger;

    fn parse(accumulator: &UnusedFunctions, code: &str, filename: &str) {
        let settings = Settings::default();
        let mut tokenizer = Tokenizer::new(&settings);
        tokenizer.tokenize(code, filename, "").unwrap();
        tokenizer.fill_function_list();
        accumulator.parse_tokens(&tokenizer);
    }

    #[test]
    fn test_unused_function_reported() {
        let accumulator = UnusedFunctions::default();
        parse(&accumulator, "void helper() { }\nint main() { return 0; }\n", "a.c");

        let logger = CollectingLogger::new();
        accumulator.finalize(&logger);
        let errors = logger.errors.lock().unwrap();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].id, "unusedFunction");
        assert!(errors[0].short_message().contains("'helper'"));
        assert_eq!(errors[0].location().unwrap().file, "a.c");
    }

    #[test]
    fn test_called_function_not_reported() {
        let accumulator = UnusedFunctions::default();
        parse(
            &accumulator,
            "void helper() { }\nint main() { helper(); return 0; }\n",
            "a.c",
        );

        let logger = CollectingLogger::new();
        accumulator.finalize(&logger);
        assert!(logger.errors.lock().unwrap().is_empty());
    }

    #[test]
    fn test_cross_file_call_counts_as_use() {
        let accumulator = UnusedFunctions::default();
        parse(&accumulator, "void helper() { }\n", "lib.c");
        parse(&accumulator, "int main() { helper(); return 0; }\n", "main.c");

        let logger = CollectingLogger::new();
        accumulator.finalize(&logger);
        assert!(logger.errors.lock().unwrap().is_empty());
    }

    #[test]
    fn test_call_seen_before_definition() {
        let accumulator = UnusedFunctions::default();
        parse(&accumulator, "int main() { helper(); return 0; }\n", "main.c");
        parse(&accumulator, "void helper() { }\n", "lib.c");

        let logger = CollectingLogger::new();
        accumulator.finalize(&logger);
        assert!(logger.errors.lock().unwrap().is_empty());
    }

    #[test]
    fn test_main_never_reported() {
        let accumulator = UnusedFunctions::default();
        parse(&accumulator, "int main() { return 0; }\n", "a.c");

        let logger = CollectingLogger::new();
        accumulator.finalize(&logger);
        assert!(logger.errors.lock().unwrap().is_empty());
    }

    #[test]
    fn test_analyse_and_save_round_trip() {
        let settings = Settings::default();
        let mut tokenizer = Tokenizer::new(&settings);
        tokenizer
            .tokenize("void helper() { }\nvoid orphan() { }\n", "lib.c", "")
            .unwrap();
        tokenizer.fill_function_list();

        let mut data = HashSet::new();
        let producer = UnusedFunctions::default();
        producer.analyse(&tokenizer, &mut data);

        let mut tokenizer = Tokenizer::new(&settings);
        tokenizer
            .tokenize("int main() { helper(); return 0; }\n", "main.c", "")
            .unwrap();
        tokenizer.fill_function_list();
        producer.analyse(&tokenizer, &mut data);

        // A fresh accumulator fed only the analysis data reaches the same
        // verdict as direct per-file parsing.
        let consumer = UnusedFunctions::default();
        consumer.save_analysis_data(&data);
        let logger = CollectingLogger::new();
        consumer.finalize(&logger);
        let errors = logger.errors.lock().unwrap();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].short_message().contains("'orphan'"));
        assert_eq!(errors[0].location().unwrap().file, "lib.c");
        assert_eq!(errors[0].location().unwrap().line, 2);
    }

    #[test]
    fn test_report_order_is_sorted() {
        let accumulator = UnusedFunctions::default();
        parse(&accumulator, "void zeta() { }\nvoid alpha() { }\n", "a.c");

        let logger = CollectingLogger::new();
        accumulator.finalize(&logger);
        let errors = logger.errors.lock().unwrap();
        assert_eq!(errors.len(), 2);
        assert!(errors[0].short_message().contains("'alpha'"));
        assert!(errors[1].short_message().contains("'zeta'"));
    }
}
