pub mod assign_in_condition;
pub mod duplicate_expression;
pub mod null_pointer;
pub mod obsolete_functions;
pub mod sizeof_misuse;
pub mod unused_functions;
pub mod zero_div;

use std::collections::HashSet;

use crate::config::Settings;
use crate::errors::{ErrorLogger, ErrorMessage, FileLocation, Severity};
use crate::tokenizer::{TokenId, TokenList, Tokenizer};

/// One defect category. Implementations traverse the token stream
/// read-only and report findings exclusively through the logger; the only
/// sanctioned private state is cross-file accumulation (unused functions).
pub trait Check: Send + Sync {
    /// Human-readable check name, used for progress reporting.
    fn name(&self) -> &'static str;

    /// One-line description of what the check looks for.
    fn class_info(&self) -> &'static str;

    /// Run against the freshly tokenized, unsimplified stream. Most
    /// checks have nothing to do here; patterns that simplification
    /// destroys (e.g. macro-expanded calls) are caught in this pass.
    fn run_checks(&self, _tokenizer: &Tokenizer, _settings: &Settings, _logger: &dyn ErrorLogger) {}

    /// Run against the simplified, canonical stream.
    fn run_simplified_checks(
        &self,
        tokenizer: &Tokenizer,
        settings: &Settings,
        logger: &dyn ErrorLogger,
    );

    /// Emit one example of every diagnostic this check can produce
    /// (`cclint errorlist`).
    fn error_messages(&self, logger: &dyn ErrorLogger, settings: &Settings);

    /// Whole-program pre-pass: contribute cross-file facts about one
    /// file. Runs single-threaded over every file before any checking
    /// starts, so `data` needs no locking.
    fn analyse(&self, _tokenizer: &Tokenizer, _data: &mut HashSet<String>) {}

    /// Receive the combined pre-pass facts once the pre-pass is done.
    fn save_analysis_data(&self, _data: &HashSet<String>) {}
}

/// The registry. Iteration order is the declaration order below and is
/// the same for every file, which keeps diagnostic order reproducible
/// across runs. Built once at startup and passed by reference into the
/// engine.
pub fn all_checks() -> Vec<Box<dyn Check>> {
    // Every built-in check must be listed explicitly here.
    vec![
        Box::new(assign_in_condition::AssignInCondition),
        Box::new(duplicate_expression::DuplicateExpression),
        Box::new(null_pointer::NullPointer),
        Box::new(obsolete_functions::ObsoleteFunctions),
        Box::new(sizeof_misuse::SizeofMisuse),
        Box::new(zero_div::ZeroDiv),
        Box::new(unused_functions::UnusedFunctions::default()),
    ]
}

/// Report a finding located at one token.
pub(crate) fn report(
    logger: &dyn ErrorLogger,
    tokens: &TokenList,
    tok: TokenId,
    severity: Severity,
    id: &str,
    msg: &str,
) {
    report_with(logger, tokens, tok, severity, id, msg, false);
}

pub(crate) fn report_with(
    logger: &dyn ErrorLogger,
    tokens: &TokenList,
    tok: TokenId,
    severity: Severity,
    id: &str,
    msg: &str,
    inconclusive: bool,
) {
    let t = tokens.at(tok);
    let location = FileLocation::new(tokens.file_name(t.file_index()), t.line());
    logger.report_err(&ErrorMessage::new(
        vec![location],
        severity,
        msg,
        id,
        inconclusive,
    ));
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use std::sync::Mutex;

    pub struct CollectingLogger {
        pub errors: Mutex<Vec<ErrorMessage>>,
    }

    impl CollectingLogger {
        pub fn new() -> Self {
            Self {
                errors: Mutex::new(Vec::new()),
            }
        }

        pub fn ids(&self) -> Vec<String> {
            self.errors
                .lock()
                .unwrap()
                .iter()
                .map(|e| e.id.clone())
                .collect()
        }

        pub fn lines(&self) -> Vec<u32> {
            self.errors
                .lock()
                .unwrap()
                .iter()
                .filter_map(|e| e.location().map(|l| l.line))
                .collect()
        }
    }

    impl ErrorLogger for CollectingLogger {
        fn report_out(&self, _outmsg: &str) {}
        fn report_err(&self, msg: &ErrorMessage) {
            self.errors.lock().unwrap().push(msg.clone());
        }
    }

    /// Tokenize + simplify `code` and run one check's simplified pass.
    pub fn check_simplified(check: &dyn Check, code: &str, settings: &Settings) -> CollectingLogger {
        let mut tokenizer = Tokenizer::new(settings);
        tokenizer.tokenize(code, "test.c", "").unwrap();
        tokenizer.fill_function_list();
        assert!(tokenizer.simplify_token_list());
        tokenizer.fill_function_list();
        let logger = CollectingLogger::new();
        check.run_simplified_checks(&tokenizer, settings, &logger);
        logger
    }

    /// Tokenize `code` without simplifying and run one check's raw pass.
    pub fn check_raw(check: &dyn Check, code: &str, settings: &Settings) -> CollectingLogger {
        let mut tokenizer = Tokenizer::new(settings);
        tokenizer.tokenize(code, "test.c", "").unwrap();
        tokenizer.fill_function_list();
        let logger = CollectingLogger::new();
        check.run_checks(&tokenizer, settings, &logger);
        logger
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_order_is_stable() {
        let first: Vec<&str> = all_checks().iter().map(|c| c.name()).collect();
        let second: Vec<&str> = all_checks().iter().map(|c| c.name()).collect();
        assert_eq!(first, second);
        assert!(first.contains(&"NullPointer"));
        assert!(first.contains(&"UnusedFunctions"));
    }

    #[test]
    fn test_every_check_has_class_info() {
        for check in all_checks() {
            assert!(!check.class_info().is_empty(), "{} lacks info", check.name());
        }
    }

    #[test]
    fn test_error_messages_produce_samples() {
        let settings = Settings::default();
        let logger = test_support::CollectingLogger::new();
        for check in all_checks() {
            check.error_messages(&logger, &settings);
        }
        let ids = logger.ids();
        assert!(ids.iter().any(|id| id == "zerodiv"));
        assert!(ids.iter().any(|id| id == "nullPointer"));
        assert!(ids.iter().any(|id| id == "unusedFunction"));
    }
}
