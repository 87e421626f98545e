use crate::config::Settings;
use crate::errors::{ErrorLogger, ErrorMessage, Severity};
use crate::tokenizer::Tokenizer;

use super::{report, Check};

/// Division or modulo by a literal zero. Runs on the simplified stream,
/// where constant folding has already reduced `4 - 4` and friends, so the
/// divisor really is the token `0`.
pub struct ZeroDiv;

impl Check for ZeroDiv {
    fn name(&self) -> &'static str {
        "ZeroDiv"
    }

    fn class_info(&self) -> &'static str {
        "Check for integer division by zero"
    }

    fn run_simplified_checks(
        &self,
        tokenizer: &Tokenizer,
        _settings: &Settings,
        logger: &dyn ErrorLogger,
    ) {
        let tokens = tokenizer.tokens();
        let mut id = tokens.front();
        while let Some(current) = id {
            if tokens.matches(current, &["/|%", "0"]) {
                report(
                    logger,
                    tokens,
                    current,
                    Severity::Error,
                    "zerodiv",
                    "Division by zero",
                );
            }
            id = tokens.next(current);
        }
    }

    fn error_messages(&self, logger: &dyn ErrorLogger, _settings: &Settings) {
        logger.report_err(&ErrorMessage::new(
            Vec::new(),
            Severity::Error,
            "Division by zero",
            "zerodiv",
            false,
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checks::test_support::check_simplified;

    #[test]
    fn test_literal_division_by_zero() {
        let logger = check_simplified(&ZeroDiv, "int f() { return 1 / 0; }\n", &Settings::default());
        assert_eq!(logger.ids(), vec!["zerodiv"]);
    }

    #[test]
    fn test_modulo_by_zero() {
        let logger = check_simplified(&ZeroDiv, "int f() { return x % 0; }\n", &Settings::default());
        assert_eq!(logger.ids(), vec!["zerodiv"]);
    }

    #[test]
    fn test_folded_divisor_detected() {
        // 4 - 4 folds to 0 during simplification.
        let logger = check_simplified(
            &ZeroDiv,
            "int f() { return 1 / (4 - 4); }\n",
            &Settings::default(),
        );
        assert_eq!(logger.ids(), vec!["zerodiv"]);
    }

    #[test]
    fn test_nonzero_divisor_ok() {
        let logger = check_simplified(&ZeroDiv, "int f() { return 10 / 2; }\n", &Settings::default());
        assert!(logger.ids().is_empty());
    }

    #[test]
    fn test_float_zero_not_flagged() {
        let logger = check_simplified(
            &ZeroDiv,
            "double f() { return 1 / 0.5; }\n",
            &Settings::default(),
        );
        assert!(logger.ids().is_empty());
    }
}
