use crate::config::Settings;
use crate::errors::{ErrorLogger, ErrorMessage, Severity};
use crate::tokenizer::Tokenizer;

use super::{report, Check};

/// `sizeof` applied to a numeric constant measures the type of the
/// literal, which is almost never what the author meant.
pub struct SizeofMisuse;

const MESSAGE: &str = "Suspicious usage of 'sizeof' with a numeric constant as parameter";

impl Check for SizeofMisuse {
    fn name(&self) -> &'static str {
        "SizeofMisuse"
    }

    fn class_info(&self) -> &'static str {
        "Check for suspicious sizeof expressions"
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
            if tokens.matches(current, &["sizeof", "(", "%num%", ")"])
                || tokens.matches(current, &["sizeof", "%num%"])
            {
                report(
                    logger,
                    tokens,
                    current,
                    Severity::Warning,
                    "sizeofwithnumericparameter",
                    MESSAGE,
                );
            }
            id = tokens.next(current);
        }
    }

    fn error_messages(&self, logger: &dyn ErrorLogger, _settings: &Settings) {
        logger.report_err(&ErrorMessage::new(
            Vec::new(),
            Severity::Warning,
            MESSAGE,
            "sizeofwithnumericparameter",
            false,
        ));
    }
}
