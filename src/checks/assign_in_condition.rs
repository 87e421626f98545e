use crate::config::Settings;
use crate::errors::{ErrorLogger, ErrorMessage, Severity};
use crate::tokenizer::Tokenizer;

use super::{report, Check};

const MESSAGE: &str = "Suspicious assignment in condition. Did you intend to use '==' instead?";

/// A plain `=` inside an `if`/`while` condition. Comparisons tokenize as
/// `==`, so any single `=` between the condition parentheses is an
/// assignment.
pub struct AssignInCondition;

impl Check for AssignInCondition {
    fn name(&self) -> &'static str {
        "AssignInCondition"
    }

    fn class_info(&self) -> &'static str {
        "Check for assignments inside if/while conditions"
    }

    fn run_simplified_checks(
        &self,
        tokenizer: &Tokenizer,
        settings: &Settings,
        logger: &dyn ErrorLogger,
    ) {
        if !settings.is_enabled("style") {
            return;
        }

        let tokens = tokenizer.tokens();
        let mut id = tokens.front();
        while let Some(current) = id {
            id = tokens.next(current);
            if !tokens.matches(current, &["if|while", "("]) {
                continue;
            }
            let open = tokens.next(current).unwrap();
            let Some(close) = tokens.at(open).link() else {
                continue;
            };

            let mut inner = tokens.next(open);
            while let Some(t) = inner {
                if t == close {
                    break;
                }
                if tokens.text(t) == "="
                    && tokens.prev(t).is_some_and(|p| tokens.at(p).is_name())
                {
                    report(
                        logger,
                        tokens,
                        t,
                        Severity::Style,
                        "assignmentInCondition",
                        MESSAGE,
                    );
                    break;
                }
                inner = tokens.next(t);
            }
            // Continue the outer walk after the condition.
            id = tokens.next(close);
        }
    }

    fn error_messages(&self, logger: &dyn ErrorLogger, _settings: &Settings) {
        logger.report_err(&ErrorMessage::new(
            Vec::new(),
            Severity::Style,
            MESSAGE,
            "assignmentInCondition",
            false,
        ));
    }
}
