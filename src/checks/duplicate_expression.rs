use crate::config::Settings;
use crate::errors::{ErrorLogger, ErrorMessage, Severity};
use crate::tokenizer::Tokenizer;

use super::{report, Check};

const COMPARE_OPS: &[&str] = &["==", "!=", "<", ">", "<=", ">=", "&&", "||"];

/// The same operand on both sides of a comparison or logical operator:
/// `if (a == a)`, `x || x`. Always true or always false, so either a typo
/// or dead code.
pub struct DuplicateExpression;

impl Check for DuplicateExpression {
    fn name(&self) -> &'static str {
        "DuplicateExpression"
    }

    fn class_info(&self) -> &'static str {
        "Check for expressions with the same operand on both sides"
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
            let op = tokens.text(current);
            if !COMPARE_OPS.contains(&op) {
                continue;
            }
            let (Some(lhs), Some(rhs)) = (tokens.prev(current), tokens.next(current)) else {
                continue;
            };

            // Only single-token operands in a clear expression context;
            // `s.a == t.a` has different meaning despite equal texts.
            let context_ok = tokens
                .prev(lhs)
                .is_none_or(|p| matches!(tokens.text(p), "(" | "&&" | "||" | ";"))
                && tokens
                    .next(rhs)
                    .is_none_or(|n| matches!(tokens.text(n), ")" | "&&" | "||" | ";"));
            if !context_ok {
                continue;
            }

            let l = tokens.at(lhs);
            let r = tokens.at(rhs);
            let same = if l.var_id() != 0 || r.var_id() != 0 {
                l.var_id() == r.var_id()
            } else {
                (l.is_name() || l.is_number()) && (r.is_name() || r.is_number())
                    && l.text() == r.text()
            };
            if same {
                let op = op.to_string();
                report(
                    logger,
                    tokens,
                    current,
                    Severity::Style,
                    "duplicateExpression",
                    &format!("Same expression on both sides of '{op}'."),
                );
            }
        }
    }

    fn error_messages(&self, logger: &dyn ErrorLogger, _settings: &Settings) {
        logger.report_err(&ErrorMessage::new(
            Vec::new(),
            Severity::Style,
            "Same expression on both sides of '=='.",
            "duplicateExpression",
            false,
        ));
    }
}
