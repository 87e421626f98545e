use crate::config::Settings;
use crate::errors::{ErrorLogger, ErrorMessage, Severity};
use crate::tokenizer::{TokenId, TokenList, Tokenizer};

use super::{report, Check};

const ASSIGN_OPS: &[&str] = &[
    "=", "+=", "-=", "*=", "/=", "%=", "&=", "|=", "^=", "<<=", ">>=",
];

/// Dereference of a pointer directly after it was assigned null, with no
/// intervening reassignment, address-taking or control flow. Runs on the
/// simplified stream so `NULL` and `nullptr` are already the token `0`.
pub struct NullPointer;

impl Check for NullPointer {
    fn name(&self) -> &'static str {
        "NullPointer"
    }

    fn class_info(&self) -> &'static str {
        "Check for null pointer dereferences"
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
            id = tokens.next(current);
            if tokens.at(current).var_id() == 0
                || !tokens.matches(current, &["%var%", "=", "0", ";"])
            {
                continue;
            }
            let var_id = tokens.at(current).var_id();
            let name = tokens.text(current).to_string();
            let start = tokens.nth_next(current, 3).unwrap();
            if let Some(deref) = find_deref(tokens, start, var_id) {
                report(
                    logger,
                    tokens,
                    deref,
                    Severity::Error,
                    "nullPointer",
                    &format!("Possible null pointer dereference: {name}"),
                );
            }
        }
    }

    fn error_messages(&self, logger: &dyn ErrorLogger, _settings: &Settings) {
        logger.report_err(&ErrorMessage::new(
            Vec::new(),
            Severity::Error,
            "Possible null pointer dereference: p",
            "nullPointer",
            false,
        ));
    }
}

/// Scan forward from `start` for a dereference of `var_id`. Gives up at
/// the end of the enclosing block, at branching control flow and at any
/// use that could change or escape the pointer.
fn find_deref(tokens: &TokenList, start: TokenId, var_id: u32) -> Option<TokenId> {
    let mut depth: usize = 0;
    let mut id = Some(start);
    while let Some(current) = id {
        id = tokens.next(current);
        let tok = tokens.at(current);
        match tok.text() {
            "{" => depth += 1,
            "}" => {
                if depth == 0 {
                    return None;
                }
                depth -= 1;
            }
            // A branch may test the pointer first; stop guessing.
            "if" | "while" | "for" | "switch" | "goto" => return None,
            "&" => {
                if id.is_some_and(|n| tokens.at(n).var_id() == var_id) {
                    return None;
                }
            }
            _ if tok.var_id() == var_id => {
                let prev_text = tokens.prev(current).map(|p| tokens.text(p)).unwrap_or("");
                let next_text = tokens.next(current).map(|n| tokens.text(n)).unwrap_or("");

                if prev_text == "*" {
                    // Unary deref unless the '*' is a multiplication.
                    let before = tokens
                        .prev(current)
                        .and_then(|p| tokens.prev(p))
                        .map(|pp| tokens.at(pp));
                    let is_mul = before.is_some_and(|t| {
                        t.is_name() || t.is_number() || matches!(t.text(), ")" | "]")
                    });
                    if !is_mul {
                        return Some(current);
                    }
                }
                if next_text == "->" || next_text == "[" {
                    return Some(current);
                }
                if ASSIGN_OPS.contains(&next_text)
                    || next_text == "++"
                    || next_text == "--"
                    || prev_text == "++"
                    || prev_text == "--"
                {
                    return None;
                }
                // Any other use (passed along, compared, ...) ends the
                // window we can reason about.
                return None;
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checks::test_support::check_simplified;

    #[test]
    fn test_deref_after_null_assignment() {
        let logger = check_simplified(
            &NullPointer,
            "void f() { int *p; p = 0; *p = 1; }\n",
            &Settings::default(),
        );
        assert_eq!(logger.ids(), vec!["nullPointer"]);
    }

    #[test]
    fn test_null_macro_detected_via_simplification() {
        let logger = check_simplified(
            &NullPointer,
            "void f() { int *p; p = NULL; *p = 1; }\n",
            &Settings::default(),
        );
        assert_eq!(logger.ids(), vec!["nullPointer"]);
    }

    #[test]
    fn test_arrow_deref() {
        let logger = check_simplified(
            &NullPointer,
            "void f() { int *s; s = 0; s->x = 1; }\n",
            &Settings::default(),
        );
        assert_eq!(logger.ids(), vec!["nullPointer"]);
    }

    #[test]
    fn test_index_deref() {
        let logger = check_simplified(
            &NullPointer,
            "void f() { int *p; p = 0; p[2] = 1; }\n",
            &Settings::default(),
        );
        assert_eq!(logger.ids(), vec!["nullPointer"]);
    }

    #[test]
    fn test_reassignment_clears_suspicion() {
        let logger = check_simplified(
            &NullPointer,
            "void f() { int *p; p = 0; p = q; *p = 1; }\n",
            &Settings::default(),
        );
        assert!(logger.ids().is_empty());
    }

    #[test]
    fn test_guarding_if_stops_scan() {
        let logger = check_simplified(
            &NullPointer,
            "void f() { int *p; p = 0; if (q) { *p = 1; } }\n",
            &Settings::default(),
        );
        assert!(logger.ids().is_empty());
    }

    #[test]
    fn test_address_taken_stops_scan() {
        let logger = check_simplified(
            &NullPointer,
            "void f() { int *p; p = 0; g(&p); *p = 1; }\n",
            &Settings::default(),
        );
        assert!(logger.ids().is_empty());
    }

    #[test]
    fn test_scan_does_not_leave_enclosing_block() {
        let logger = check_simplified(
            &NullPointer,
            "void f() { { int *p; p = 0; } *p = 1; }\n",
            &Settings::default(),
        );
        assert!(logger.ids().is_empty());
    }

    #[test]
    fn test_deref_in_return() {
        let logger = check_simplified(
            &NullPointer,
            "int f() { int *p; p = 0; return *p; }\n",
            &Settings::default(),
        );
        assert_eq!(logger.ids(), vec!["nullPointer"]);
    }

    #[test]
    fn test_multiplication_not_deref() {
        let logger = check_simplified(
            &NullPointer,
            "void f() { int p; p = 0; x = y * p; }\n",
            &Settings::default(),
        );
        assert!(logger.ids().is_empty());
    }
}
