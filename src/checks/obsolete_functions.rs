use crate::config::Settings;
use crate::errors::{ErrorLogger, ErrorMessage, Severity};
use crate::tokenizer::Tokenizer;

use super::{report, Check};

/// Obsolete libc interfaces and the replacement each message suggests.
/// Checked against the raw stream: a macro-conditioned build may only
/// show these calls before simplification rewrites the surroundings.
const OBSOLETE_FUNCTIONS: &[(&str, &str)] = &[
    (
        "gets",
        "Found obsolete function 'gets'. With 'gets' you'll get a buffer overrun if the input data exceeds the size of the buffer. It is recommended to use the function 'fgets' instead.",
    ),
    (
        "bsd_signal",
        "Found obsolete function 'bsd_signal'. It is recommended to use the function 'sigaction' instead.",
    ),
    (
        "gethostbyname",
        "Found obsolete function 'gethostbyname'. It is recommended to use the function 'getaddrinfo' instead.",
    ),
    (
        "gethostbyaddr",
        "Found obsolete function 'gethostbyaddr'. It is recommended to use the function 'getnameinfo' instead.",
    ),
    (
        "usleep",
        "Found obsolete function 'usleep'. It is recommended to use the 'nanosleep' or 'setitimer' function instead.",
    ),
    (
        "bzero",
        "Found obsolete function 'bzero'. It is recommended to use the function 'memset' instead.",
    ),
    (
        "bcmp",
        "Found obsolete function 'bcmp'. It is recommended to use the function 'memcmp' instead.",
    ),
    (
        "bcopy",
        "Found obsolete function 'bcopy'. It is recommended to use the function 'memmove' or 'memcpy' instead.",
    ),
    (
        "index",
        "Found obsolete function 'index'. It is recommended to use the function 'strchr' instead.",
    ),
    (
        "rindex",
        "Found obsolete function 'rindex'. It is recommended to use the function 'strrchr' instead.",
    ),
];

pub struct ObsoleteFunctions;

impl Check for ObsoleteFunctions {
    fn name(&self) -> &'static str {
        "ObsoleteFunctions"
    }

    fn class_info(&self) -> &'static str {
        "Warn if any of the obsolete libc functions are used"
    }

    fn run_checks(&self, tokenizer: &Tokenizer, settings: &Settings, logger: &dyn ErrorLogger) {
        if !settings.is_enabled("style") {
            return;
        }

        let tokens = tokenizer.tokens();
        let mut id = tokens.front();
        while let Some(current) = id {
            id = tokens.next(current);

            let tok = tokens.at(current);
            if !tok.is_name() || tok.var_id() != 0 {
                continue;
            }
            let is_call = tokens.next(current).is_some_and(|n| tokens.text(n) == "(");
            if !is_call {
                continue;
            }
            // A member access or qualified name is some other function
            // that happens to share the name.
            let prev_ok = match tokens.prev(current) {
                None => true,
                Some(p) => {
                    let prev = tokens.at(p);
                    !prev.is_name() && !matches!(prev.text(), "." | "::" | ":" | ",")
                }
            };
            if !prev_ok {
                continue;
            }

            if let Some((name, message)) = OBSOLETE_FUNCTIONS
                .iter()
                .find(|(name, _)| *name == tok.text())
            {
                // Old code bases may not care to migrate; style, not error.
                report(
                    logger,
                    tokens,
                    current,
                    Severity::Style,
                    &format!("obsoleteFunctions{name}"),
                    message,
                );
            }
        }
    }

    fn run_simplified_checks(
        &self,
        _tokenizer: &Tokenizer,
        _settings: &Settings,
        _logger: &dyn ErrorLogger,
    ) {
    }

    fn error_messages(&self, logger: &dyn ErrorLogger, _settings: &Settings) {
        for (name, message) in OBSOLETE_FUNCTIONS {
            logger.report_err(&ErrorMessage::new(
                Vec::new(),
                Severity::Style,
                message,
                format!("obsoleteFunctions{name}"),
                false,
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checks::test_support::check_raw;

    fn settings_with_style() -> Settings {
        let mut settings = Settings::default();
        settings.enabled = vec!["style".into()];
        settings
    }

    #[test]
    fn test_gets_flagged() {
        let logger = check_raw(
            &ObsoleteFunctions,
            "void f() { gets(buf); }\n",
            &settings_with_style(),
        );
        assert_eq!(logger.ids(), vec!["obsoleteFunctionsgets"]);
    }

    #[test]
    fn test_requires_style_enabled() {
        let logger = check_raw(
            &ObsoleteFunctions,
            "void f() { gets(buf); }\n",
            &Settings::default(),
        );
        assert!(logger.ids().is_empty());
    }

    #[test]
    fn test_member_call_not_flagged() {
        let logger = check_raw(
            &ObsoleteFunctions,
            "void f() { s.index(1); t::index(2); }\n",
            &settings_with_style(),
        );
        assert!(logger.ids().is_empty());
    }

    #[test]
    fn test_variable_with_same_name_not_flagged() {
        // `index` here is a declared variable, not a call.
        let logger = check_raw(
            &ObsoleteFunctions,
            "void f() { int index = 0; index = 2; }\n",
            &settings_with_style(),
        );
        assert!(logger.ids().is_empty());
    }

    #[test]
    fn test_usleep_flagged_with_line() {
        let logger = check_raw(
            &ObsoleteFunctions,
            "void f() {\n    usleep(100);\n}\n",
            &settings_with_style(),
        );
        assert_eq!(logger.ids(), vec!["obsoleteFunctionsusleep"]);
        assert_eq!(logger.lines(), vec![2]);
    }
}
