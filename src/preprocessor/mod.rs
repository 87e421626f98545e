mod expr;

use regex::Regex;
use std::collections::HashMap;
use std::path::Path;
use std::sync::LazyLock;

use crate::config::Settings;
use crate::errors::{ErrorLogger, ErrorMessage, FileLocation, Severity};

static DIRECTIVE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*#\s*(\w+)\s*(.*?)\s*$").unwrap());
static QUOTED_INCLUDE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"^\s*#\s*include\s*"([^"]+)""#).unwrap());
static DEFINED_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"defined\s*\(?\s*(\w+)\s*\)?").unwrap());

#[derive(Debug, thiserror::Error)]
pub enum PreprocessorError {
    #[error("unterminated block comment starting at line {0}")]
    UnterminatedComment(u32),
    #[error("#endif without matching #if at line {0}")]
    StrayEndif(u32),
    #[error("#else without matching #if at line {0}")]
    StrayElse(u32),
    #[error("missing #endif for conditional starting at line {0}")]
    MissingEndif(u32),
}

/// Resolves the `#ifdef` configuration space of one source file.
///
/// `preprocess` strips comments and enumerates configurations; `getcode`
/// then produces the text for one configuration. Both preserve the total
/// line count exactly, so every diagnostic maps back to a true source
/// line: removed branches and directive lines become blank lines, never
/// compacted text.
pub struct Preprocessor<'a> {
    settings: &'a Settings,
    logger: &'a dyn ErrorLogger,
}

impl<'a> Preprocessor<'a> {
    pub fn new(settings: &'a Settings, logger: &'a dyn ErrorLogger) -> Self {
        Self { settings, logger }
    }

    /// Produce comment-free base text plus the ordered set of distinct
    /// configuration keys. Discovery is order-stable (first seen first)
    /// and the empty configuration is always enumerated.
    pub fn preprocess(
        &self,
        source: &str,
        filename: &str,
    ) -> Result<(String, Vec<String>), PreprocessorError> {
        let text = remove_comments(source)?;
        let configs = get_configs(&text)?;
        if self.settings.is_enabled("missingInclude") {
            self.report_missing_includes(&text, filename);
        }
        Ok((text, configs))
    }

    /// Report quoted includes that resolve neither next to the source file
    /// nor in any configured include path.
    fn report_missing_includes(&self, text: &str, filename: &str) {
        let source_dir = Path::new(filename).parent();
        for (idx, line) in text.lines().enumerate() {
            let Some(caps) = QUOTED_INCLUDE.captures(line) else {
                continue;
            };
            let header = &caps[1];
            let found_local = source_dir.is_some_and(|d| d.join(header).exists());
            let found_in_paths = self
                .settings
                .include_paths
                .iter()
                .any(|p| p.join(header).exists());
            if !found_local && !found_in_paths {
                self.logger.report_err(&ErrorMessage::new(
                    vec![FileLocation::new(filename, idx as u32 + 1)],
                    Severity::Information,
                    &format!("Include file: \"{header}\" not found."),
                    "missingInclude",
                    false,
                ));
            }
        }
    }
}

/// Strip `//` and `/* */` comments while keeping every newline, so line
/// numbers stay valid. Comment markers inside string and character
/// literals are left alone.
pub fn remove_comments(source: &str) -> Result<String, PreprocessorError> {
    let mut out = String::with_capacity(source.len());
    let mut chars = source.chars().peekable();
    let mut line: u32 = 1;

    while let Some(c) = chars.next() {
        match c {
            '\r' => {
                // Normalize \r\n and lone \r to \n.
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
                out.push('\n');
                line += 1;
            }
            '\n' => {
                out.push('\n');
                line += 1;
            }
            '/' if chars.peek() == Some(&'/') => {
                chars.next();
                for c in chars.by_ref() {
                    if c == '\n' {
                        out.push('\n');
                        line += 1;
                        break;
                    }
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let start = line;
                let mut prev = '\0';
                let mut terminated = false;
                for c in chars.by_ref() {
                    if c == '\n' {
                        out.push('\n');
                        line += 1;
                    }
                    if prev == '*' && c == '/' {
                        terminated = true;
                        break;
                    }
                    prev = c;
                }
                if !terminated {
                    return Err(PreprocessorError::UnterminatedComment(start));
                }
                out.push(' ');
            }
            '"' | '\'' => {
                let quote = c;
                out.push(c);
                let mut escaped = false;
                for c in chars.by_ref() {
                    out.push(c);
                    if c == '\n' {
                        line += 1;
                        break; // unterminated literal; tokenizer reports it
                    }
                    if escaped {
                        escaped = false;
                    } else if c == '\\' {
                        escaped = true;
                    } else if c == quote {
                        break;
                    }
                }
            }
            _ => out.push(c),
        }
    }
    Ok(out)
}

/// Enumerate the distinct macro-configurations a file's conditionals span.
///
/// `#ifdef A` inside `#ifdef B` contributes `"B;A"`; `#ifndef`/`#else`
/// branches are covered by the enclosing configuration and contribute
/// nothing of their own. Also validates conditional nesting.
pub fn get_configs(text: &str) -> Result<Vec<String>, PreprocessorError> {
    let mut configs: Vec<String> = vec![String::new()];
    // One entry per open conditional: (contributed define or "", start line).
    let mut stack: Vec<(String, u32)> = Vec::new();

    let mut push_config = |stack: &[(String, u32)]| {
        let key = stack
            .iter()
            .map(|(s, _)| s.as_str())
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(";");
        if !key.is_empty() && !configs.contains(&key) {
            configs.push(key);
        }
    };

    for (idx, line) in text.lines().enumerate() {
        let lineno = idx as u32 + 1;
        let Some(caps) = DIRECTIVE.captures(line) else {
            continue;
        };
        let rest = caps.get(2).map_or("", |m| m.as_str());
        match &caps[1] {
            "ifdef" => {
                let name = rest.split_whitespace().next().unwrap_or("").to_string();
                stack.push((name, lineno));
                push_config(&stack);
            }
            "ifndef" => {
                stack.push((String::new(), lineno));
            }
            "if" => {
                let names: Vec<&str> = DEFINED_NAME
                    .captures_iter(rest)
                    .map(|c| c.get(1).unwrap().as_str())
                    .collect();
                stack.push((names.join(";"), lineno));
                push_config(&stack);
            }
            "elif" => {
                if stack.is_empty() {
                    return Err(PreprocessorError::StrayElse(lineno));
                }
                let names: Vec<&str> = DEFINED_NAME
                    .captures_iter(rest)
                    .map(|c| c.get(1).unwrap().as_str())
                    .collect();
                stack.last_mut().unwrap().0 = names.join(";");
                push_config(&stack);
            }
            "else" => {
                if stack.is_empty() {
                    return Err(PreprocessorError::StrayElse(lineno));
                }
                stack.last_mut().unwrap().0 = String::new();
            }
            "endif" => {
                if stack.pop().is_none() {
                    return Err(PreprocessorError::StrayEndif(lineno));
                }
            }
            _ => {}
        }
    }

    if let Some((_, start)) = stack.first() {
        return Err(PreprocessorError::MissingEndif(*start));
    }
    Ok(configs)
}

struct Frame {
    /// This branch is the one being kept.
    active: bool,
    /// Some branch of this conditional has already been taken.
    taken: bool,
}

/// Extract the text of one configuration: non-matching conditional
/// branches and all directive lines are blanked, total line count is
/// unchanged. `cfg` is `;`-separated `NAME` or `NAME=value` entries.
pub fn getcode(text: &str, cfg: &str) -> String {
    let mut defines: HashMap<String, String> = HashMap::new();
    for part in cfg.split(';').filter(|p| !p.is_empty()) {
        match part.split_once('=') {
            Some((name, value)) => defines.insert(name.to_string(), value.to_string()),
            None => defines.insert(part.to_string(), "1".to_string()),
        };
    }

    let mut stack: Vec<Frame> = Vec::new();
    let mut out: Vec<&str> = Vec::new();

    for line in text.split('\n') {
        let all_active = stack.iter().all(|f| f.active);
        if let Some(caps) = DIRECTIVE.captures(line) {
            let rest = caps.get(2).map_or("", |m| m.as_str());
            match &caps[1] {
                "ifdef" | "ifndef" | "if" => {
                    let cond = if !all_active {
                        false
                    } else {
                        match &caps[1] {
                            "ifdef" => defines
                                .contains_key(rest.split_whitespace().next().unwrap_or("")),
                            "ifndef" => !defines
                                .contains_key(rest.split_whitespace().next().unwrap_or("")),
                            _ => expr::eval(rest, &defines) != 0,
                        }
                    };
                    stack.push(Frame {
                        active: cond,
                        // A dead outer branch poisons every inner branch.
                        taken: cond || !all_active,
                    });
                }
                "elif" => {
                    if !stack.is_empty() {
                        let parent_active =
                            stack[..stack.len() - 1].iter().all(|f| f.active);
                        let frame = stack.last_mut().unwrap();
                        if frame.taken {
                            frame.active = false;
                        } else {
                            frame.active = parent_active && expr::eval(rest, &defines) != 0;
                            frame.taken = frame.active;
                        }
                    }
                }
                "else" => {
                    if let Some(frame) = stack.last_mut() {
                        frame.active = !frame.taken;
                        frame.taken = true;
                    }
                }
                "endif" => {
                    stack.pop();
                }
                "define" if all_active => {
                    let mut it = rest.splitn(2, char::is_whitespace);
                    if let Some(name) = it.next().filter(|n| !n.is_empty()) {
                        // Function-like macro bodies are not expanded; the
                        // name itself still counts as defined.
                        let name = name.split('(').next().unwrap_or(name);
                        let value = it.next().unwrap_or("1").trim().to_string();
                        defines.insert(name.to_string(), value);
                    }
                }
                "undef" if all_active => {
                    if let Some(name) = rest.split_whitespace().next() {
                        defines.remove(name);
                    }
                }
                "include" if all_active => {
                    // Includes are not expanded; keep the line so checks
                    // and missing-include reporting can see it.
                    out.push(line);
                    continue;
                }
                _ => {}
            }
            out.push("");
        } else if all_active {
            out.push(line);
        } else {
            out.push("");
        }
    }

    out.join("\n")
}
