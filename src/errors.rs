use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

/// Diagnostic severities, ordered roughly by how certain the finding is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Certain programming error (memory leak, null dereference, ...).
    Error,
    /// Dangerous coding style that can cause severe runtime errors.
    Warning,
    /// Cleanup recommendation; fixing it will not fix a bug.
    Style,
    /// Suboptimal code, fixing it probably improves performance.
    Performance,
    /// Code that is not portable across platforms or bitnesses.
    Portability,
    /// Message about the checking process itself.
    Information,
    /// Developer-facing debug output.
    Debug,
}

impl Severity {
    pub fn from_str_loose(s: &str) -> Option<Severity> {
        match s {
            "error" => Some(Severity::Error),
            "warning" => Some(Severity::Warning),
            "style" => Some(Severity::Style),
            "performance" => Some(Severity::Performance),
            "portability" => Some(Severity::Portability),
            "information" => Some(Severity::Information),
            "debug" => Some(Severity::Debug),
            _ => None,
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Style => "style",
            Severity::Performance => "performance",
            Severity::Portability => "portability",
            Severity::Information => "information",
            Severity::Debug => "debug",
        })
    }
}

/// File name and line number. Paths are stored with `/` separators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileLocation {
    pub file: String,
    pub line: u32,
}

impl FileLocation {
    pub fn new(file: impl Into<String>, line: u32) -> Self {
        Self {
            file: file.into(),
            line,
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("malformed serialized error message")]
pub struct DeserializeError;

/// A single finding reported by a check.
///
/// The call stack is ordered outermost-first; the last entry is where the
/// problem was detected and is the location used for suppression matching.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorMessage {
    pub call_stack: Vec<FileLocation>,
    pub severity: Severity,
    pub id: String,
    pub inconclusive: bool,
    short: String,
    verbose: String,
}

impl ErrorMessage {
    /// The message text may carry a verbose part after the first `\n`;
    /// the short message is always the first line.
    pub fn new(
        call_stack: Vec<FileLocation>,
        severity: Severity,
        msg: &str,
        id: impl Into<String>,
        inconclusive: bool,
    ) -> Self {
        let (short, verbose) = match msg.split_once('\n') {
            Some((s, v)) => (s.to_string(), v.to_string()),
            None => (msg.to_string(), msg.to_string()),
        };
        Self {
            call_stack,
            severity,
            id: id.into(),
            inconclusive,
            short,
            verbose,
        }
    }

    pub fn short_message(&self) -> &str {
        &self.short
    }

    pub fn verbose_message(&self) -> &str {
        &self.verbose
    }

    /// Last location in the call stack, if any.
    pub fn location(&self) -> Option<&FileLocation> {
        self.call_stack.last()
    }

    fn call_stack_to_string(stack: &[FileLocation]) -> String {
        let mut out = String::new();
        for (i, loc) in stack.iter().enumerate() {
            if i > 0 {
                out.push_str(" -> ");
            }
            let _ = write!(out, "[{}:{}]", loc.file, loc.line);
        }
        out
    }

    /// Render as a single line.
    ///
    /// With an empty `template` the default format is used:
    /// `[file:line]: (severity) message`. A custom template may use
    /// `{file}`, `{line}`, `{severity}`, `{id}`, `{message}` and
    /// `{callstack}`.
    pub fn format(&self, verbose: bool, template: &str) -> String {
        let message = if verbose { &self.verbose } else { &self.short };

        if template.is_empty() {
            let mut text = String::new();
            if !self.call_stack.is_empty() {
                let _ = write!(text, "{}: ", Self::call_stack_to_string(&self.call_stack));
            }
            if self.inconclusive {
                let _ = write!(text, "({}, inconclusive) ", self.severity);
            } else {
                let _ = write!(text, "({}) ", self.severity);
            }
            text.push_str(message);
            return text;
        }

        let loc = self.location();
        template
            .replace("{file}", loc.map_or("", |l| l.file.as_str()))
            .replace("{line}", &loc.map_or(0, |l| l.line).to_string())
            .replace("{severity}", &self.severity.to_string())
            .replace("{id}", &self.id)
            .replace("{callstack}", &Self::call_stack_to_string(&self.call_stack))
            .replace("{message}", message)
    }

    pub fn xml_header(version: u32) -> String {
        match version {
            2 => "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<results version=\"2\">\n  <errors>"
                .to_string(),
            _ => "<?xml version=\"1.0\"?>\n<results>".to_string(),
        }
    }

    pub fn xml_footer(version: u32) -> String {
        match version {
            2 => "  </errors>\n</results>".to_string(),
            _ => "</results>".to_string(),
        }
    }

    /// Render one `<error>` element in the given XML format version.
    pub fn to_xml(&self, verbose: bool, version: u32) -> String {
        let message = if verbose { &self.verbose } else { &self.short };

        if version == 2 {
            let mut out = String::new();
            let _ = write!(
                out,
                "    <error id=\"{}\" severity=\"{}\" msg=\"{}\" verbose=\"{}\"",
                xml_escape(&self.id),
                self.severity,
                xml_escape(&self.short),
                xml_escape(&self.verbose),
            );
            if self.inconclusive {
                out.push_str(" inconclusive=\"true\"");
            }
            if self.call_stack.is_empty() {
                out.push_str("/>");
            } else {
                out.push('>');
                // Most recent location first.
                for loc in self.call_stack.iter().rev() {
                    let _ = write!(
                        out,
                        "\n      <location file=\"{}\" line=\"{}\"/>",
                        xml_escape(&loc.file),
                        loc.line
                    );
                }
                out.push_str("\n    </error>");
            }
            return out;
        }

        let (file, line) = self
            .location()
            .map_or((String::new(), 0), |l| (l.file.clone(), l.line));
        format!(
            "<error file=\"{}\" line=\"{}\" id=\"{}\" severity=\"{}\" msg=\"{}\"/>",
            xml_escape(&file),
            line,
            xml_escape(&self.id),
            self.severity,
            xml_escape(message),
        )
    }

    /// Compact length-prefixed form used to move diagnostics between
    /// processes or threads. Each field is `<len> <bytes>`; no escaping is
    /// needed so the round trip is exact.
    pub fn serialize(&self) -> String {
        let mut out = String::new();
        for field in [
            self.id.as_str(),
            &self.severity.to_string(),
            if self.inconclusive { "1" } else { "0" },
            &self.short,
            &self.verbose,
        ] {
            let _ = write!(out, "{} {}", field.len(), field);
        }
        let _ = write!(out, "{} ", self.call_stack.len());
        for loc in &self.call_stack {
            let _ = write!(out, "{} {}", loc.file.len(), loc.file);
            let line = loc.line.to_string();
            let _ = write!(out, "{} {}", line.len(), line);
        }
        out
    }

    pub fn deserialize(data: &str) -> Result<ErrorMessage, DeserializeError> {
        let mut rest = data;

        fn take_field<'a>(rest: &mut &'a str) -> Result<&'a str, DeserializeError> {
            let sp = rest.find(' ').ok_or(DeserializeError)?;
            let len: usize = rest[..sp].parse().map_err(|_| DeserializeError)?;
            let start = sp + 1;
            let end = start + len;
            if end > rest.len() {
                return Err(DeserializeError);
            }
            let field = &rest[start..end];
            *rest = &rest[end..];
            Ok(field)
        }

        let id = take_field(&mut rest)?.to_string();
        let severity =
            Severity::from_str_loose(take_field(&mut rest)?).ok_or(DeserializeError)?;
        let inconclusive = take_field(&mut rest)? == "1";
        let short = take_field(&mut rest)?.to_string();
        let verbose = take_field(&mut rest)?.to_string();

        let sp = rest.find(' ').ok_or(DeserializeError)?;
        let count: usize = rest[..sp].parse().map_err(|_| DeserializeError)?;
        rest = &rest[sp + 1..];

        let mut call_stack = Vec::with_capacity(count);
        for _ in 0..count {
            let file = take_field(&mut rest)?.to_string();
            let line: u32 = take_field(&mut rest)?.parse().map_err(|_| DeserializeError)?;
            call_stack.push(FileLocation { file, line });
        }

        Ok(ErrorMessage {
            call_stack,
            severity,
            id,
            inconclusive,
            short,
            verbose,
        })
    }
}

fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Implemented by whoever consumes engine output: the CLI, a GUI model, a
/// buffering test double. Calls arrive serialized from the engine's side.
pub trait ErrorLogger: Send + Sync {
    /// Progress text, e.g. "Checking main.c...".
    fn report_out(&self, outmsg: &str);

    /// A finding that survived suppression and deduplication.
    fn report_err(&self, msg: &ErrorMessage);

    /// Stage progress for one file; `value` is 0-100.
    fn report_progress(&self, _filename: &str, _stage: &str, _value: u32) {}
}
