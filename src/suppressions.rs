use globset::{GlobBuilder, GlobMatcher};
use std::sync::{Arc, Mutex};

#[derive(Debug, thiserror::Error)]
pub enum SuppressionError {
    #[error("failed to add suppression: invalid line number \"{0}\"")]
    BadLineNumber(String),
    #[error("failed to add suppression: invalid glob pattern \"{0}\"")]
    BadPattern(String),
    #[error("failed to add suppression: empty id")]
    EmptyId,
}

#[derive(Debug, Clone)]
struct SuppressionEntry {
    id: String,
    /// File pattern as written; `None` suppresses the id everywhere.
    file: Option<String>,
    matcher: Option<GlobMatcher>,
    line: Option<u32>,
    matched: bool,
}

/// An unmatched entry, as reported at end of run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnmatchedSuppression {
    pub id: String,
    pub file: String,
    pub line: u32,
}

/// Suppression rules of the form `id[:filename[:line]]`. The filename part
/// may contain glob wildcards. Entries record whether they ever matched a
/// diagnostic; clones share that bookkeeping, so per-worker copies of the
/// settings all feed the same end-of-run unmatched report.
#[derive(Debug, Clone, Default)]
pub struct Suppressions {
    entries: Arc<Mutex<Vec<SuppressionEntry>>>,
}

impl Suppressions {
    pub fn add(
        &self,
        id: &str,
        file: Option<&str>,
        line: Option<u32>,
    ) -> Result<(), SuppressionError> {
        if id.is_empty() {
            return Err(SuppressionError::EmptyId);
        }
        let matcher = match file {
            Some(pattern) => Some(
                GlobBuilder::new(pattern)
                    .case_insensitive(true)
                    .build()
                    .map_err(|_| SuppressionError::BadPattern(pattern.to_string()))?
                    .compile_matcher(),
            ),
            None => None,
        };
        self.entries.lock().unwrap().push(SuppressionEntry {
            id: id.to_string(),
            file: file.map(String::from),
            matcher,
            line,
            matched: false,
        });
        Ok(())
    }

    /// Parse one `id[:filename[:line]]` rule.
    pub fn parse_line(&self, line: &str) -> Result<(), SuppressionError> {
        let mut parts = line.splitn(3, ':');
        let id = parts.next().unwrap_or("");
        let file = parts.next();
        let lineno = match parts.next() {
            Some(n) => Some(
                n.trim()
                    .parse::<u32>()
                    .map_err(|_| SuppressionError::BadLineNumber(n.to_string()))?,
            ),
            None => None,
        };
        self.add(id, file, lineno)
    }

    /// Parse a suppressions file: one rule per line, `#` comments allowed.
    pub fn parse_file(&self, text: &str) -> Result<(), SuppressionError> {
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            self.parse_line(line)?;
        }
        Ok(())
    }

    /// True if a diagnostic (id, file, line) is suppressed. A matching
    /// entry is marked as used.
    pub fn is_suppressed(&self, id: &str, file: &str, line: u32) -> bool {
        let mut entries = self.entries.lock().unwrap();
        for entry in entries.iter_mut() {
            if entry.id != id {
                continue;
            }
            if let Some(matcher) = &entry.matcher {
                if !matcher.is_match(file) {
                    continue;
                }
                if let Some(want) = entry.line {
                    if want != line {
                        continue;
                    }
                }
            }
            entry.matched = true;
            return true;
        }
        false
    }

    /// Entries that never matched anything during the run.
    pub fn unmatched(&self) -> Vec<UnmatchedSuppression> {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .filter(|e| !e.matched)
            .map(|e| UnmatchedSuppression {
                id: e.id.clone(),
                file: e.file.clone().unwrap_or_default(),
                line: e.line.unwrap_or(0),
            })
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().unwrap().is_empty()
    }
}
