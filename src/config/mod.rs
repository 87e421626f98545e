use anyhow::Result;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::suppressions::Suppressions;

/// Per-run configuration. Built once before checking starts; each worker
/// gets its own clone, so the few fields a worker writes while processing
/// a file (e.g. `many_configs`) are never shared mutably. The suppression
/// lists and the termination flag are deliberately shared through clones.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Extra diagnostic categories to report. `error` and `warning`
    /// severities are always on; `style`, `performance`, `portability`,
    /// `information`, `unusedFunctions` and `missingInclude` are opt-in.
    /// `all` enables everything.
    pub enabled: Vec<String>,
    /// Paths searched when resolving `#include "..."`.
    pub include_paths: Vec<PathBuf>,
    /// User-supplied defines, e.g. `"WIN32;MAX=10"`. When non-empty the
    /// enumerated configurations are replaced by this single one.
    pub defines: String,
    /// Check all configurations, ignoring `max_configs`.
    pub force: bool,
    /// How many `#ifdef` configurations to check per file before bailing
    /// out with a `toomanyconfigs` diagnostic.
    pub max_configs: usize,
    /// Worker count for multi-file runs. Values below 1 are normalized.
    pub jobs: usize,
    /// Report findings the checks are not certain about.
    pub inconclusive: bool,
    /// Use verbose message text in rendered output.
    pub verbose: bool,
    /// Suppress progress output, print only the findings.
    pub errors_only: bool,
    /// Line template for text output; empty means the default format.
    pub template: String,
    /// XML format version for `--format xml`.
    pub xml_version: u32,
    /// Directory glob patterns skipped when scanning for source files.
    pub ignore: Vec<String>,
    /// Upper bound on the number of files checked in one run; 0 = no limit.
    pub max_files: usize,
    /// Run a whole-program analysis pass over every file before any
    /// per-file checking. Single-threaded; only honored with `jobs = 1`.
    pub two_pass: bool,

    /// Diagnostics matching these rules are not reported.
    #[serde(skip)]
    pub suppressions: Suppressions,
    /// Diagnostics matching these rules still get reported but do not set
    /// the failure exit code.
    #[serde(skip)]
    pub nofail: Suppressions,
    /// Set while processing a file that enumerated more than one
    /// configuration. Worker-local; written by the orchestrator only.
    #[serde(skip)]
    pub many_configs: bool,

    #[serde(skip)]
    terminate: Arc<AtomicBool>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            enabled: Vec::new(),
            include_paths: Vec::new(),
            defines: String::new(),
            force: false,
            max_configs: 12,
            jobs: 1,
            inconclusive: false,
            verbose: false,
            errors_only: false,
            template: String::new(),
            xml_version: 1,
            ignore: vec![".git".into(), "build".into(), "target".into()],
            max_files: 0,
            two_pass: false,
            suppressions: Suppressions::default(),
            nofail: Suppressions::default(),
            many_configs: false,
            terminate: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl Settings {
    pub fn load(config_path: Option<&Path>, project_root: &Path) -> Result<Self> {
        let path = config_path.map(Path::to_path_buf).or_else(|| {
            let default = project_root.join(".cclintrc.toml");
            default.exists().then_some(default)
        });

        let mut settings = match path {
            Some(path) => {
                let content = std::fs::read_to_string(&path)?;
                toml::from_str(&content)
                    .map_err(|e| anyhow::anyhow!("Config parse error: {e}"))?
            }
            None => Settings::default(),
        };
        settings.jobs = settings.jobs.max(1);
        Ok(settings)
    }

    /// True if diagnostics of the given category should be produced.
    pub fn is_enabled(&self, category: &str) -> bool {
        self.enabled.iter().any(|c| c == category || c == "all")
    }

    /// Cooperative stop: observed between pipeline stages, between checks
    /// and between files. Nothing is interrupted mid-check.
    pub fn terminated(&self) -> bool {
        self.terminate.load(Ordering::Relaxed)
    }

    pub fn request_termination(&self) {
        self.terminate.store(true, Ordering::Relaxed);
    }

    pub const fn default_toml() -> &'static str {
        r#"# cclint configuration

# Extra diagnostic categories: "style", "performance", "portability",
# "information", "unusedFunctions", "missingInclude", or "all".
enabled = []

# Paths searched for #include "..." resolution
# include_paths = ["include", "src"]

# Preprocessor defines applied instead of enumerating #ifdef configurations
# defines = "WIN32;DEBUG=1"

# Check all #ifdef configurations instead of the first max_configs
force = false
max_configs = 12

# Worker count for multi-file runs
jobs = 1

# Directories to ignore when scanning
ignore = [".git", "build", "target"]

# Line template for text output, e.g. "{file}:{line},{severity},{id},{message}"
# template = ""
"#
    }
}
