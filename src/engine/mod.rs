pub(crate) mod scanner;

pub use scanner::scan;

use rayon::prelude::*;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tracing::debug;

use crate::checks::{all_checks, Check};
use crate::checks::unused_functions::UnusedFunctions;
use crate::config::Settings;
use crate::errors::{ErrorLogger, ErrorMessage, FileLocation, Severity};
use crate::preprocessor::{getcode, Preprocessor};
use crate::tokenizer::Tokenizer;

/// State shared by every worker of one run: the deduplication set and the
/// aggregate failure flag.
#[derive(Default)]
pub(crate) struct RunState {
    seen: Mutex<HashSet<String>>,
    failed: AtomicBool,
}

/// Checks one file at a time: preprocess, enumerate configurations, then
/// tokenize / raw-check / simplify / simplified-check each configuration.
/// Implements [`ErrorLogger`] itself so every diagnostic a check reports
/// passes through deduplication, suppression and exit-code bookkeeping
/// before reaching the outer logger.
pub struct FileChecker<'a> {
    settings: Settings,
    checks: &'a [Box<dyn Check>],
    unused: Option<&'a UnusedFunctions>,
    logger: &'a dyn ErrorLogger,
    state: Arc<RunState>,
    file_failed: AtomicBool,
}

impl<'a> FileChecker<'a> {
    /// Standalone checker with its own run state, for single-file use.
    pub fn new(
        settings: Settings,
        checks: &'a [Box<dyn Check>],
        logger: &'a dyn ErrorLogger,
    ) -> Self {
        Self::with_shared(settings, checks, None, logger, Arc::new(RunState::default()))
    }

    pub(crate) fn with_shared(
        settings: Settings,
        checks: &'a [Box<dyn Check>],
        unused: Option<&'a UnusedFunctions>,
        logger: &'a dyn ErrorLogger,
        state: Arc<RunState>,
    ) -> Self {
        Self {
            settings,
            checks,
            unused,
            logger,
            state,
            file_failed: AtomicBool::new(false),
        }
    }

    /// Check a file read from disk. Returns 1 if this file produced a
    /// failing diagnostic.
    pub fn check(&mut self, path: &Path) -> u32 {
        self.process_file(&path.to_string_lossy(), None)
    }

    /// Check in-memory content; the file is never read.
    pub fn check_content(&mut self, path: &str, content: &str) -> u32 {
        self.process_file(path, Some(content))
    }

    fn process_file(&mut self, filename: &str, content: Option<&str>) -> u32 {
        self.file_failed.store(false, Ordering::Relaxed);

        if self.settings.terminated() {
            return 0;
        }
        if !self.settings.errors_only {
            self.logger.report_out(&format!("Checking {filename}..."));
        }

        let owned;
        let source = match content {
            Some(text) => text,
            None => match std::fs::read_to_string(filename) {
                Ok(text) => {
                    owned = text;
                    &owned
                }
                Err(e) => {
                    self.logger
                        .report_out(&format!("Bailing out from checking {filename}: {e}"));
                    return 0;
                }
            },
        };

        // Preprocessing failures abandon this file only; the run goes on.
        let preprocessor = Preprocessor::new(&self.settings, &*self);
        let (filedata, mut configurations) = match preprocessor.preprocess(source, filename) {
            Ok(result) => result,
            Err(e) => {
                self.logger
                    .report_out(&format!("Bailing out from checking {filename}: {e}"));
                return 0;
            }
        };

        self.settings.many_configs = configurations.len() > 1;

        // User-supplied defines pin the configuration space to one entry.
        if !self.settings.defines.is_empty() {
            configurations = vec![self.settings.defines.clone()];
        }

        for (count, cfg) in configurations.iter().enumerate() {
            if self.settings.terminated() {
                break;
            }
            if !self.settings.force && count >= self.settings.max_configs {
                self.report_err(&ErrorMessage::new(
                    vec![FileLocation::new(filename, 0)],
                    Severity::Information,
                    "Interrupted checking because of too many #ifdef configurations.\n\
                     The checking of the file was interrupted because there were too many \
                     #ifdef configurations. Checking of all #ifdef configurations can be \
                     forced with --force, at the cost of longer checking time.",
                    "toomanyconfigs",
                    false,
                ));
                break;
            }
            if !self.settings.errors_only && count > 0 {
                self.logger
                    .report_out(&format!("Checking {filename}: {cfg}..."));
            }
            let code = getcode(&filedata, cfg);
            self.check_code(&code, filename, cfg);
        }

        u32::from(self.file_failed.load(Ordering::Relaxed))
    }

    /// Run the full check pipeline over one configuration's code. The
    /// termination flag is polled at every stage boundary and between
    /// checks; the current check always finishes.
    fn check_code(&self, code: &str, filename: &str, cfg: &str) {
        if self.settings.terminated() {
            return;
        }
        debug!(filename, cfg, "tokenize");
        self.logger.report_progress(filename, "tokenize", 0);

        let mut tokenizer = Tokenizer::new(&self.settings);
        if let Err(e) = tokenizer.tokenize(code, filename, cfg) {
            // Syntax errors are fatal for this configuration only.
            self.report_err(&ErrorMessage::new(
                vec![FileLocation::new(filename, e.line())],
                Severity::Error,
                &format!("{e}"),
                "syntaxError",
                false,
            ));
            return;
        }
        tokenizer.fill_function_list();

        for check in self.checks {
            if self.settings.terminated() {
                return;
            }
            debug!(check = check.name(), "raw checks");
            check.run_checks(&tokenizer, &self.settings, self);
        }

        self.logger.report_progress(filename, "simplify", 50);
        if !tokenizer.simplify_token_list() {
            self.report_err(&ErrorMessage::new(
                vec![FileLocation::new(filename, 0)],
                Severity::Error,
                "Internal error: the token stream is inconsistent after simplification.",
                "internalError",
                false,
            ));
            return;
        }
        tokenizer.fill_function_list();

        if self.settings.is_enabled("unusedFunctions") {
            if let Some(unused) = self.unused {
                unused.parse_tokens(&tokenizer);
            }
        }

        for check in self.checks {
            if self.settings.terminated() {
                return;
            }
            debug!(check = check.name(), "simplified checks");
            check.run_simplified_checks(&tokenizer, &self.settings, self);
        }
        self.logger.report_progress(filename, "finish", 100);
    }
}

impl ErrorLogger for FileChecker<'_> {
    fn report_out(&self, outmsg: &str) {
        self.logger.report_out(outmsg);
    }

    /// Deduplicate, apply suppressions, track the exit code, forward.
    fn report_err(&self, msg: &ErrorMessage) {
        let text = msg.format(self.settings.verbose, "");
        if self.state.seen.lock().unwrap().contains(&text) {
            return;
        }

        let (file, line) = msg
            .location()
            .map_or((String::new(), 0), |l| (l.file.clone(), l.line));
        if self.settings.suppressions.is_suppressed(&msg.id, &file, line) {
            return;
        }
        if !self.settings.nofail.is_suppressed(&msg.id, &file, line) {
            self.file_failed.store(true, Ordering::Relaxed);
            self.state.failed.store(true, Ordering::Relaxed);
        }

        self.state.seen.lock().unwrap().insert(text);
        self.logger.report_err(msg);
    }

    fn report_progress(&self, filename: &str, stage: &str, value: u32) {
        self.logger.report_progress(filename, stage, value);
    }
}

/// Check a batch of files and return the aggregate exit code: 1 iff at
/// least one unsuppressed, non-nofail diagnostic was produced.
pub fn run(files: &[PathBuf], settings: &Settings, logger: &dyn ErrorLogger) -> u32 {
    let mut settings = settings.clone();
    settings.jobs = settings.jobs.max(1);

    let files = if settings.max_files > 0 && files.len() > settings.max_files {
        &files[..settings.max_files]
    } else {
        files
    };

    let checks = all_checks();
    let unused = UnusedFunctions::default();
    let state = Arc::new(RunState::default());
    let total = files.len();
    let done = AtomicUsize::new(0);

    // Optional whole-program pre-pass. Strictly single-threaded, and it
    // must finish before any per-file checking starts: its output is read
    // by the later passes.
    if settings.two_pass && settings.jobs == 1 {
        let mut data = HashSet::new();
        for path in files {
            if settings.terminated() {
                break;
            }
            if !settings.errors_only {
                logger.report_out(&format!("Analysing {}...", path.display()));
            }
            analyse_file(path, &settings, &checks, &mut data);
        }
        for check in &checks {
            check.save_analysis_data(&data);
        }
        unused.save_analysis_data(&data);
    }

    let check_one = |path: &PathBuf| {
        if settings.terminated() {
            return;
        }
        let mut checker = FileChecker::with_shared(
            settings.clone(),
            &checks,
            Some(&unused),
            logger,
            state.clone(),
        );
        checker.check(path);
        let finished = done.fetch_add(1, Ordering::Relaxed) + 1;
        if !settings.errors_only && total > 1 {
            logger.report_out(&format!(
                "{finished}/{total} files checked {}% done",
                finished * 100 / total
            ));
        }
    };

    if settings.jobs == 1 || total <= 1 {
        for path in files {
            if settings.terminated() {
                break;
            }
            check_one(path);
        }
    } else {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(settings.jobs)
            .build();
        match pool {
            Ok(pool) => pool.install(|| files.par_iter().for_each(check_one)),
            Err(_) => files.iter().for_each(check_one),
        }
    }

    // Whole-run finalization is single-threaded, after all workers join.
    if !settings.terminated() && settings.is_enabled("unusedFunctions") {
        if !settings.errors_only {
            logger.report_out("Checking usage of global functions..");
        }
        let finalizer =
            FileChecker::with_shared(settings.clone(), &checks, None, logger, state.clone());
        unused.finalize(&finalizer);
    }

    report_unmatched_suppressions(&settings, logger);

    u32::from(state.failed.load(Ordering::Relaxed))
}

/// Pre-pass over one file: preprocess the empty configuration, tokenize,
/// simplify, and let every check contribute its cross-file facts. Errors
/// are ignored here; the main pass reports them.
fn analyse_file(
    path: &Path,
    settings: &Settings,
    checks: &[Box<dyn Check>],
    data: &mut HashSet<String>,
) {
    struct NullLogger;
    impl ErrorLogger for NullLogger {
        fn report_out(&self, _outmsg: &str) {}
        fn report_err(&self, _msg: &ErrorMessage) {}
    }

    let Ok(source) = std::fs::read_to_string(path) else {
        return;
    };
    let filename = path.to_string_lossy();
    let null_logger = NullLogger;
    let preprocessor = Preprocessor::new(settings, &null_logger);
    let Ok((filedata, _)) = preprocessor.preprocess(&source, &filename) else {
        return;
    };
    let code = getcode(&filedata, "");

    let mut tokenizer = Tokenizer::new(settings);
    if tokenizer.tokenize(&code, &filename, "").is_err() {
        return;
    }
    tokenizer.fill_function_list();
    if !tokenizer.simplify_token_list() {
        return;
    }
    tokenizer.fill_function_list();

    for check in checks {
        check.analyse(&tokenizer, data);
    }
}

/// Suppression entries that never fired are reported as information
/// diagnostics. They never fail the run by themselves, and a suppression
/// rule for `unmatchedSuppression` silences them like any diagnostic.
fn report_unmatched_suppressions(settings: &Settings, logger: &dyn ErrorLogger) {
    for entry in settings.suppressions.unmatched() {
        if settings
            .suppressions
            .is_suppressed("unmatchedSuppression", &entry.file, entry.line)
        {
            continue;
        }
        logger.report_err(&ErrorMessage::new(
            vec![FileLocation::new(&entry.file, entry.line)],
            Severity::Information,
            &format!("Unmatched suppression: {}", entry.id),
            "unmatchedSuppression",
            false,
        ));
    }
}
