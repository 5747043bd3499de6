use std::fmt;
use std::io::{self, IsTerminal, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::file_match::{DirectorySizeMap, SearchResult};

/// Cooperative cancellation flag, shared with the ctrl-c handler.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_canceled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Why a command stopped before exhausting the traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TerminationReason {
    #[default]
    None,
    /// The matching-file cap was reached; treated as success.
    MaxReached,
    /// The user interrupted the command.
    Canceled,
}

/// Monotonic counters and size accumulators for the end-of-command summary.
#[derive(Debug)]
pub struct Telemetry {
    pub searched_directory_count: u64,
    pub file_count: u64,
    pub directory_count: u64,
    pub matching_file_count: u64,
    pub matching_directory_count: u64,
    pub replacement_count: u64,
    pub added_count: u64,
    pub updated_count: u64,
    pub renamed_count: u64,
    pub deleted_count: u64,
    pub error_count: u64,
    pub max_file_size: u64,
    pub total_size: u64,
    start: Instant,
}

impl Default for Telemetry {
    fn default() -> Self {
        Telemetry {
            searched_directory_count: 0,
            file_count: 0,
            directory_count: 0,
            matching_file_count: 0,
            matching_directory_count: 0,
            replacement_count: 0,
            added_count: 0,
            updated_count: 0,
            renamed_count: 0,
            deleted_count: 0,
            error_count: 0,
            max_file_size: 0,
            total_size: 0,
            start: Instant::now(),
        }
    }
}

impl Telemetry {
    pub fn matching_count(&self) -> u64 {
        self.matching_file_count + self.matching_directory_count
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl fmt::Display for Telemetry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Searched directories  {}", self.searched_directory_count)?;
        writeln!(f, "Files                 {}", self.file_count)?;
        writeln!(f, "Directories           {}", self.directory_count)?;
        writeln!(f, "Matching files        {}", self.matching_file_count)?;
        writeln!(f, "Matching directories  {}", self.matching_directory_count)?;
        if self.replacement_count > 0 {
            writeln!(f, "Replacements          {}", self.replacement_count)?;
        }
        if self.added_count + self.updated_count + self.renamed_count + self.deleted_count > 0 {
            writeln!(f, "Added                 {}", self.added_count)?;
            writeln!(f, "Updated               {}", self.updated_count)?;
            writeln!(f, "Renamed               {}", self.renamed_count)?;
            writeln!(f, "Deleted               {}", self.deleted_count)?;
        }
        if self.error_count > 0 {
            writeln!(f, "Errors                {}", self.error_count)?;
        }
        write!(f, "Elapsed               {:.3?}", self.elapsed())
    }
}

/// Live progress display, fed with every directory the walker enters.
pub trait ProgressReporter {
    fn enter_directory(&mut self, path: &Path);
    fn finish(&mut self);
}

/// Writes the current directory to stderr on a single, self-erasing line.
/// Inactive when stderr is not a terminal.
pub struct ConsoleProgress {
    last_len: usize,
    enabled: bool,
}

impl ConsoleProgress {
    pub fn new() -> Self {
        ConsoleProgress {
            last_len: 0,
            enabled: io::stderr().is_terminal(),
        }
    }
}

impl Default for ConsoleProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressReporter for ConsoleProgress {
    fn enter_directory(&mut self, path: &Path) {
        if !self.enabled {
            return;
        }
        let display = path.to_string_lossy();
        let mut stderr = io::stderr().lock();
        let _ = write!(stderr, "\r{:width$}", display, width = self.last_len);
        let _ = stderr.flush();
        self.last_len = display.chars().count();
    }

    fn finish(&mut self) {
        if !self.enabled || self.last_len == 0 {
            return;
        }
        let mut stderr = io::stderr().lock();
        let _ = write!(stderr, "\r{:width$}\r", "", width = self.last_len);
        let _ = stderr.flush();
        self.last_len = 0;
    }
}

/// Per-invocation state shared by the traversal and the operation executors.
pub struct SearchContext {
    pub telemetry: Telemetry,
    pub progress: Option<Box<dyn ProgressReporter>>,
    pub results: Option<Vec<SearchResult>>,
    pub termination: TerminationReason,
    pub dir_sizes: DirectorySizeMap,
    cancel: CancelToken,
    max_matching_files: u64,
}

impl SearchContext {
    pub fn new(cancel: CancelToken, max_matching_files: u64) -> Self {
        SearchContext {
            telemetry: Telemetry::default(),
            progress: None,
            results: None,
            termination: TerminationReason::None,
            dir_sizes: DirectorySizeMap::default(),
            cancel,
            max_matching_files,
        }
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Check the cancellation flag, recording the termination reason.
    pub fn poll_cancel(&mut self) -> bool {
        if self.cancel.is_canceled() {
            self.termination = TerminationReason::Canceled;
        }
        self.termination == TerminationReason::Canceled
    }

    pub fn is_terminated(&self) -> bool {
        self.termination != TerminationReason::None
    }

    /// Record an emitted match and flip to `MaxReached` when the cap is hit.
    pub fn note_match(&mut self, is_directory: bool, size: u64) {
        if is_directory {
            self.telemetry.matching_directory_count += 1;
        } else {
            self.telemetry.matching_file_count += 1;
            self.telemetry.total_size += size;
            if size > self.telemetry.max_file_size {
                self.telemetry.max_file_size = size;
            }
        }
        if self.max_matching_files > 0 && self.telemetry.matching_count() >= self.max_matching_files
        {
            self.termination = TerminationReason::MaxReached;
        }
    }

    pub fn note_error(&mut self, error: &crate::error::Error) {
        self.telemetry.error_count += 1;
        log::warn!("{error}");
    }
}
