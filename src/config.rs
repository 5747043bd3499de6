use std::path::PathBuf;

use crate::filter::{FileSystemFilter, Filter};
use crate::output::{DisplayOptions, HighlightMode, SortDescriptor};
use crate::walk::WalkOptions;

/// Where a root path came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathOrigin {
    /// Given explicitly on the command line.
    Argument,
    /// Implied because no path argument was present.
    CurrentDirectory,
}

#[derive(Debug, Clone)]
pub struct PathInfo {
    pub path: PathBuf,
    pub origin: PathOrigin,
}

/// Frozen options record for one command invocation. Built once by the CLI
/// layer; the core never mutates it.
pub struct Config {
    /// Root paths in the order given; duplicates are kept.
    pub paths: Vec<PathInfo>,

    /// The per-entry filter chain.
    pub filter: FileSystemFilter,

    /// Controls descent into subdirectories, independently of matching.
    pub directory_filter: Option<Filter>,

    /// Traversal settings: target kinds, recursion, depth, links, encoding.
    pub walk: WalkOptions,

    /// Sort descriptors; a non-empty list switches on result buffering.
    pub sort: Vec<SortDescriptor>,

    /// Cap on displayed results (buffered: applied after sorting).
    pub max_count: Option<usize>,

    /// Cap on matching files/directories; `0` means unlimited. Reaching it
    /// ends the traversal cleanly and still counts as success.
    pub max_matching_files: u64,

    /// File-property columns to display; any column switches on buffering.
    pub display: DisplayOptions,

    /// Which part of a result line gets highlighted.
    pub highlight: HighlightMode,

    /// Print the telemetry summary after the results.
    pub include_summary: bool,

    /// Report the directory currently being searched.
    pub progress: bool,

    /// Compute and report everything, mutate nothing.
    pub dry_run: bool,

    /// `FILE[,VERBOSITY[,ENCODING[,append]]]` duplicate of the output.
    pub output: Option<String>,
}
