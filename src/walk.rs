use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use encoding_rs::Encoding;

use crate::context::SearchContext;
use crate::error::{Error, Result};
use crate::file_match::SearchResult;
use crate::filter::{FileSystemFilter, Filter, PatternMatch};

/// Which entry kinds a search emits. Directories are still traversed when
/// only files are wanted; they are just not reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum SearchTarget {
    #[default]
    Files,
    Directories,
    All,
}

impl SearchTarget {
    pub fn includes(self, is_directory: bool) -> bool {
        match self {
            SearchTarget::Files => !is_directory,
            SearchTarget::Directories => is_directory,
            SearchTarget::All => true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct WalkOptions {
    pub search_target: SearchTarget,
    pub recurse: bool,
    pub max_depth: Option<usize>,
    pub follow_symlinks: bool,
    pub default_encoding: &'static Encoding,
}

impl Default for WalkOptions {
    fn default() -> Self {
        WalkOptions {
            search_target: SearchTarget::Files,
            recurse: true,
            max_depth: None,
            follow_symlinks: false,
            default_encoding: encoding_rs::UTF_8,
        }
    }
}

/// Per-match callback. Fatal errors (cancellation, aborted writes) propagate
/// and end the walk; per-path failures are the consumer's to report.
pub type MatchSink<'s> = dyn FnMut(SearchResult, &mut SearchContext) -> Result<()> + 's;

/// Recursive pre-order walker. Emits a `SearchResult` for every entry that
/// passes the filter chain, drives telemetry, honours cancellation between
/// entries and stops cleanly when the matching-file cap is reached.
pub struct Walker<'a> {
    pub filter: &'a FileSystemFilter,
    /// Controls descent: a subdirectory is only entered when its name passes.
    pub directory_filter: Option<&'a Filter>,
    /// Paths harmonized by a previous pass; they bypass the filter chain.
    pub ignored_paths: Option<&'a HashSet<PathBuf>>,
    pub options: &'a WalkOptions,
}

impl<'a> Walker<'a> {
    pub fn new(filter: &'a FileSystemFilter, options: &'a WalkOptions) -> Self {
        Walker {
            filter,
            directory_filter: None,
            ignored_paths: None,
            options,
        }
    }

    /// Walk one root. The stream order is depth-first in the order the
    /// filesystem enumerates children; no sorting happens here.
    pub fn walk(
        &self,
        root: &Path,
        ctx: &mut SearchContext,
        on_match: &mut MatchSink,
    ) -> Result<()> {
        let root_metadata = match fs::symlink_metadata(root) {
            Ok(metadata) => metadata,
            Err(e) => {
                ctx.note_error(&Error::io(root, e));
                return Ok(());
            }
        };

        if !root_metadata.is_dir() {
            // A file root is its own single candidate.
            self.process_entry(root, root, &root_metadata, None, ctx, on_match)?;
            return Ok(());
        }

        let mut visited: HashSet<PathBuf> = HashSet::new();
        let mut stack: Vec<(PathBuf, usize)> = vec![(root.to_path_buf(), 0)];

        while let Some((dir, depth)) = stack.pop() {
            if ctx.poll_cancel() || ctx.is_terminated() {
                return Ok(());
            }
            if let Some(progress) = ctx.progress.as_mut() {
                progress.enter_directory(&dir);
            }

            let parent_match = self.directory_filter.and_then(|filter| {
                dir.file_name()
                    .and_then(|name| filter.evaluate(&name.to_string_lossy()))
            });

            let entries = match fs::read_dir(&dir) {
                Ok(entries) => Some(entries),
                Err(e) => {
                    ctx.note_error(&Error::io(&dir, e));
                    None
                }
            };

            let mut subdirs: Vec<(PathBuf, usize)> = Vec::new();
            if let Some(entries) = entries {
                for entry in entries {
                    if ctx.poll_cancel() || ctx.is_terminated() {
                        return Ok(());
                    }

                    let entry = match entry {
                        Ok(entry) => entry,
                        Err(e) => {
                            ctx.note_error(&Error::io(&dir, e));
                            continue;
                        }
                    };
                    let path = entry.path();

                    let metadata = match self.entry_metadata(&path) {
                        Ok(metadata) => metadata,
                        Err(e) => {
                            ctx.note_error(&e);
                            continue;
                        }
                    };
                    let is_directory = metadata.is_dir();

                    if is_directory {
                        ctx.telemetry.directory_count += 1;
                    } else {
                        ctx.telemetry.file_count += 1;
                    }

                    self.process_entry(
                        root,
                        &path,
                        &metadata,
                        parent_match.clone(),
                        ctx,
                        on_match,
                    )?;
                    if ctx.is_terminated() {
                        return Ok(());
                    }

                    // The consumer may have removed the directory (sync's
                    // delete cases); re-check before queueing the descent.
                    if is_directory
                        && self.should_descend(&path, depth, &mut visited)
                        && fs::symlink_metadata(&path).is_ok()
                    {
                        subdirs.push((path, depth + 1));
                    }
                }
            }

            // Preserve enumeration order across the LIFO stack.
            stack.extend(subdirs.into_iter().rev());

            ctx.telemetry.searched_directory_count += 1;
        }

        if let Some(progress) = ctx.progress.as_mut() {
            progress.finish();
        }
        Ok(())
    }

    /// Stat an entry, traversing the link only when links are followed.
    fn entry_metadata(&self, path: &Path) -> Result<fs::Metadata> {
        let result = if self.options.follow_symlinks {
            fs::metadata(path)
        } else {
            fs::symlink_metadata(path)
        };
        result.map_err(|e| Error::io(path, e))
    }

    fn should_descend(&self, path: &Path, depth: usize, visited: &mut HashSet<PathBuf>) -> bool {
        if !self.options.recurse {
            return false;
        }
        if let Some(max_depth) = self.options.max_depth {
            if depth + 1 >= max_depth {
                return false;
            }
        }
        if let Some(filter) = self.directory_filter {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            if !filter.is_match(&name) {
                return false;
            }
        }
        if self.options.follow_symlinks {
            // Cycle guard: a followed link may lead back into the tree.
            match fs::canonicalize(path) {
                Ok(canonical) => visited.insert(canonical),
                Err(_) => false,
            }
        } else {
            true
        }
    }

    fn process_entry(
        &self,
        root: &Path,
        path: &Path,
        metadata: &fs::Metadata,
        directory_name_match: Option<PatternMatch>,
        ctx: &mut SearchContext,
        on_match: &mut MatchSink,
    ) -> Result<()> {
        if let Some(ignored) = self.ignored_paths {
            if ignored.contains(path) {
                return Ok(());
            }
        }

        let is_directory = metadata.is_dir();
        if !self.options.search_target.includes(is_directory) {
            // Still pushed for descent by the caller; just not reported.
            return Ok(());
        }

        let accepted =
            match self
                .filter
                .accept(path, is_directory, metadata, self.options.default_encoding)
            {
                Ok(accepted) => accepted,
                Err(e) if e.is_recoverable() => {
                    ctx.note_error(&e);
                    return Ok(());
                }
                Err(e) => return Err(e),
            };

        let Some(mut file_match) = accepted else {
            return Ok(());
        };
        file_match.directory_name_match = directory_name_match;

        let size = if is_directory { 0 } else { metadata.len() };
        on_match(SearchResult::new(root.to_path_buf(), file_match), ctx)?;
        ctx.note_match(is_directory, size);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::CancelToken;
    use std::fs;

    fn collect(walker: &Walker, root: &Path, ctx: &mut SearchContext) -> Vec<PathBuf> {
        let mut found = Vec::new();
        walker
            .walk(root, ctx, &mut |result, _ctx| {
                found.push(result.path().to_path_buf());
                Ok(())
            })
            .unwrap();
        found
    }

    fn tree() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), "alpha").unwrap();
        fs::write(dir.path().join("b.log"), "beta").unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("sub/c.txt"), "gamma").unwrap();
        dir
    }

    #[test]
    fn finds_files_recursively() {
        let dir = tree();
        let filter = FileSystemFilter {
            name: Some(Filter::from_pattern(r"\.txt$").unwrap()),
            ..Default::default()
        };
        let options = WalkOptions::default();
        let walker = Walker::new(&filter, &options);

        let mut ctx = SearchContext::new(CancelToken::default(), 0);
        let mut found = collect(&walker, dir.path(), &mut ctx);
        found.sort();

        assert_eq!(
            found,
            vec![dir.path().join("a.txt"), dir.path().join("sub/c.txt")]
        );
        assert_eq!(ctx.telemetry.matching_file_count, 2);
        assert_eq!(ctx.telemetry.file_count, 3);
        assert_eq!(ctx.telemetry.directory_count, 1);
        assert_eq!(ctx.telemetry.searched_directory_count, 2);
    }

    #[test]
    fn no_recursion_without_recurse() {
        let dir = tree();
        let filter = FileSystemFilter::default();
        let options = WalkOptions {
            recurse: false,
            ..Default::default()
        };
        let walker = Walker::new(&filter, &options);

        let mut ctx = SearchContext::new(CancelToken::default(), 0);
        let found = collect(&walker, dir.path(), &mut ctx);
        assert!(found.iter().all(|p| p.parent() == Some(dir.path())));
        assert_eq!(ctx.telemetry.searched_directory_count, 1);
    }

    #[test]
    fn directory_filter_prunes_descent() {
        let dir = tree();
        fs::create_dir(dir.path().join("skipme")).unwrap();
        fs::write(dir.path().join("skipme/d.txt"), "delta").unwrap();

        let filter = FileSystemFilter {
            name: Some(Filter::from_pattern(r"\.txt$").unwrap()),
            ..Default::default()
        };
        let dir_filter = Filter::from_pattern("^sub$").unwrap();
        let options = WalkOptions::default();
        let mut walker = Walker::new(&filter, &options);
        walker.directory_filter = Some(&dir_filter);

        let mut ctx = SearchContext::new(CancelToken::default(), 0);
        let found = collect(&walker, dir.path(), &mut ctx);
        assert!(found.contains(&dir.path().join("sub/c.txt")));
        assert!(!found.iter().any(|p| p.starts_with(dir.path().join("skipme"))));
    }

    #[test]
    fn max_matching_files_caps_the_stream() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..100 {
            fs::write(dir.path().join(format!("{i:03}.log")), "x").unwrap();
        }

        let filter = FileSystemFilter {
            name: Some(Filter::from_pattern(r"\.log$").unwrap()),
            ..Default::default()
        };
        let options = WalkOptions::default();
        let walker = Walker::new(&filter, &options);

        let mut ctx = SearchContext::new(CancelToken::default(), 5);
        let found = collect(&walker, dir.path(), &mut ctx);
        assert_eq!(found.len(), 5);
        assert_eq!(ctx.telemetry.matching_file_count, 5);
        assert_eq!(ctx.termination, crate::context::TerminationReason::MaxReached);
    }

    #[test]
    fn search_target_directories() {
        let dir = tree();
        let filter = FileSystemFilter::default();
        let options = WalkOptions {
            search_target: SearchTarget::Directories,
            ..Default::default()
        };
        let walker = Walker::new(&filter, &options);

        let mut ctx = SearchContext::new(CancelToken::default(), 0);
        let found = collect(&walker, dir.path(), &mut ctx);
        assert_eq!(found, vec![dir.path().join("sub")]);
        assert_eq!(ctx.telemetry.matching_directory_count, 1);
    }

    #[test]
    fn ignored_paths_bypass_the_filter_chain() {
        let dir = tree();
        let filter = FileSystemFilter {
            name: Some(Filter::from_pattern(r"\.txt$").unwrap()),
            ..Default::default()
        };
        let ignored: HashSet<PathBuf> = [dir.path().join("a.txt")].into_iter().collect();
        let options = WalkOptions::default();
        let mut walker = Walker::new(&filter, &options);
        walker.ignored_paths = Some(&ignored);

        let mut ctx = SearchContext::new(CancelToken::default(), 0);
        let found = collect(&walker, dir.path(), &mut ctx);
        assert_eq!(found, vec![dir.path().join("sub/c.txt")]);
    }

    #[test]
    fn canceled_walk_stops_early() {
        let dir = tree();
        let filter = FileSystemFilter::default();
        let options = WalkOptions::default();
        let walker = Walker::new(&filter, &options);

        let token = CancelToken::default();
        token.cancel();
        let mut ctx = SearchContext::new(token, 0);
        let found = collect(&walker, dir.path(), &mut ctx);
        assert!(found.is_empty());
        assert_eq!(ctx.termination, crate::context::TerminationReason::Canceled);
    }

    #[test]
    fn unreadable_root_is_reported_not_fatal() {
        let filter = FileSystemFilter::default();
        let options = WalkOptions::default();
        let walker = Walker::new(&filter, &options);

        let mut ctx = SearchContext::new(CancelToken::default(), 0);
        let found = collect(&walker, Path::new("/nonexistent/orang-test"), &mut ctx);
        assert!(found.is_empty());
        assert_eq!(ctx.telemetry.error_count, 1);
    }
}
