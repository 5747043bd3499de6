use std::collections::HashSet;
use std::fs::{self, File, Metadata};
use std::mem;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::context::SearchContext;
use crate::error::{Error, Result};
use crate::file_match::SearchResult;
use crate::filesystem;
use crate::filter::{FileSystemFilter, Filter};
use crate::ops::{DialogResult, Prompt};
use crate::output::{OpLabel, Printer};
use crate::walk::{WalkOptions, Walker};

/// Which differences make two files unequal during sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompareOptions {
    pub attributes: bool,
    pub content: bool,
    pub modified_time: bool,
    pub size: bool,
}

impl Default for CompareOptions {
    fn default() -> Self {
        CompareOptions {
            attributes: false,
            content: false,
            modified_time: true,
            size: true,
        }
    }
}

impl CompareOptions {
    pub fn parse(s: &str) -> Result<Self> {
        let mut compare = CompareOptions {
            attributes: false,
            content: false,
            modified_time: false,
            size: false,
        };
        for word in s.split(',').map(str::trim).filter(|w| !w.is_empty()) {
            match word {
                "a" | "attributes" => compare.attributes = true,
                "c" | "content" => compare.content = true,
                "m" | "modified-time" => compare.modified_time = true,
                "s" | "size" => compare.size = true,
                other => {
                    return Err(Error::UnknownEnumValue {
                        what: "compare option",
                        value: other.to_owned(),
                    })
                }
            }
        }
        Ok(compare)
    }
}

/// Who wins when both sides diverge and modification times give no verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum ConflictResolution {
    #[default]
    LeftWins,
    RightWins,
    Ask,
}

impl ConflictResolution {
    fn invert(self) -> Self {
        match self {
            ConflictResolution::LeftWins => ConflictResolution::RightWins,
            ConflictResolution::RightWins => ConflictResolution::LeftWins,
            ConflictResolution::Ask => ConflictResolution::Ask,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    LeftToRight,
    RightToLeft,
}

/// Snapshot of a destination directory's files, for rename detection.
/// Cached while consecutive siblings resolve to the same parent.
struct DirectoryData {
    path: PathBuf,
    files: Vec<(PathBuf, SystemTime, u64)>,
}

impl DirectoryData {
    fn load(dir: &Path) -> std::io::Result<Self> {
        let mut files = Vec::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let metadata = entry.metadata()?;
            if metadata.is_file() {
                let modified = metadata.modified()?;
                files.push((entry.path(), modified, metadata.len()));
            }
        }
        Ok(DirectoryData {
            path: dir.to_path_buf(),
            files,
        })
    }
}

/// Two-pass bidirectional synchronizer.
///
/// The first pass walks the left root and harmonizes every entry with its
/// mirror under the right root, recording each mirror path. The second pass
/// walks the right root with inverted roles, skipping everything already
/// harmonized; anything left over has no counterpart and is resolved in the
/// opposite direction.
pub struct SyncOp<'a> {
    printer: Printer,
    conflict: ConflictResolution,
    compare: CompareOptions,
    dry_run: bool,
    prompt: Box<dyn Prompt + 'a>,
    destination_paths: HashSet<PathBuf>,
    ignored_paths: HashSet<PathBuf>,
    dir_cache: Option<DirectoryData>,
    /// Directories a dry run "deleted"; their descendants are still on disk
    /// and must not be reported a second time.
    virtually_deleted: Vec<PathBuf>,
}

impl<'a> SyncOp<'a> {
    pub fn new(
        printer: Printer,
        conflict: ConflictResolution,
        compare: CompareOptions,
        dry_run: bool,
        prompt: Box<dyn Prompt + 'a>,
    ) -> Self {
        SyncOp {
            printer,
            conflict,
            compare,
            dry_run,
            prompt,
            destination_paths: HashSet::new(),
            ignored_paths: HashSet::new(),
            dir_cache: None,
            virtually_deleted: Vec::new(),
        }
    }

    pub fn printer_mut(&mut self) -> &mut Printer {
        &mut self.printer
    }

    pub fn run(
        &mut self,
        left: &Path,
        right: &Path,
        filter: &FileSystemFilter,
        directory_filter: Option<&Filter>,
        walk_options: &WalkOptions,
        ctx: &mut SearchContext,
    ) -> Result<()> {
        self.pass(left, right, Direction::LeftToRight, filter, directory_filter, walk_options, ctx)?;
        if ctx.is_terminated() {
            return Ok(());
        }

        // Transfer: everything the first pass touched is off-limits now.
        self.ignored_paths = mem::take(&mut self.destination_paths);
        self.conflict = self.conflict.invert();
        self.dir_cache = None;

        self.pass(right, left, Direction::RightToLeft, filter, directory_filter, walk_options, ctx)
    }

    #[allow(clippy::too_many_arguments)]
    fn pass(
        &mut self,
        src_root: &Path,
        dst_root: &Path,
        direction: Direction,
        filter: &FileSystemFilter,
        directory_filter: Option<&Filter>,
        walk_options: &WalkOptions,
        ctx: &mut SearchContext,
    ) -> Result<()> {
        let mut walker = Walker::new(filter, walk_options);
        walker.directory_filter = directory_filter;
        let ignored = mem::take(&mut self.ignored_paths);
        if direction == Direction::RightToLeft {
            walker.ignored_paths = Some(&ignored);
        }

        let src_root = src_root.to_path_buf();
        let dst_root = dst_root.to_path_buf();
        let outcome = walker.walk(&src_root, ctx, &mut |result, ctx| {
            self.harmonize(&result, &src_root, &dst_root, direction, ctx)
        });
        self.ignored_paths = ignored;

        match outcome {
            Err(Error::Canceled) => {
                ctx.termination = crate::context::TerminationReason::Canceled;
                Ok(())
            }
            other => other,
        }
    }

    /// Apply the decision table to one source entry and its mirror path.
    fn harmonize(
        &mut self,
        result: &SearchResult,
        src_root: &Path,
        dst_root: &Path,
        direction: Direction,
        ctx: &mut SearchContext,
    ) -> Result<()> {
        let source = result.path();
        if self.dry_run && self.virtually_deleted.iter().any(|d| source.starts_with(d)) {
            return Ok(());
        }
        let rel = source.strip_prefix(src_root).unwrap_or(source);
        let destination = dst_root.join(rel);

        if direction == Direction::LeftToRight {
            self.destination_paths.insert(destination.clone());
        }

        let src_is_dir = result.file_match.is_directory;
        let src_meta = match fs::symlink_metadata(source) {
            Ok(metadata) => metadata,
            Err(e) => {
                ctx.note_error(&Error::io(source, e));
                return Ok(());
            }
        };
        let dst_meta = fs::symlink_metadata(&destination).ok();

        let prefer_left = match &dst_meta {
            None => direction == Direction::LeftToRight,
            Some(dst_meta) if dst_meta.is_dir() != src_is_dir => {
                direction == Direction::LeftToRight
            }
            Some(dst_meta) => {
                if src_is_dir {
                    // Same kind, both directories: equality is attribute
                    // equality, and conflicts go to the policy.
                    if !self.compare.attributes || !attributes_differ(&src_meta, dst_meta) {
                        return Ok(());
                    }
                    match self.resolve_conflict(source, &destination)? {
                        Some(prefer_left) => prefer_left,
                        None => return Ok(()),
                    }
                } else {
                    if self.files_equal(source, &src_meta, &destination, dst_meta, ctx)? {
                        return Ok(());
                    }
                    let src_mtime = src_meta.modified().map_err(|e| Error::io(source, e))?;
                    let dst_mtime = dst_meta
                        .modified()
                        .map_err(|e| Error::io(&destination, e))?;
                    if src_mtime != dst_mtime {
                        // The newer side wins regardless of policy.
                        src_mtime > dst_mtime
                    } else {
                        match self.resolve_conflict(source, &destination)? {
                            Some(prefer_left) => prefer_left,
                            None => return Ok(()),
                        }
                    }
                }
            }
        };

        self.execute(
            result,
            source,
            &src_meta,
            &destination,
            dst_meta.as_ref(),
            prefer_left,
            direction,
            ctx,
        )
    }

    /// Decision table, `prefer_left` already derived.
    #[allow(clippy::too_many_arguments)]
    fn execute(
        &mut self,
        result: &SearchResult,
        source: &Path,
        src_meta: &Metadata,
        destination: &Path,
        dst_meta: Option<&Metadata>,
        prefer_left: bool,
        direction: Direction,
        ctx: &mut SearchContext,
    ) -> Result<()> {
        let src_is_dir = result.file_match.is_directory;
        let dst_state = dst_meta.map(|m| m.is_dir());

        match (src_is_dir, dst_state, prefer_left) {
            // dir / dir exists
            (true, Some(true), true) => self.update_attributes(source, destination, ctx),
            (true, Some(true), false) => self.update_attributes(destination, source, ctx),
            // dir / file exists
            (true, Some(false), true) => {
                self.delete(destination, false, ctx)?;
                self.create_dir(destination, ctx)
            }
            (true, Some(false), false) => {
                self.delete(source, true, ctx)?;
                self.copy(destination, source, ctx)
            }
            // dir / missing
            (true, None, true) => self.create_dir(destination, ctx),
            (true, None, false) => self.delete(source, true, ctx),
            // file / file exists (unequal; equal pairs never get here)
            (false, Some(false), true) => self.overwrite(source, destination, ctx),
            (false, Some(false), false) => self.overwrite(destination, source, ctx),
            // file / dir exists
            (false, Some(true), true) => {
                self.delete(destination, true, ctx)?;
                self.copy(source, destination, ctx)
            }
            (false, Some(true), false) => {
                self.delete(source, false, ctx)?;
                self.create_dir(source, ctx)
            }
            // file / missing
            (false, None, true) => {
                if direction == Direction::LeftToRight {
                    if let Some(renamed) =
                        self.find_renamed_file(source, src_meta, destination, ctx)?
                    {
                        return self.rename(&renamed, destination, ctx);
                    }
                }
                self.copy(source, destination, ctx)
            }
            (false, None, false) => self.delete(source, src_is_dir, ctx),
        }
    }

    /// Ask the conflict policy; `None` means skip this pair (no answer).
    fn resolve_conflict(&mut self, source: &Path, destination: &Path) -> Result<Option<bool>> {
        match self.conflict {
            ConflictResolution::LeftWins => Ok(Some(true)),
            ConflictResolution::RightWins => Ok(Some(false)),
            ConflictResolution::Ask => {
                let question = format!(
                    "Prefer {} over {}?",
                    source.display(),
                    destination.display()
                );
                match self.prompt.ask(&question) {
                    None => Ok(None),
                    Some(DialogResult::Yes) => Ok(Some(true)),
                    Some(DialogResult::No) => Ok(Some(false)),
                    Some(DialogResult::YesToAll) => {
                        self.conflict = ConflictResolution::LeftWins;
                        Ok(Some(true))
                    }
                    Some(DialogResult::NoToAll) => {
                        self.conflict = ConflictResolution::RightWins;
                        Ok(Some(false))
                    }
                    Some(DialogResult::Cancel) => Err(Error::Canceled),
                }
            }
        }
    }

    fn files_equal(
        &mut self,
        source: &Path,
        src_meta: &Metadata,
        destination: &Path,
        dst_meta: &Metadata,
        ctx: &mut SearchContext,
    ) -> Result<bool> {
        if self.compare.size && src_meta.len() != dst_meta.len() {
            return Ok(false);
        }
        if self.compare.modified_time {
            let src_mtime = src_meta.modified().map_err(|e| Error::io(source, e))?;
            let dst_mtime = dst_meta.modified().map_err(|e| Error::io(destination, e))?;
            if src_mtime != dst_mtime {
                return Ok(false);
            }
        }
        if self.compare.attributes && attributes_differ(src_meta, dst_meta) {
            return Ok(false);
        }
        if self.compare.content
            && !filesystem::files_equal(source, destination, ctx.cancel_token())?
        {
            return Ok(false);
        }
        Ok(true)
    }

    /// Rename detection: among the destination directory's files, keep those
    /// whose mtime equals the source's, then those of equal length, then
    /// those byte-equal to the source. A single survivor is the renamed
    /// counterpart. One source handle serves all comparisons.
    fn find_renamed_file(
        &mut self,
        source: &Path,
        src_meta: &Metadata,
        destination: &Path,
        ctx: &mut SearchContext,
    ) -> Result<Option<PathBuf>> {
        let Some(parent) = destination.parent() else {
            return Ok(None);
        };

        if self.dir_cache.as_ref().map(|d| d.path.as_path()) != Some(parent) {
            self.dir_cache = match DirectoryData::load(parent) {
                Ok(data) => Some(data),
                Err(_) => return Ok(None),
            };
        }
        let data = self.dir_cache.as_ref().expect("cache loaded above");

        let src_mtime = src_meta.modified().map_err(|e| Error::io(source, e))?;
        let src_len = src_meta.len();
        let candidates: Vec<&PathBuf> = data
            .files
            .iter()
            .filter(|(path, mtime, len)| {
                *mtime == src_mtime && *len == src_len && !self.destination_paths.contains(path)
            })
            .map(|(path, _, _)| path)
            .collect();
        if candidates.is_empty() {
            return Ok(None);
        }

        let mut src_file = File::open(source).map_err(|e| Error::io(source, e))?;
        let mut byte_equal: Option<PathBuf> = None;
        for candidate in candidates {
            if filesystem::stream_equals_file(&mut src_file, source, candidate, ctx.cancel_token())?
            {
                if byte_equal.is_some() {
                    // Ambiguous; fall back to a plain copy.
                    return Ok(None);
                }
                byte_equal = Some(candidate.clone());
            }
        }
        Ok(byte_equal)
    }

    // -- primitive actions, all honouring dry-run ------------------------

    fn create_dir(&mut self, path: &Path, ctx: &mut SearchContext) -> Result<()> {
        if !self.dry_run {
            if let Err(e) = fs::create_dir_all(path) {
                ctx.note_error(&Error::io(path, e));
                return Ok(());
            }
        }
        self.dir_cache = None;
        ctx.telemetry.added_count += 1;
        self.print(OpLabel::Add, path);
        Ok(())
    }

    fn delete(&mut self, path: &Path, recursive: bool, ctx: &mut SearchContext) -> Result<()> {
        if self.dry_run && recursive {
            self.virtually_deleted.push(path.to_path_buf());
        }
        if !self.dry_run {
            let removed = if recursive {
                fs::remove_dir_all(path)
            } else if path.is_dir() {
                fs::remove_dir(path)
            } else {
                fs::remove_file(path)
            };
            if let Err(e) = removed {
                ctx.note_error(&Error::io(path, e));
                return Ok(());
            }
        }
        self.dir_cache = None;
        ctx.telemetry.deleted_count += 1;
        self.print(OpLabel::Delete, path);
        Ok(())
    }

    fn copy(&mut self, from: &Path, to: &Path, ctx: &mut SearchContext) -> Result<()> {
        if !self.dry_run {
            if let Some(parent) = to.parent() {
                if let Err(e) = fs::create_dir_all(parent) {
                    ctx.note_error(&Error::io(parent, e));
                    return Ok(());
                }
            }
            if let Err(e) = filesystem::copy_file_with_times(from, to) {
                ctx.note_error(&Error::io(from, e));
                return Ok(());
            }
        }
        self.dir_cache = None;
        ctx.telemetry.added_count += 1;
        self.print(OpLabel::Add, to);
        Ok(())
    }

    fn overwrite(&mut self, from: &Path, to: &Path, ctx: &mut SearchContext) -> Result<()> {
        if !self.dry_run {
            if let Err(e) = filesystem::copy_file_with_times(from, to) {
                ctx.note_error(&Error::io(from, e));
                return Ok(());
            }
        }
        self.dir_cache = None;
        ctx.telemetry.updated_count += 1;
        self.print(OpLabel::Update, to);
        Ok(())
    }

    fn rename(&mut self, from: &Path, to: &Path, ctx: &mut SearchContext) -> Result<()> {
        if !self.dry_run {
            if let Err(e) = filesystem::rename(from, to) {
                ctx.note_error(&Error::io(from, e));
                return Ok(());
            }
        }
        // The old name must not resurface in the second pass.
        self.destination_paths.insert(from.to_path_buf());
        self.dir_cache = None;
        ctx.telemetry.renamed_count += 1;
        self.printer.print_transition(OpLabel::Rename, from, to);
        Ok(())
    }

    fn update_attributes(&mut self, from: &Path, to: &Path, ctx: &mut SearchContext) -> Result<()> {
        if !self.dry_run {
            if let Err(e) = filesystem::copy_attributes(from, to) {
                ctx.note_error(&Error::io(to, e));
                return Ok(());
            }
        }
        ctx.telemetry.updated_count += 1;
        self.print(OpLabel::Update, to);
        Ok(())
    }

    fn print(&mut self, label: OpLabel, path: &Path) {
        self.printer.print_path(label, path);
    }
}

fn attributes_differ(a: &Metadata, b: &Metadata) -> bool {
    a.permissions().readonly() != b.permissions().readonly()
}
