use std::fs;
use std::path::Path;

use crate::context::SearchContext;
use crate::error::{Error, Result};
use crate::file_match::SearchResult;
use crate::filesystem;
use crate::ops::{DialogResult, MatchConsumer, Operation, Prompt};
use crate::output::{OpLabel, Printer};

/// What to do when a destination path already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum ConflictOption {
    #[default]
    Ask,
    Overwrite,
    Skip,
}

/// Copies or moves matches into a target directory, projecting each match's
/// base-relative path under the target.
pub struct TransferOp<'a> {
    printer: Printer,
    target: &'a Path,
    move_files: bool,
    conflict: ConflictOption,
    dry_run: bool,
    prompt: Box<dyn Prompt + 'a>,
}

impl<'a> TransferOp<'a> {
    pub fn new(
        printer: Printer,
        target: &'a Path,
        move_files: bool,
        conflict: ConflictOption,
        dry_run: bool,
        prompt: Box<dyn Prompt + 'a>,
    ) -> Self {
        TransferOp {
            printer,
            target,
            move_files,
            conflict,
            dry_run,
            prompt,
        }
    }

    /// Resolve an existing destination. Returns whether to proceed.
    fn resolve_conflict(&mut self, destination: &Path) -> Result<bool> {
        loop {
            match self.conflict {
                ConflictOption::Overwrite => return Ok(true),
                ConflictOption::Skip => return Ok(false),
                ConflictOption::Ask => {
                    let question = format!("Overwrite {}?", destination.display());
                    match self.prompt.ask(&question) {
                        None => return Ok(false),
                        Some(DialogResult::Yes) => return Ok(true),
                        Some(DialogResult::No) => return Ok(false),
                        Some(DialogResult::YesToAll) => self.conflict = ConflictOption::Overwrite,
                        Some(DialogResult::NoToAll) => self.conflict = ConflictOption::Skip,
                        Some(DialogResult::Cancel) => return Err(Error::Canceled),
                    }
                }
            }
        }
    }
}

impl MatchConsumer for TransferOp<'_> {
    fn consume(&mut self, result: &SearchResult, ctx: &mut SearchContext) -> Result<()> {
        let source = result.path();
        let destination = self.target.join(result.relative_path());

        let existed = destination.symlink_metadata().is_ok();
        if existed {
            if result.file_match.is_directory && destination.is_dir() {
                // Nothing to transfer; children arrive on their own.
                return Ok(());
            }
            if !self.resolve_conflict(&destination)? {
                return Ok(());
            }
        }

        if self.dry_run {
            self.record(result, source, &destination, existed, ctx);
            return Ok(());
        }

        if let Some(parent) = destination.parent() {
            if let Err(e) = fs::create_dir_all(parent) {
                ctx.note_error(&Error::io(parent, e));
                return Ok(());
            }
        }

        let outcome = if result.file_match.is_directory {
            fs::create_dir_all(&destination)
        } else if self.move_files {
            // Prefer a cheap rename; fall back to copy+delete across devices.
            fs::rename(source, &destination).or_else(|_| {
                filesystem::copy_file_with_times(source, &destination)
                    .and_then(|_| fs::remove_file(source))
            })
        } else {
            if existed {
                // Overwrite only after the source was read successfully.
                let _ = fs::remove_file(&destination);
            }
            filesystem::copy_file_with_times(source, &destination)
        };

        match outcome {
            Ok(()) => {
                self.record(result, source, &destination, existed, ctx);
                Ok(())
            }
            Err(e) => {
                ctx.note_error(&Error::io(source, e));
                Ok(())
            }
        }
    }
}

impl TransferOp<'_> {
    fn record(
        &mut self,
        result: &SearchResult,
        source: &Path,
        destination: &Path,
        existed: bool,
        ctx: &mut SearchContext,
    ) {
        let label = if existed {
            ctx.telemetry.updated_count += 1;
            OpLabel::Update
        } else {
            ctx.telemetry.added_count += 1;
            OpLabel::Add
        };
        if result.file_match.is_directory && !existed {
            self.printer
                .print_result(result, Some(label), &mut ctx.dir_sizes);
        } else {
            self.printer.print_transition(label, source, destination);
        }
    }
}

impl Operation for TransferOp<'_> {
    fn printer_mut(&mut self) -> &mut Printer {
        &mut self.printer
    }
}
