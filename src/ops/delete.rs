use std::fs;

use crate::context::SearchContext;
use crate::error::{Error, Result};
use crate::file_match::SearchResult;
use crate::filesystem;
use crate::ops::{MatchConsumer, Operation};
use crate::output::{OpLabel, Printer};

/// Removes matched entries. Directories need `--recursive`; in empty-only
/// mode a non-empty directory is refused rather than emptied.
pub struct DeleteOp {
    printer: Printer,
    recursive: bool,
    empty_only: bool,
    dry_run: bool,
}

impl DeleteOp {
    pub fn new(printer: Printer, recursive: bool, empty_only: bool, dry_run: bool) -> Self {
        DeleteOp {
            printer,
            recursive,
            empty_only,
            dry_run,
        }
    }
}

impl MatchConsumer for DeleteOp {
    fn consume(&mut self, result: &SearchResult, ctx: &mut SearchContext) -> Result<()> {
        let path = result.path();
        let is_directory = result.file_match.is_directory;

        if is_directory {
            if !self.recursive {
                log::warn!("{}: is a directory (use --recursive)", path.display());
                ctx.telemetry.error_count += 1;
                return Ok(());
            }
            if self.empty_only {
                let metadata = match fs::metadata(path) {
                    Ok(metadata) => metadata,
                    Err(e) => {
                        ctx.note_error(&Error::io(path, e));
                        return Ok(());
                    }
                };
                if !filesystem::is_empty(path, &metadata) {
                    log::warn!("{}: directory is not empty", path.display());
                    ctx.telemetry.error_count += 1;
                    return Ok(());
                }
            }
        }

        if !self.dry_run {
            let removed = if is_directory {
                fs::remove_dir_all(path)
            } else {
                fs::remove_file(path)
            };
            if let Err(e) = removed {
                ctx.note_error(&Error::io(path, e));
                return Ok(());
            }
        }

        ctx.telemetry.deleted_count += 1;
        self.printer
            .print_result(result, Some(OpLabel::Delete), &mut ctx.dir_sizes);
        Ok(())
    }
}

impl Operation for DeleteOp {
    fn printer_mut(&mut self) -> &mut Printer {
        &mut self.printer
    }
}
