use crate::content::{self, Replacement};
use crate::context::SearchContext;
use crate::error::{Error, Result};
use crate::file_match::SearchResult;
use crate::filesystem;
use crate::filter::Filter;
use crate::ops::{MatchConsumer, Operation};
use crate::output::{OpLabel, Printer};

/// Applies the replacement to the matched part of each entry's name and
/// renames the entry in place.
pub struct RenameOp {
    printer: Printer,
    filter: Filter,
    template: String,
    dry_run: bool,
}

impl RenameOp {
    pub fn new(printer: Printer, filter: Filter, template: String, dry_run: bool) -> Self {
        RenameOp {
            printer,
            filter,
            template,
            dry_run,
        }
    }
}

impl MatchConsumer for RenameOp {
    fn consume(&mut self, result: &SearchResult, ctx: &mut SearchContext) -> Result<()> {
        let path = result.path();
        let file_name = result.file_match.file_name();
        let (new_name, count) = content::transform_file_name(
            &self.filter,
            &file_name,
            &Replacement::Template(&self.template),
        );
        if count == 0 || new_name == file_name {
            return Ok(());
        }

        let target = match path.parent() {
            Some(parent) => parent.join(&new_name),
            None => return Ok(()),
        };

        if target.symlink_metadata().is_ok() && !filesystem::same_file(path, &target) {
            ctx.note_error(&Error::RenameConflict {
                path: path.to_path_buf(),
                target,
            });
            return Ok(());
        }

        if !self.dry_run {
            if let Err(e) = filesystem::rename(path, &target) {
                ctx.note_error(&Error::io(path, e));
                return Ok(());
            }
        }

        ctx.telemetry.renamed_count += 1;
        self.printer.print_transition(OpLabel::Rename, path, &target);
        Ok(())
    }
}

impl Operation for RenameOp {
    fn printer_mut(&mut self) -> &mut Printer {
        &mut self.printer
    }
}
