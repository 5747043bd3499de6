use crate::content::{self, DecodedText, Replacement};
use crate::context::SearchContext;
use crate::error::Result;
use crate::file_match::SearchResult;
use crate::filter::Filter;
use crate::ops::{MatchConsumer, Operation};
use crate::output::{OpLabel, Printer};

/// Applies the content replacement to every match of the content filter and
/// writes the edited buffer back atomically.
pub struct ReplaceOp {
    printer: Printer,
    filter: Filter,
    template: String,
    dry_run: bool,
}

impl ReplaceOp {
    pub fn new(printer: Printer, filter: Filter, template: String, dry_run: bool) -> Self {
        ReplaceOp {
            printer,
            filter,
            template,
            dry_run,
        }
    }
}

impl MatchConsumer for ReplaceOp {
    fn consume(&mut self, result: &SearchResult, ctx: &mut SearchContext) -> Result<()> {
        let Some(content) = &result.file_match.content else {
            return Ok(());
        };

        let (new_text, count) = content::replace_text(
            &self.filter,
            &content.text,
            &Replacement::Template(&self.template),
        );
        if count == 0 || new_text == content.text {
            return Ok(());
        }

        if !self.dry_run {
            let decoded = DecodedText {
                text: content.text.clone(),
                encoding: content.encoding,
                had_bom: content.had_bom,
            };
            if let Err(e) = content::write_replaced(result.path(), &decoded, &new_text) {
                ctx.note_error(&e);
                return Ok(());
            }
        }

        ctx.telemetry.replacement_count += count as u64;
        ctx.telemetry.updated_count += 1;
        self.printer
            .print_result(result, Some(OpLabel::Update), &mut ctx.dir_sizes);
        Ok(())
    }
}

impl Operation for ReplaceOp {
    fn printer_mut(&mut self) -> &mut Printer {
        &mut self.printer
    }
}
