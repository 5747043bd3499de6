use crate::context::SearchContext;
use crate::error::Result;
use crate::file_match::SearchResult;
use crate::filter::Filter;
use crate::ops::{MatchConsumer, Operation};
use crate::output::Printer;

/// Pure sink: prints matched paths, or every content match value when run
/// as the `match` verb.
pub struct FindOp {
    printer: Printer,
    /// Set for the `match` verb; enumerates all content matches per file.
    content_filter: Option<Filter>,
}

impl FindOp {
    pub fn new(printer: Printer) -> Self {
        FindOp {
            printer,
            content_filter: None,
        }
    }

    pub fn listing_matches(printer: Printer, content_filter: Filter) -> Self {
        FindOp {
            printer,
            content_filter: Some(content_filter),
        }
    }
}

impl MatchConsumer for FindOp {
    fn consume(&mut self, result: &SearchResult, ctx: &mut SearchContext) -> Result<()> {
        match (&self.content_filter, &result.file_match.content) {
            (Some(filter), Some(content)) => {
                for m in filter.matches(&content.text) {
                    self.printer.print_match_value(&m.value);
                }
            }
            _ => self.printer.print_result(result, None, &mut ctx.dir_sizes),
        }
        Ok(())
    }
}

impl Operation for FindOp {
    fn printer_mut(&mut self) -> &mut Printer {
        &mut self.printer
    }
}
