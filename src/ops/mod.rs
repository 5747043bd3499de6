pub use self::copy_move::TransferOp;
pub use self::delete::DeleteOp;
pub use self::find::FindOp;
pub use self::misc::{list_patterns, split_text};
pub use self::rename::RenameOp;
pub use self::replace::ReplaceOp;

pub mod copy_move;
pub mod delete;
pub mod find;
pub mod misc;
pub mod rename;
pub mod replace;

use std::io::{self, BufRead, Write};

use crate::config::Config;
use crate::context::SearchContext;
use crate::error::Result;
use crate::file_match::SearchResult;
use crate::output::{self, Printer};
use crate::walk::Walker;

/// Per-match action of a verb. The traversal (or the drained result buffer)
/// feeds every accepted match through `consume`.
pub trait MatchConsumer {
    fn consume(&mut self, result: &SearchResult, ctx: &mut SearchContext) -> Result<()>;
}

/// A verb executor: a match consumer that also owns the printer, so the
/// runner can attach column widths and print the summary.
pub trait Operation: MatchConsumer {
    fn printer_mut(&mut self) -> &mut Printer;
}

/// Answer to an interactive conflict question.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialogResult {
    Yes,
    YesToAll,
    No,
    NoToAll,
    Cancel,
}

/// Source of interactive answers. `None` means no answer could be obtained
/// (e.g. stdin closed); callers skip the pending action in that case.
pub trait Prompt {
    fn ask(&mut self, question: &str) -> Option<DialogResult>;
}

/// Reads `y`/`ya`/`n`/`na`/`c` answers from stdin.
pub struct StdinPrompt;

impl Prompt for StdinPrompt {
    fn ask(&mut self, question: &str) -> Option<DialogResult> {
        let mut stderr = io::stderr().lock();
        let _ = write!(stderr, "{question} (y[a]/n[a]/c): ");
        let _ = stderr.flush();

        let mut line = String::new();
        let stdin = io::stdin();
        if stdin.lock().read_line(&mut line).ok()? == 0 {
            return None;
        }
        match line.trim().to_lowercase().as_str() {
            "y" | "yes" => Some(DialogResult::Yes),
            "ya" | "yes-to-all" => Some(DialogResult::YesToAll),
            "n" | "no" => Some(DialogResult::No),
            "na" | "no-to-all" => Some(DialogResult::NoToAll),
            "c" | "cancel" => Some(DialogResult::Cancel),
            _ => None,
        }
    }
}

/// A prompt with scripted answers, for tests and non-interactive runs.
pub struct ScriptedPrompt {
    answers: Vec<DialogResult>,
    next: usize,
}

impl ScriptedPrompt {
    pub fn new(answers: Vec<DialogResult>) -> Self {
        ScriptedPrompt { answers, next: 0 }
    }
}

impl Prompt for ScriptedPrompt {
    fn ask(&mut self, _question: &str) -> Option<DialogResult> {
        let answer = self.answers.get(self.next).copied();
        self.next += 1;
        answer
    }
}

/// Drive a whole search command: walk every root, stream or buffer results
/// per the buffering rule, and feed the executor.
///
/// The buffer is used iff sort descriptors are present or a file-property
/// column was requested; otherwise results stream straight to the executor.
pub fn run_search(config: &Config, ctx: &mut SearchContext, op: &mut dyn Operation) -> Result<()> {
    let buffered = !config.sort.is_empty() || config.display.any_property();

    let mut walker = Walker::new(&config.filter, &config.walk);
    walker.directory_filter = config.directory_filter.as_ref();

    if buffered {
        ctx.results = Some(Vec::new());
        for path_info in &config.paths {
            walker.walk(&path_info.path, ctx, &mut |result, ctx| {
                ctx.results
                    .as_mut()
                    .expect("buffer present in buffered mode")
                    .push(result);
                Ok(())
            })?;
            if ctx.is_terminated() {
                break;
            }
        }

        let mut results = ctx.results.take().unwrap_or_default();
        output::sort_results(&mut results, &config.sort, &mut ctx.dir_sizes);
        if let Some(max_count) = config.max_count {
            results.truncate(max_count);
        }
        if config.display.any_property() {
            let widths = output::compute_columns(&results, &mut ctx.dir_sizes);
            op.printer_mut().columns = Some(widths);
        }
        for result in &results {
            op.consume(result, ctx)?;
        }
    } else {
        let mut emitted: usize = 0;
        let max_count = config.max_count;
        for path_info in &config.paths {
            walker.walk(&path_info.path, ctx, &mut |result, ctx| {
                op.consume(&result, ctx)?;
                emitted += 1;
                if max_count.is_some_and(|max| emitted >= max) {
                    ctx.termination = crate::context::TerminationReason::MaxReached;
                }
                Ok(())
            })?;
            if ctx.is_terminated() {
                break;
            }
        }
    }

    if let Some(progress) = ctx.progress.as_mut() {
        progress.finish();
    }
    if config.include_summary {
        op.printer_mut().print_summary(&ctx.telemetry);
    }
    Ok(())
}
