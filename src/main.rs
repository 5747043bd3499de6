use std::io;

use clap::Parser;

use orang::cli::{Opts, Verb};
use orang::config::Config;
use orang::content;
use orang::context::{CancelToken, ConsoleProgress, SearchContext, TerminationReason};
use orang::error::{Error, Result};
use orang::exit_codes::ExitCode;
use orang::filter::{FileEmptyOption, PatternOptions};
use orang::logger::ConsoleLogger;
use orang::ops::{
    self, DeleteOp, FindOp, Operation, RenameOp, ReplaceOp, StdinPrompt, TransferOp,
};
use orang::output::{OutputFile, Printer};
use orang::sync::SyncOp;
use orang::walk::SearchTarget;

fn main() {
    let opts = Opts::parse();
    ConsoleLogger::install(opts.verb.verbosity());

    let cancel = CancelToken::default();
    {
        let cancel = cancel.clone();
        // A second ctrl-c falls through to the default handler.
        let _ = ctrlc::set_handler(move || cancel.cancel());
    }

    let code = match run(opts, cancel) {
        Ok(code) => code,
        Err(Error::Canceled) => ExitCode::Error,
        Err(err) => {
            log::error!("{err}");
            ExitCode::Error
        }
    };
    code.exit();
}

fn run(opts: Opts, cancel: CancelToken) -> Result<ExitCode> {
    match opts.verb {
        Verb::Find(args) => {
            let config = args.search.common.to_config(args.target)?;
            let printer = make_printer(&config)?;
            let mut op = FindOp::new(printer);
            run_search(&config, cancel, &mut op)
        }
        Verb::Match(args) => {
            let config = args.common.to_config(SearchTarget::Files)?;
            let content_filter =
                config.filter.content.clone().ok_or_else(|| Error::OptionParse {
                    what: "match command",
                    reason: "a content pattern (-c) is required".to_owned(),
                })?;
            let printer = make_printer(&config)?;
            let mut op = FindOp::listing_matches(printer, content_filter);
            run_search(&config, cancel, &mut op)
        }
        Verb::Replace(args) => {
            let config = args.search.common.to_config(SearchTarget::Files)?;
            let content_filter =
                config.filter.content.clone().ok_or_else(|| Error::OptionParse {
                    what: "replace command",
                    reason: "a content pattern (-c) is required".to_owned(),
                })?;
            let printer = make_printer(&config)?;
            let mut op = ReplaceOp::new(printer, content_filter, args.template, config.dry_run);
            run_search(&config, cancel, &mut op)
        }
        Verb::Rename(args) => {
            let config = args.search.common.to_config(SearchTarget::All)?;
            let name_filter = config.filter.name.clone().ok_or_else(|| Error::OptionParse {
                what: "rename command",
                reason: "a name pattern (-n) is required".to_owned(),
            })?;
            let printer = make_printer(&config)?;
            let mut op = RenameOp::new(printer, name_filter, args.template, config.dry_run);
            run_search(&config, cancel, &mut op)
        }
        Verb::Copy(args) => run_transfer(args, false, cancel),
        Verb::Move(args) => run_transfer(args, true, cancel),
        Verb::Delete(args) => {
            let config = args.search.common.to_config(SearchTarget::All)?;
            let printer = make_printer(&config)?;
            let empty_only = config.filter.empty == FileEmptyOption::Empty;
            let mut op = DeleteOp::new(printer, args.recursive, empty_only, config.dry_run);
            run_search(&config, cancel, &mut op)
        }
        Verb::Sync(args) => {
            let config = args.search.common.to_config(SearchTarget::All)?;
            let compare = args.compare_options()?;
            let left = config.paths[0].path.clone();

            let mut ctx = SearchContext::new(cancel, config.max_matching_files);
            if config.progress {
                ctx.progress = Some(Box::new(ConsoleProgress::new()));
            }

            let printer = make_printer(&config)?;
            let mut op = SyncOp::new(
                printer,
                args.conflict,
                compare,
                config.dry_run,
                Box::new(StdinPrompt),
            );
            op.run(
                &left,
                &args.right,
                &config.filter,
                config.directory_filter.as_ref(),
                &config.walk,
                &mut ctx,
            )?;
            if config.include_summary {
                op.printer_mut().print_summary(&ctx.telemetry);
            }
            Ok(exit_code(&ctx))
        }
        Verb::Escape(args) => {
            let text = match args.text {
                Some(text) => text,
                None => io::read_to_string(io::stdin())
                    .map_err(|e| Error::io("stdin", e))?,
            };
            println!("{}", regex::escape(text.trim_end_matches('\n')));
            Ok(ExitCode::Success)
        }
        Verb::Split(args) => {
            let (pattern, options) =
                args.content.split_first().ok_or_else(|| Error::OptionParse {
                    what: "split command",
                    reason: "a content pattern (-c) is required".to_owned(),
                })?;
            let filter = orang::filter::Filter::new(pattern, &PatternOptions::parse(options)?)?;
            let encoding = orang::cli::parse_encoding(args.encoding.as_deref())?;
            let decoded = content::decode_file(&args.file, encoding)?;

            let match_count = filter.matches(&decoded.text).len();
            for fragment in ops::split_text(&filter, &decoded.text, args.include_match) {
                println!("{fragment}");
            }
            Ok(ExitCode::from_match_count(match_count as u64))
        }
        Verb::ListPatterns => {
            for (pattern, description) in ops::list_patterns() {
                println!("{pattern:<24} {description}");
            }
            Ok(ExitCode::Success)
        }
    }
}

fn run_transfer(
    args: orang::cli::TransferArgs,
    move_files: bool,
    cancel: CancelToken,
) -> Result<ExitCode> {
    let config = args.search.common.to_config(SearchTarget::All)?;
    let printer = make_printer(&config)?;
    let mut op = TransferOp::new(
        printer,
        &args.target,
        move_files,
        args.conflict,
        config.dry_run,
        Box::new(StdinPrompt),
    );
    run_search(&config, cancel, &mut op)
}

fn run_search(config: &Config, cancel: CancelToken, op: &mut dyn Operation) -> Result<ExitCode> {
    let mut ctx = SearchContext::new(cancel, config.max_matching_files);
    if config.progress {
        ctx.progress = Some(Box::new(ConsoleProgress::new()));
    }
    match ops::run_search(config, &mut ctx, op) {
        Ok(()) => {}
        Err(Error::Canceled) => return Ok(ExitCode::Error),
        Err(e) => return Err(e),
    }
    Ok(exit_code(&ctx))
}

fn make_printer(config: &Config) -> Result<Printer> {
    let mut printer = Printer::new(config.highlight, config.display);
    if let Some(spec) = &config.output {
        printer.output_file = Some(OutputFile::parse(spec)?);
    }
    Ok(printer)
}

fn exit_code(ctx: &SearchContext) -> ExitCode {
    match ctx.termination {
        TerminationReason::Canceled => ExitCode::Error,
        _ => ExitCode::from_match_count(ctx.telemetry.matching_count()),
    }
}
