use std::path::PathBuf;
use std::time::SystemTime;

use clap::{Args, Parser, Subcommand};
use encoding_rs::Encoding;

use crate::config::{Config, PathInfo, PathOrigin};
use crate::error::{Error, Result};
use crate::filter::pattern::pattern_has_uppercase_char;
use crate::filter::{
    FileAttributes, FileEmptyOption, FilePropertyFilter, FileSystemFilter, Filter, PatternOptions,
    PropertyPredicate,
};
use crate::logger::Verbosity;
use crate::ops::copy_move::ConflictOption;
use crate::output::{self, DisplayOptions, HighlightMode};
use crate::sync::{CompareOptions, ConflictResolution};
use crate::walk::{SearchTarget, WalkOptions};

#[derive(Parser)]
#[command(
    name = "orang",
    version,
    about = "A cross-platform tool to find, replace, rename and synchronize files",
    max_term_width = 98,
    args_override_self = true
)]
pub struct Opts {
    #[command(subcommand)]
    pub verb: Verb,
}

#[derive(Subcommand)]
pub enum Verb {
    /// Search for files and directories
    Find(FindArgs),
    /// Search file contents and print every match value
    Match(SearchArgs),
    /// Replace content matches with a template
    Replace(TemplateArgs),
    /// Rename files and directories by rewriting their name matches
    Rename(TemplateArgs),
    /// Copy matches into a target directory
    Copy(TransferArgs),
    /// Move matches into a target directory
    Move(TransferArgs),
    /// Delete matches
    Delete(DeleteArgs),
    /// Synchronize two directories in both directions
    Sync(SyncArgs),
    /// Escape regex metacharacters in the given text
    Escape(EscapeArgs),
    /// Split a file's content on pattern matches
    Split(SplitArgs),
    /// Print a short regular-expression syntax reference
    ListPatterns,
}

impl Verb {
    /// Verbosity applies before the verb-specific work starts.
    pub fn verbosity(&self) -> Verbosity {
        match self {
            Verb::Find(args) => args.search.common.verbosity,
            Verb::Match(args) => args.common.verbosity,
            Verb::Replace(args) | Verb::Rename(args) => args.search.common.verbosity,
            Verb::Copy(args) | Verb::Move(args) => args.search.common.verbosity,
            Verb::Delete(args) => args.search.common.verbosity,
            Verb::Sync(args) => args.search.common.verbosity,
            Verb::Split(args) => args.verbosity,
            Verb::Escape(_) | Verb::ListPatterns => Verbosity::Normal,
        }
    }
}

/// Flags shared by every searching verb.
#[derive(Args)]
pub struct CommonArgs {
    /// Paths to search; the current directory when omitted
    #[arg(value_name = "PATH")]
    pub paths: Vec<PathBuf>,

    /// Regex for names: a pattern, optionally followed by pattern options
    /// such as 'i' (ignore case), 'ne' (negate), 'part=extension',
    /// 'group=NAME'
    #[arg(short = 'n', long, num_args = 1.., value_name = "PATTERN [OPTION]...")]
    pub name: Option<Vec<String>>,

    /// Regex for extensions (without the leading dot)
    #[arg(short = 'e', long, num_args = 1.., value_name = "PATTERN [OPTION]...")]
    pub extension: Option<Vec<String>>,

    /// Regex for file content; the only filter that reads file bytes
    #[arg(short = 'c', long, num_args = 1.., value_name = "PATTERN [OPTION]...")]
    pub content: Option<Vec<String>>,

    /// Regex a directory name must match for the search to descend into it
    #[arg(long, num_args = 1.., value_name = "PATTERN [OPTION]...")]
    pub directory_filter: Option<Vec<String>>,

    /// Attributes a match must have, e.g. 'hidden,read-only'
    #[arg(short = 'a', long, value_name = "MASK")]
    pub attributes: Option<String>,

    /// Attributes that disqualify a match
    #[arg(short = 'A', long, value_name = "MASK")]
    pub attributes_to_skip: Option<String>,

    /// Sort results, e.g. 'name' or 'size:desc,name'
    #[arg(short = 's', long, value_name = "DESCRIPTORS")]
    pub sort: Option<String>,

    /// Match only empty or only non-empty files and directories
    #[arg(long, value_enum, value_name = "ENUM", default_value = "any")]
    pub empty: FileEmptyOption,

    /// Encoding for files without a byte-order mark (default: utf-8)
    #[arg(long, value_name = "NAME")]
    pub encoding: Option<String>,

    /// Creation-time predicate, e.g. '>2024-01-01'
    #[arg(long, value_name = "OP DATE")]
    pub creation_time: Option<String>,

    /// Modified-time predicate, e.g. '<=2024-01-01 10:30:00' or '>1h'
    #[arg(long, value_name = "OP DATE")]
    pub modified_time: Option<String>,

    /// Size predicate, e.g. '>=10mb'
    #[arg(long, value_name = "OP SIZE")]
    pub size: Option<String>,

    /// Search subdirectories recursively
    #[arg(short = 'r', long)]
    pub recurse: bool,

    /// Maximum directory depth to descend to
    #[arg(long, value_name = "N")]
    pub max_depth: Option<usize>,

    /// Follow symbolic links
    #[arg(long)]
    pub follow: bool,

    /// Treat every pattern as case-insensitive
    #[arg(short = 'i', long)]
    pub ignore_case: bool,

    /// Case-insensitive unless a pattern contains an uppercase literal
    #[arg(long)]
    pub smart_case: bool,

    /// Maximum number of results to report
    #[arg(long, value_name = "N")]
    pub max_count: Option<usize>,

    /// Stop the traversal after this many matching files and directories
    #[arg(long, value_name = "N", default_value_t = 0)]
    pub max_matching_files: u64,

    /// Print the telemetry summary after the results
    #[arg(long)]
    pub include_summary: bool,

    /// Report the directory currently being searched
    #[arg(long)]
    pub progress: bool,

    /// Compute and report everything, mutate nothing
    #[arg(long)]
    pub dry_run: bool,

    /// Console verbosity
    #[arg(short = 'v', long, value_enum, value_name = "LEVEL", default_value = "normal")]
    pub verbosity: Verbosity,

    /// Duplicate output into a file: FILE[,VERBOSITY[,ENCODING[,append]]]
    #[arg(long, value_name = "SPEC")]
    pub output: Option<String>,

    /// Which part of a result line to highlight
    #[arg(long, value_enum, value_name = "PART", default_value = "match")]
    pub highlight: HighlightMode,

    /// File-property columns to display, e.g. 'size,modified-time'
    #[arg(long, value_name = "OPTIONS")]
    pub display: Option<String>,
}

#[derive(Args)]
pub struct SearchArgs {
    #[command(flatten)]
    pub common: CommonArgs,
}

#[derive(Args)]
pub struct FindArgs {
    #[command(flatten)]
    pub search: SearchArgs,

    /// Report files, directories, or both
    #[arg(long, value_enum, value_name = "KIND", default_value = "files")]
    pub target: SearchTarget,
}

#[derive(Args)]
pub struct TemplateArgs {
    #[command(flatten)]
    pub search: SearchArgs,

    /// Replacement template; supports $1..$n and ${name} back-references
    #[arg(short = 't', long, value_name = "TEMPLATE")]
    pub template: String,
}

#[derive(Args)]
pub struct TransferArgs {
    #[command(flatten)]
    pub search: SearchArgs,

    /// Directory the matches are copied or moved into
    #[arg(long, value_name = "DIR")]
    pub target: PathBuf,

    /// What to do when the destination already exists
    #[arg(long, value_enum, default_value = "ask")]
    pub conflict: ConflictOption,
}

#[derive(Args)]
pub struct DeleteArgs {
    #[command(flatten)]
    pub search: SearchArgs,

    /// Allow deleting directories together with their contents
    #[arg(long)]
    pub recursive: bool,
}

#[derive(Args)]
pub struct SyncArgs {
    #[command(flatten)]
    pub search: SearchArgs,

    /// The second directory of the pair
    #[arg(long, value_name = "DIR")]
    pub right: PathBuf,

    /// Who wins when modification times give no verdict
    #[arg(long, value_enum, default_value = "left-wins")]
    pub conflict: ConflictResolution,

    /// Differences that make two files unequal:
    /// 'attributes,content,modified-time,size' (default: modified-time,size)
    #[arg(long, value_name = "LIST")]
    pub compare: Option<String>,
}

#[derive(Args)]
pub struct EscapeArgs {
    /// Text to escape; read from standard input when omitted
    #[arg(value_name = "TEXT")]
    pub text: Option<String>,
}

#[derive(Args)]
pub struct SplitArgs {
    /// File whose content is split
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Regex to split on, optionally followed by pattern options
    #[arg(short = 'c', long, num_args = 1.., value_name = "PATTERN [OPTION]...")]
    pub content: Vec<String>,

    /// Keep the matched text as fragments of its own
    #[arg(long)]
    pub include_match: bool,

    /// Encoding for files without a byte-order mark (default: utf-8)
    #[arg(long, value_name = "NAME")]
    pub encoding: Option<String>,

    /// Console verbosity
    #[arg(short = 'v', long, value_enum, value_name = "LEVEL", default_value = "normal")]
    pub verbosity: Verbosity,
}

impl CommonArgs {
    /// Freeze the shared flags into the options record the core consumes.
    pub fn to_config(&self, target: SearchTarget) -> Result<Config> {
        let filter = FileSystemFilter {
            name: self.build_filter(self.name.as_deref())?,
            extension: self.build_filter(self.extension.as_deref())?,
            content: self.build_filter(self.content.as_deref())?,
            attributes: match &self.attributes {
                Some(mask) => FileAttributes::parse(mask)?,
                None => FileAttributes::default(),
            },
            attributes_to_skip: match &self.attributes_to_skip {
                Some(mask) => FileAttributes::parse(mask)?,
                None => FileAttributes::default(),
            },
            empty: self.empty,
            properties: self.build_properties()?,
        };

        Ok(Config {
            paths: self.build_paths(),
            filter,
            directory_filter: self.build_filter(self.directory_filter.as_deref())?,
            walk: WalkOptions {
                search_target: target,
                recurse: self.recurse,
                max_depth: self.max_depth,
                follow_symlinks: self.follow,
                default_encoding: parse_encoding(self.encoding.as_deref())?,
            },
            sort: match &self.sort {
                Some(descriptors) => output::parse_sort(descriptors)?,
                None => Vec::new(),
            },
            max_count: self.max_count,
            max_matching_files: self.max_matching_files,
            display: match &self.display {
                Some(options) => DisplayOptions::parse(options)?,
                None => DisplayOptions::default(),
            },
            highlight: self.highlight,
            include_summary: self.include_summary,
            progress: self.progress,
            dry_run: self.dry_run,
            output: self.output.clone(),
        })
    }

    fn build_paths(&self) -> Vec<PathInfo> {
        if self.paths.is_empty() {
            vec![PathInfo {
                path: PathBuf::from("."),
                origin: PathOrigin::CurrentDirectory,
            }]
        } else {
            self.paths
                .iter()
                .map(|path| PathInfo {
                    path: path.clone(),
                    origin: PathOrigin::Argument,
                })
                .collect()
        }
    }

    /// First value is the pattern, the rest are pattern option keywords.
    fn build_filter(&self, values: Option<&[String]>) -> Result<Option<Filter>> {
        let Some(values) = values else {
            return Ok(None);
        };
        let (pattern, options) = values.split_first().ok_or_else(|| Error::OptionParse {
            what: "pattern",
            reason: "missing pattern value".to_owned(),
        })?;

        let mut opts = PatternOptions::parse(options)?;
        if self.ignore_case {
            opts.ignore_case = true;
        } else if self.smart_case && !pattern_has_uppercase_char(pattern) {
            opts.ignore_case = true;
        }
        Filter::new(pattern, &opts).map(Some)
    }

    fn build_properties(&self) -> Result<FilePropertyFilter> {
        let now = SystemTime::now();
        Ok(FilePropertyFilter {
            creation_time: self
                .creation_time
                .as_deref()
                .map(|s| PropertyPredicate::parse_time(&now, s))
                .transpose()?,
            modified_time: self
                .modified_time
                .as_deref()
                .map(|s| PropertyPredicate::parse_time(&now, s))
                .transpose()?,
            size: self
                .size
                .as_deref()
                .map(PropertyPredicate::parse_size)
                .transpose()?,
        })
    }
}

impl SyncArgs {
    pub fn compare_options(&self) -> Result<CompareOptions> {
        match self.compare.as_deref() {
            Some(list) => CompareOptions::parse(list),
            None => Ok(CompareOptions::default()),
        }
    }
}

pub fn parse_encoding(name: Option<&str>) -> Result<&'static Encoding> {
    match name {
        None => Ok(encoding_rs::UTF_8),
        Some(label) => {
            Encoding::for_label(label.as_bytes()).ok_or_else(|| Error::UnknownEnumValue {
                what: "encoding",
                value: label.to_owned(),
            })
        }
    }
}
