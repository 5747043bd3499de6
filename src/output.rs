use std::cmp::Ordering;
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, IsTerminal, Write};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Local};
use nu_ansi_term::Color;

use crate::context::Telemetry;
use crate::error::{Error, Result};
use crate::exit_codes::ExitCode;
use crate::file_match::{DirectorySizeMap, SearchResult};

/// One sort criterion from `--sort`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    Name,
    CreationTime,
    ModifiedTime,
    Size,
    Match,
    Length,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortDescriptor {
    pub key: SortKey,
    pub descending: bool,
}

/// Parse a descriptor list such as `name` or `size:desc,modified-time`.
pub fn parse_sort(s: &str) -> Result<Vec<SortDescriptor>> {
    let mut descriptors = Vec::new();
    for part in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let (key, direction) = match part.split_once(':') {
            Some((key, direction)) => (key, Some(direction)),
            None => (part, None),
        };
        let key = match key {
            "n" | "name" => SortKey::Name,
            "c" | "creation-time" => SortKey::CreationTime,
            "m" | "modified-time" => SortKey::ModifiedTime,
            "s" | "size" => SortKey::Size,
            "match" => SortKey::Match,
            "length" => SortKey::Length,
            other => {
                return Err(Error::UnknownEnumValue {
                    what: "sort key",
                    value: other.to_owned(),
                })
            }
        };
        let descending = match direction {
            None | Some("asc") => false,
            Some("desc") => true,
            Some(other) => {
                return Err(Error::UnknownEnumValue {
                    what: "sort direction",
                    value: other.to_owned(),
                })
            }
        };
        descriptors.push(SortDescriptor { key, descending });
    }
    Ok(descriptors)
}

fn modified_of(result: &SearchResult) -> SystemTime {
    std::fs::metadata(result.path())
        .and_then(|m| m.modified())
        .unwrap_or(UNIX_EPOCH)
}

fn created_of(result: &SearchResult) -> SystemTime {
    std::fs::metadata(result.path())
        .and_then(|m| m.created())
        .unwrap_or(UNIX_EPOCH)
}

fn match_value_of(result: &SearchResult) -> String {
    result
        .file_match
        .content
        .as_ref()
        .map(|c| c.primary.value.clone())
        .or_else(|| result.file_match.name_match.as_ref().map(|m| m.value.clone()))
        .unwrap_or_default()
}

/// Order buffered results by the declared descriptor list; later descriptors
/// break ties of earlier ones.
pub fn sort_results(
    results: &mut [SearchResult],
    descriptors: &[SortDescriptor],
    sizes: &mut DirectorySizeMap,
) {
    results.sort_by(|a, b| {
        for descriptor in descriptors {
            let ordering = match descriptor.key {
                SortKey::Name => a.path().cmp(b.path()),
                SortKey::CreationTime => created_of(a).cmp(&created_of(b)),
                SortKey::ModifiedTime => modified_of(a).cmp(&modified_of(b)),
                SortKey::Size => a.size(sizes).cmp(&b.size(sizes)),
                SortKey::Match => match_value_of(a).cmp(&match_value_of(b)),
                SortKey::Length => a
                    .relative_path()
                    .as_os_str()
                    .len()
                    .cmp(&b.relative_path().as_os_str().len()),
            };
            let ordering = if descriptor.descending {
                ordering.reverse()
            } else {
                ordering
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    });
}

/// File-property columns requested through `--display`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DisplayOptions {
    pub size: bool,
    pub creation_time: bool,
    pub modified_time: bool,
}

impl DisplayOptions {
    pub fn parse(s: &str) -> Result<Self> {
        let mut display = DisplayOptions::default();
        for word in s.split(',').map(str::trim).filter(|w| !w.is_empty()) {
            match word {
                "s" | "size" => display.size = true,
                "c" | "creation-time" => display.creation_time = true,
                "m" | "modified-time" => display.modified_time = true,
                other => {
                    return Err(Error::UnknownEnumValue {
                        what: "display option",
                        value: other.to_owned(),
                    })
                }
            }
        }
        Ok(display)
    }

    pub fn any_property(&self) -> bool {
        self.size || self.creation_time || self.modified_time
    }
}

/// Which part of a result line gets highlighted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum HighlightMode {
    None,
    #[default]
    Match,
    Replacement,
}

/// Column widths computed over a buffered result set, for aligned output.
#[derive(Debug, Clone, Copy, Default)]
pub struct ColumnWidths {
    pub path: usize,
    pub size: usize,
}

pub fn compute_columns(results: &[SearchResult], sizes: &mut DirectorySizeMap) -> ColumnWidths {
    let mut widths = ColumnWidths::default();
    for result in results {
        let path_len = result.relative_path().to_string_lossy().chars().count();
        widths.path = widths.path.max(path_len);
        let size_len = result.size(sizes).to_string().len();
        widths.size = widths.size.max(size_len);
    }
    widths
}

/// Prefix for a side-effecting result line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpLabel {
    Add,
    Update,
    Delete,
    Rename,
}

impl OpLabel {
    fn as_str(self) -> &'static str {
        match self {
            OpLabel::Add => "ADD",
            OpLabel::Update => "UPD",
            OpLabel::Delete => "DEL",
            OpLabel::Rename => "REN",
        }
    }

    fn color(self) -> Color {
        match self {
            OpLabel::Add => Color::Green,
            OpLabel::Update => Color::Cyan,
            OpLabel::Delete => Color::Red,
            OpLabel::Rename => Color::Yellow,
        }
    }
}

/// Duplicate of the console stream, directed into a file by `--output`.
pub struct OutputFile {
    writer: BufWriter<File>,
}

impl OutputFile {
    /// Parse `FILE[,VERBOSITY[,ENCODING[,append]]]`. Verbosity and encoding
    /// beyond UTF-8 apply to the file copy only and are accepted for
    /// compatibility.
    pub fn parse(spec: &str) -> Result<Self> {
        let mut parts = spec.split(',').map(str::trim);
        let path = parts.next().filter(|p| !p.is_empty()).ok_or_else(|| {
            Error::OptionParse {
                what: "output file",
                reason: "missing file name".to_owned(),
            }
        })?;
        let rest: Vec<&str> = parts.collect();
        let append = rest.iter().any(|p| *p == "append");

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .append(append)
            .truncate(!append)
            .open(path)
            .map_err(|e| Error::io(path, e))?;
        Ok(OutputFile {
            writer: BufWriter::new(file),
        })
    }

    fn write_line(&mut self, line: &str) {
        let _ = writeln!(self.writer, "{line}");
    }
}

impl Drop for OutputFile {
    fn drop(&mut self) {
        let _ = self.writer.flush();
    }
}

/// Emits result lines. Owned by the operation executors; all user-facing
/// output funnels through here so color, columns and the optional output
/// file stay consistent.
pub struct Printer {
    pub color: bool,
    pub highlight: HighlightMode,
    pub display: DisplayOptions,
    pub columns: Option<ColumnWidths>,
    pub output_file: Option<OutputFile>,
}

impl Printer {
    pub fn new(highlight: HighlightMode, display: DisplayOptions) -> Self {
        Printer {
            color: io::stdout().is_terminal() && std::env::var_os("NO_COLOR").is_none(),
            highlight,
            display,
            columns: None,
            output_file: None,
        }
    }

    /// Print one result line: optional label, relative path with the name
    /// match highlighted, then any requested property columns.
    pub fn print_result(
        &mut self,
        result: &SearchResult,
        label: Option<OpLabel>,
        sizes: &mut DirectorySizeMap,
    ) {
        let rel = crate::filesystem::strip_current_dir(result.relative_path())
            .to_string_lossy()
            .into_owned();
        let mut line = String::new();
        let mut plain = String::new();

        if let Some(label) = label {
            if self.color {
                line.push_str(&label.color().paint(label.as_str()).to_string());
            } else {
                line.push_str(label.as_str());
            }
            line.push(' ');
            plain.push_str(label.as_str());
            plain.push(' ');
        }

        line.push_str(&self.highlighted_path(result, &rel));
        plain.push_str(&rel);

        if self.display.any_property() {
            let pad = self
                .columns
                .map(|c| c.path.saturating_sub(rel.chars().count()))
                .unwrap_or(0);
            for column in self.property_columns(result, sizes) {
                let cell = format!("{:pad$}  {column}", "", pad = pad);
                line.push_str(&cell);
                plain.push_str(&cell);
            }
        }

        self.emit(&line, &plain);
    }

    /// Print one content match value (the `match` verb's line format).
    pub fn print_match_value(&mut self, value: &str) {
        let line = if self.color && self.highlight == HighlightMode::Match {
            Color::Red.bold().paint(value).to_string()
        } else {
            value.to_owned()
        };
        self.emit(&line, value);
    }

    /// Print one labeled path line (sync's ADD/UPD/DEL records).
    pub fn print_path(&mut self, label: OpLabel, path: &Path) {
        let plain = format!("{} {}", label.as_str(), path.display());
        let line = if self.color {
            format!("{} {}", label.color().paint(label.as_str()), path.display())
        } else {
            plain.clone()
        };
        self.emit(&line, &plain);
    }

    /// Print an old → new transition (rename, copy and move destinations).
    pub fn print_transition(&mut self, label: OpLabel, from: &Path, to: &Path) {
        let plain = format!("{} {} -> {}", label.as_str(), from.display(), to.display());
        let line = if self.color {
            format!(
                "{} {} -> {}",
                label.color().paint(label.as_str()),
                from.display(),
                to.display()
            )
        } else {
            plain.clone()
        };
        self.emit(&line, &plain);
    }

    pub fn print_summary(&mut self, telemetry: &Telemetry) {
        let text = telemetry.to_string();
        for line in text.lines() {
            self.emit(line, line);
        }
    }

    fn emit(&mut self, line: &str, plain: &str) {
        let mut stdout = io::stdout().lock();
        if writeln!(stdout, "{line}").is_err() {
            // Broken pipe; whoever is reading has seen enough.
            ExitCode::Success.exit();
        }
        if let Some(output_file) = self.output_file.as_mut() {
            output_file.write_line(plain);
        }
    }

    fn highlighted_path(&self, result: &SearchResult, rel: &str) -> String {
        if !self.color || self.highlight != HighlightMode::Match {
            return rel.to_owned();
        }
        let Some(name_match) = result.file_match.name_match.as_ref() else {
            return rel.to_owned();
        };
        if name_match.is_empty() {
            return rel.to_owned();
        }
        // The offsets are relative to the name part the filter was scoped
        // to; only spans that fit inside the file name can be mapped onto
        // the displayed path.
        let name = result.file_match.file_name();
        if name_match.end > name.len() {
            return rel.to_owned();
        }
        let Some(name_offset) = rel.len().checked_sub(name.len()) else {
            return rel.to_owned();
        };
        let start = name_offset + name_match.start;
        let end = name_offset + name_match.end;
        if end > rel.len() || !rel.is_char_boundary(start) || !rel.is_char_boundary(end) {
            return rel.to_owned();
        }
        format!(
            "{}{}{}",
            &rel[..start],
            Color::Red.bold().paint(&rel[start..end]),
            &rel[end..]
        )
    }

    fn property_columns(
        &self,
        result: &SearchResult,
        sizes: &mut DirectorySizeMap,
    ) -> Vec<String> {
        let mut columns = Vec::new();
        if self.display.size {
            let width = self.columns.map(|c| c.size).unwrap_or(0);
            columns.push(format!("{:>width$}", result.size(sizes), width = width));
        }
        if self.display.creation_time {
            columns.push(format_time(created_of(result)));
        }
        if self.display.modified_time {
            columns.push(format_time(modified_of(result)));
        }
        columns
    }
}

fn format_time(time: SystemTime) -> String {
    let local: DateTime<Local> = time.into();
    local.format("%Y-%m-%d %H:%M:%S").to_string()
}
