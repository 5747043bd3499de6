use regex::{Regex, RegexBuilder};

use crate::error::{Error, Result};

/// The slice of a path a name filter is evaluated against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NamePart {
    #[default]
    Name,
    NameWithoutExtension,
    Extension,
    FullName,
}

impl NamePart {
    fn from_keyword(s: &str) -> Option<Self> {
        match s {
            "name" => Some(NamePart::Name),
            "name-without-extension" | "stem" => Some(NamePart::NameWithoutExtension),
            "extension" | "ext" => Some(NamePart::Extension),
            "full-name" | "full" => Some(NamePart::FullName),
            _ => None,
        }
    }
}

/// An owned snapshot of a regex match (or of one capture group of it).
///
/// Passing a filter by negation yields a synthetic empty match, so downstream
/// code can tell "passed without evaluation" from "did not pass".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternMatch {
    pub start: usize,
    pub end: usize,
    pub value: String,
}

impl PatternMatch {
    pub fn empty() -> Self {
        PatternMatch {
            start: 0,
            end: 0,
            value: String::new(),
        }
    }

    pub fn from_match(m: regex::Match) -> Self {
        PatternMatch {
            start: m.start(),
            end: m.end(),
            value: m.as_str().to_owned(),
        }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// A compiled pattern: regex, optional capture group, optional negation,
/// plus the name part it applies to when used as a name filter.
#[derive(Debug, Clone)]
pub struct Filter {
    regex: Regex,
    group_index: Option<usize>,
    negate: bool,
    name_part: NamePart,
    right_to_left: bool,
}

/// Pattern option keywords accepted after the regex itself.
///
/// `ecma-script`, `explicit-capture`, `culture-invariant` and `compiled` are
/// engine hints without a counterpart in the `regex` crate and are accepted
/// as no-ops. `right-to-left` flips which content match counts as primary.
#[derive(Debug, Clone, Default)]
pub struct PatternOptions {
    pub ignore_case: bool,
    pub multiline: bool,
    pub singleline: bool,
    pub negate: bool,
    pub right_to_left: bool,
    pub group: Option<String>,
    pub name_part: Option<NamePart>,
}

impl PatternOptions {
    /// Parse the option keywords that follow a pattern on the command line,
    /// e.g. `-n "^rel" i ne part=extension`.
    pub fn parse(words: &[String]) -> Result<Self> {
        let mut opts = PatternOptions::default();
        for word in words {
            match word.as_str() {
                "i" | "ignore-case" => opts.ignore_case = true,
                "m" | "multiline" => opts.multiline = true,
                "s" | "singleline" => opts.singleline = true,
                "ne" | "negate" => opts.negate = true,
                "rtl" | "right-to-left" => opts.right_to_left = true,
                "ecma-script" | "explicit-capture" | "culture-invariant" | "compiled" => {}
                other => {
                    if let Some(group) = other.strip_prefix("group=") {
                        opts.group = Some(group.to_owned());
                    } else if let Some(part) = other.strip_prefix("part=") {
                        opts.name_part = Some(NamePart::from_keyword(part).ok_or_else(|| {
                            Error::UnknownEnumValue {
                                what: "name part",
                                value: part.to_owned(),
                            }
                        })?);
                    } else {
                        return Err(Error::UnknownEnumValue {
                            what: "pattern option",
                            value: other.to_owned(),
                        });
                    }
                }
            }
        }
        Ok(opts)
    }
}

impl Filter {
    pub fn new(pattern: &str, opts: &PatternOptions) -> Result<Self> {
        let regex = RegexBuilder::new(pattern)
            .case_insensitive(opts.ignore_case)
            .multi_line(opts.multiline)
            .dot_matches_new_line(opts.singleline)
            .build()?;

        let group_index = match &opts.group {
            None => None,
            Some(name) => Some(resolve_group(&regex, name)?),
        };

        Ok(Filter {
            regex,
            group_index,
            negate: opts.negate,
            name_part: opts.name_part.unwrap_or_default(),
            right_to_left: opts.right_to_left,
        })
    }

    /// Convenience constructor for a plain, positive filter.
    pub fn from_pattern(pattern: &str) -> Result<Self> {
        Filter::new(pattern, &PatternOptions::default())
    }

    pub fn regex(&self) -> &Regex {
        &self.regex
    }

    pub fn name_part(&self) -> NamePart {
        self.name_part
    }

    pub fn is_negative(&self) -> bool {
        self.negate
    }

    pub fn group_index(&self) -> Option<usize> {
        self.group_index
    }

    pub fn right_to_left(&self) -> bool {
        self.right_to_left
    }

    /// Evaluate the filter against `input`.
    ///
    /// For group-scoped filters the returned match is the group itself; a
    /// group that did not participate in the overall match counts as a
    /// non-match. Negation inverts the result and substitutes a synthetic
    /// empty match on success.
    pub fn evaluate(&self, input: &str) -> Option<PatternMatch> {
        let found = match self.group_index {
            None => self.regex.find(input).map(PatternMatch::from_match),
            Some(idx) => self
                .regex
                .captures(input)
                .and_then(|caps| caps.get(idx))
                .map(PatternMatch::from_match),
        };

        match (self.negate, found) {
            (false, found) => found,
            (true, Some(_)) => None,
            (true, None) => Some(PatternMatch::empty()),
        }
    }

    /// Whether `input` passes the filter, without materializing the match.
    pub fn is_match(&self, input: &str) -> bool {
        self.evaluate(input).is_some()
    }

    /// All matches of the underlying regex, group-scoped if configured.
    /// Negation does not apply here; an inverted filter has no positions to
    /// enumerate.
    pub fn matches(&self, input: &str) -> Vec<PatternMatch> {
        match self.group_index {
            None => self
                .regex
                .find_iter(input)
                .map(PatternMatch::from_match)
                .collect(),
            Some(idx) => self
                .regex
                .captures_iter(input)
                .filter_map(|caps| caps.get(idx))
                .map(PatternMatch::from_match)
                .collect(),
        }
    }

    /// The primary content match: the first one, or the last one for a
    /// right-to-left pattern.
    pub fn primary_match(&self, input: &str) -> Option<PatternMatch> {
        if self.right_to_left {
            self.matches(input).into_iter().next_back()
        } else {
            match self.group_index {
                None => self.regex.find(input).map(PatternMatch::from_match),
                Some(idx) => self
                    .regex
                    .captures(input)
                    .and_then(|caps| caps.get(idx))
                    .map(PatternMatch::from_match),
            }
        }
    }
}

/// Resolve a group reference, either a number or a name, to its index.
fn resolve_group(regex: &Regex, group: &str) -> Result<usize> {
    if let Ok(index) = group.parse::<usize>() {
        if index < regex.captures_len() {
            return Ok(index);
        }
    } else if let Some(index) = regex
        .capture_names()
        .position(|name| name == Some(group))
    {
        return Ok(index);
    }

    Err(Error::UnknownEnumValue {
        what: "capture group",
        value: group.to_owned(),
    })
}

/// Determine if a regex pattern contains a literal uppercase character, for
/// smart-case handling of name patterns.
pub fn pattern_has_uppercase_char(pattern: &str) -> bool {
    use regex_syntax::hir::{Class, Hir, HirKind};

    fn hir_has_uppercase_char(hir: &Hir) -> bool {
        match hir.kind() {
            HirKind::Literal(literal) => std::str::from_utf8(&literal.0)
                .map(|s| s.chars().any(|c| c.is_uppercase()))
                .unwrap_or(false),
            HirKind::Class(Class::Unicode(ranges)) => ranges
                .iter()
                .any(|r| r.start().is_uppercase() || r.end().is_uppercase()),
            HirKind::Class(Class::Bytes(ranges)) => ranges
                .iter()
                .any(|r| char::from(r.start()).is_uppercase() || char::from(r.end()).is_uppercase()),
            HirKind::Capture(capture) => hir_has_uppercase_char(&capture.sub),
            HirKind::Repetition(repetition) => hir_has_uppercase_char(&repetition.sub),
            HirKind::Concat(hirs) | HirKind::Alternation(hirs) => {
                hirs.iter().any(hir_has_uppercase_char)
            }
            _ => false,
        }
    }

    regex_syntax::ParserBuilder::new()
        .utf8(false)
        .build()
        .parse(pattern)
        .map(|hir| hir_has_uppercase_char(&hir))
        .unwrap_or(false)
}
