use std::time::SystemTime;

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{Error, Result};

static SIZE_CAPTURES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(<=|>=|<|>|=?)\s*(\d+)\s*(b|[kmgt]i?b?)?$").unwrap());

static TIME_CAPTURES: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(<=|>=|<|>|=?)\s*(.+)$").unwrap());

// SI prefixes (powers of 10)
const KILO: u64 = 1000;
const MEGA: u64 = KILO * 1000;
const GIGA: u64 = MEGA * 1000;
const TERA: u64 = GIGA * 1000;

// Binary prefixes (powers of 2)
const KIBI: u64 = 1024;
const MEBI: u64 = KIBI * 1024;
const GIBI: u64 = MEBI * 1024;
const TEBI: u64 = GIBI * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonOp {
    Lt,
    Le,
    Eq,
    Ge,
    Gt,
}

impl ComparisonOp {
    fn from_str(s: &str) -> Self {
        match s {
            "<" => ComparisonOp::Lt,
            "<=" => ComparisonOp::Le,
            ">=" => ComparisonOp::Ge,
            ">" => ComparisonOp::Gt,
            _ => ComparisonOp::Eq,
        }
    }
}

/// A single comparison of an observed property value against a literal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PropertyPredicate<T> {
    pub op: ComparisonOp,
    pub value: T,
}

impl<T: PartialOrd> PropertyPredicate<T> {
    pub fn new(op: ComparisonOp, value: T) -> Self {
        PropertyPredicate { op, value }
    }

    pub fn matches(&self, actual: &T) -> bool {
        match self.op {
            ComparisonOp::Lt => *actual < self.value,
            ComparisonOp::Le => *actual <= self.value,
            ComparisonOp::Eq => *actual == self.value,
            ComparisonOp::Ge => *actual >= self.value,
            ComparisonOp::Gt => *actual > self.value,
        }
    }
}

impl PropertyPredicate<u64> {
    /// Parse a size comparison such as `>=10mb`, `<1ki` or `=0`.
    pub fn parse_size(s: &str) -> Result<Self> {
        let invalid = || Error::OptionParse {
            what: "size predicate",
            reason: format!("'{s}' is not of the form OP NUMBER[UNIT]"),
        };

        let captures = SIZE_CAPTURES.captures(s).ok_or_else(invalid)?;
        let op = ComparisonOp::from_str(captures.get(1).map_or("", |m| m.as_str()));
        let quantity = captures
            .get(2)
            .and_then(|v| v.as_str().parse::<u64>().ok())
            .ok_or_else(invalid)?;

        let multiplier = match &captures.get(3).map_or("b", |m| m.as_str()).to_lowercase()[..] {
            v if v.starts_with("ki") => KIBI,
            v if v.starts_with('k') => KILO,
            v if v.starts_with("mi") => MEBI,
            v if v.starts_with('m') => MEGA,
            v if v.starts_with("gi") => GIBI,
            v if v.starts_with('g') => GIGA,
            v if v.starts_with("ti") => TEBI,
            v if v.starts_with('t') => TERA,
            "b" => 1,
            _ => return Err(invalid()),
        };

        Ok(PropertyPredicate::new(op, quantity * multiplier))
    }
}

impl PropertyPredicate<SystemTime> {
    /// Parse a time comparison such as `>2024-01-01`, `<=2024-01-01 10:30:00`
    /// or `>1h` (a duration back from `ref_time`).
    pub fn parse_time(ref_time: &SystemTime, s: &str) -> Result<Self> {
        let invalid = || Error::OptionParse {
            what: "time predicate",
            reason: format!("'{s}' is not of the form OP DATE|DURATION"),
        };

        let captures = TIME_CAPTURES.captures(s.trim()).ok_or_else(invalid)?;
        let op = ComparisonOp::from_str(captures.get(1).map_or("", |m| m.as_str()));
        let literal = captures.get(2).map_or("", |m| m.as_str()).trim();

        let time = parse_point_in_time(ref_time, literal).ok_or_else(invalid)?;
        Ok(PropertyPredicate::new(op, time))
    }
}

fn parse_point_in_time(ref_time: &SystemTime, s: &str) -> Option<SystemTime> {
    humantime::parse_duration(s)
        .map(|duration| *ref_time - duration)
        .ok()
        .or_else(|| {
            DateTime::parse_from_rfc3339(s)
                .map(|dt| dt.into())
                .ok()
                .or_else(|| {
                    NaiveDate::parse_from_str(s, "%F")
                        .ok()?
                        .and_hms_opt(0, 0, 0)?
                        .and_local_timezone(Local)
                        .latest()
                })
                .or_else(|| {
                    NaiveDateTime::parse_from_str(s, "%F %T")
                        .ok()?
                        .and_local_timezone(Local)
                        .latest()
                })
                .map(|dt| dt.into())
        })
}

/// Optional predicates over a file's creation time, modification time and
/// size. A file passes when every present predicate passes.
#[derive(Debug, Clone, Default)]
pub struct FilePropertyFilter {
    pub creation_time: Option<PropertyPredicate<SystemTime>>,
    pub modified_time: Option<PropertyPredicate<SystemTime>>,
    pub size: Option<PropertyPredicate<u64>>,
}

impl FilePropertyFilter {
    pub fn is_empty(&self) -> bool {
        self.creation_time.is_none() && self.modified_time.is_none() && self.size.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use test_case::test_case;

    #[test_case("<1k", ComparisonOp::Lt, 1000; "less than kilo")]
    #[test_case("<=1ki", ComparisonOp::Le, 1024; "le kibi")]
    #[test_case("=0", ComparisonOp::Eq, 0; "equals zero bytes")]
    #[test_case("10mb", ComparisonOp::Eq, 10_000_000; "bare value is equality")]
    #[test_case(">=1MiB", ComparisonOp::Ge, 1_048_576; "ge mebi upper case")]
    #[test_case(">2gi", ComparisonOp::Gt, 2_147_483_648; "gt gibi")]
    #[test_case("<1tb", ComparisonOp::Lt, 1_000_000_000_000; "lt tera")]
    fn parse_size_ok(input: &str, op: ComparisonOp, value: u64) {
        let p = PropertyPredicate::parse_size(input).unwrap();
        assert_eq!(p.op, op);
        assert_eq!(p.value, value);
    }

    #[test_case(""; "empty")]
    #[test_case(">g"; "missing number")]
    #[test_case("$10M"; "junk prefix")]
    #[test_case(">=1bib"; "invalid unit")]
    #[test_case("=ten"; "non numeric")]
    fn parse_size_err(input: &str) {
        assert!(PropertyPredicate::parse_size(input).is_err());
    }

    #[test]
    fn size_comparisons() {
        let p = PropertyPredicate::parse_size("<=1k").unwrap();
        assert!(p.matches(&999));
        assert!(p.matches(&1000));
        assert!(!p.matches(&1001));

        let p = PropertyPredicate::parse_size(">1k").unwrap();
        assert!(!p.matches(&1000));
        assert!(p.matches(&1001));
    }

    #[test]
    fn time_from_duration_and_date() {
        let ref_time = DateTime::parse_from_rfc3339("2010-10-10T10:10:10+00:00")
            .unwrap()
            .into();

        // "> 1min" means newer than one minute before the reference point.
        let p = PropertyPredicate::parse_time(&ref_time, ">1min").unwrap();
        assert!(p.matches(&ref_time));
        assert!(!p.matches(&(ref_time - Duration::from_secs(120))));

        let p = PropertyPredicate::parse_time(&ref_time, "<2010-10-10T10:10:00+00:00").unwrap();
        assert!(!p.matches(&ref_time));
        assert!(p.matches(&(ref_time - Duration::from_secs(60))));
    }

    #[test]
    fn time_rejects_garbage() {
        let now = SystemTime::now();
        assert!(PropertyPredicate::parse_time(&now, ">yesterdayish").is_err());
        assert!(PropertyPredicate::parse_time(&now, "").is_err());
    }

    #[test]
    fn property_filter_emptiness() {
        let mut f = FilePropertyFilter::default();
        assert!(f.is_empty());
        f.size = Some(PropertyPredicate::parse_size(">0").unwrap());
        assert!(!f.is_empty());
    }
}
