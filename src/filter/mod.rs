pub use self::attributes::FileAttributes;
pub use self::fs_filter::{FileEmptyOption, FileSystemFilter};
pub use self::pattern::{Filter, NamePart, PatternMatch, PatternOptions};
pub use self::property::{ComparisonOp, FilePropertyFilter, PropertyPredicate};

pub mod attributes;
pub mod fs_filter;
pub mod pattern;
pub mod property;
