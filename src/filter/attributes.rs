use std::fs::Metadata;
use std::path::Path;

use crate::error::{Error, Result};
use crate::filesystem;

/// A set of filesystem attributes, used both as the observed attributes of an
/// entry and as a require/skip mask over them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FileAttributes {
    pub directory: bool,
    pub file: bool,
    pub symlink: bool,
    pub hidden: bool,
    pub read_only: bool,
    pub empty: bool,
}

impl FileAttributes {
    /// Parse a comma-separated attribute mask, e.g. `hidden,read-only`.
    pub fn parse(s: &str) -> Result<Self> {
        let mut attrs = FileAttributes::default();
        for word in s.split(',').map(str::trim).filter(|w| !w.is_empty()) {
            match word {
                "d" | "dir" | "directory" => attrs.directory = true,
                "f" | "file" => attrs.file = true,
                "l" | "symlink" | "reparse-point" => attrs.symlink = true,
                "h" | "hidden" => attrs.hidden = true,
                "r" | "read-only" => attrs.read_only = true,
                "e" | "empty" => attrs.empty = true,
                other => {
                    return Err(Error::UnknownEnumValue {
                        what: "attribute",
                        value: other.to_owned(),
                    })
                }
            }
        }
        Ok(attrs)
    }

    /// Observed attributes of an entry. `need_empty` guards the extra
    /// directory read that emptiness detection costs.
    pub fn of(path: &Path, metadata: &Metadata, need_empty: bool) -> Self {
        let file_type = metadata.file_type();
        FileAttributes {
            directory: file_type.is_dir(),
            file: file_type.is_file(),
            symlink: file_type.is_symlink(),
            hidden: filesystem::is_hidden(path, metadata),
            read_only: metadata.permissions().readonly(),
            empty: need_empty && filesystem::is_empty(path, metadata),
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == FileAttributes::default()
    }

    /// Every attribute set in `self` must also be set in `actual`.
    pub fn required_by(&self, actual: &FileAttributes) -> bool {
        (!self.directory || actual.directory)
            && (!self.file || actual.file)
            && (!self.symlink || actual.symlink)
            && (!self.hidden || actual.hidden)
            && (!self.read_only || actual.read_only)
            && (!self.empty || actual.empty)
    }

    /// At least one attribute set in `self` is also set in `actual`.
    pub fn intersects(&self, actual: &FileAttributes) -> bool {
        (self.directory && actual.directory)
            || (self.file && actual.file)
            || (self.symlink && actual.symlink)
            || (self.hidden && actual.hidden)
            || (self.read_only && actual.read_only)
            || (self.empty && actual.empty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_mask() {
        let attrs = FileAttributes::parse("hidden,read-only").unwrap();
        assert!(attrs.hidden && attrs.read_only);
        assert!(!attrs.directory && !attrs.file && !attrs.symlink && !attrs.empty);

        let attrs = FileAttributes::parse("d, e").unwrap();
        assert!(attrs.directory && attrs.empty);

        assert!(FileAttributes::parse("sticky").is_err());
        assert!(FileAttributes::parse("").unwrap().is_empty());
    }

    #[test]
    fn require_and_skip_semantics() {
        let actual = FileAttributes {
            file: true,
            hidden: true,
            ..Default::default()
        };

        let require = FileAttributes::parse("hidden").unwrap();
        assert!(require.required_by(&actual));

        let require = FileAttributes::parse("hidden,read-only").unwrap();
        assert!(!require.required_by(&actual));

        let skip = FileAttributes::parse("read-only,hidden").unwrap();
        assert!(skip.intersects(&actual));

        let skip = FileAttributes::parse("read-only").unwrap();
        assert!(!skip.intersects(&actual));

        // An empty mask requires nothing and skips nothing.
        let none = FileAttributes::default();
        assert!(none.required_by(&actual));
        assert!(!none.intersects(&actual));
    }
}
