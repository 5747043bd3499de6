use std::fs::Metadata;
use std::path::Path;

use encoding_rs::Encoding;

use crate::content;
use crate::error::{Error, Result};
use crate::file_match::FileMatch;
use crate::filesystem;
use crate::filter::attributes::FileAttributes;
use crate::filter::pattern::{Filter, NamePart};
use crate::filter::property::FilePropertyFilter;

/// Whether empty, non-empty or all entries qualify.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum FileEmptyOption {
    #[default]
    Any,
    Empty,
    NonEmpty,
}

/// Conjunction of every per-entry filter. An entry matches when all present
/// sub-filters accept it; checks run in a fixed order and the content filter,
/// last, is the only one that reads file bytes.
#[derive(Debug, Default)]
pub struct FileSystemFilter {
    pub name: Option<Filter>,
    pub extension: Option<Filter>,
    pub content: Option<Filter>,
    pub attributes: FileAttributes,
    pub attributes_to_skip: FileAttributes,
    pub empty: FileEmptyOption,
    pub properties: FilePropertyFilter,
}

impl FileSystemFilter {
    /// Evaluate the filter chain for one entry.
    ///
    /// `Ok(None)` means filtered out; `Err` carries a per-path I/O or
    /// encoding failure that the caller reports and skips.
    pub fn accept(
        &self,
        path: &Path,
        is_directory: bool,
        metadata: &Metadata,
        default_encoding: &'static Encoding,
    ) -> Result<Option<FileMatch>> {
        let need_empty = self.attributes.empty || self.attributes_to_skip.empty;
        if !self.attributes.is_empty() || !self.attributes_to_skip.is_empty() {
            let actual = FileAttributes::of(path, metadata, need_empty);
            if !self.attributes.required_by(&actual) {
                return Ok(None);
            }
            if self.attributes_to_skip.intersects(&actual) {
                return Ok(None);
            }
        }

        let name_match = match &self.name {
            None => None,
            Some(filter) => match filter.evaluate(&name_part_of(path, filter.name_part())) {
                Some(m) => Some(m),
                None => return Ok(None),
            },
        };

        let extension_match = match &self.extension {
            None => None,
            Some(filter) => {
                let extension = path
                    .extension()
                    .map(|e| e.to_string_lossy().into_owned())
                    .unwrap_or_default();
                match filter.evaluate(&extension) {
                    Some(m) => Some(m),
                    None => return Ok(None),
                }
            }
        };

        if !self.accept_properties(path, is_directory, metadata)? {
            return Ok(None);
        }

        match self.empty {
            FileEmptyOption::Any => {}
            FileEmptyOption::Empty => {
                if !filesystem::is_empty(path, metadata) {
                    return Ok(None);
                }
            }
            FileEmptyOption::NonEmpty => {
                if filesystem::is_empty(path, metadata) {
                    return Ok(None);
                }
            }
        }

        let content = match &self.content {
            Some(filter) if !is_directory => {
                let decoded = content::decode_file(path, default_encoding)?;
                match content::evaluate_content(filter, &decoded) {
                    Some(content_match) => Some(content_match),
                    None => return Ok(None),
                }
            }
            _ => None,
        };

        Ok(Some(FileMatch {
            path: path.to_path_buf(),
            is_directory,
            name_match,
            extension_match,
            directory_name_match: None,
            content,
        }))
    }

    fn accept_properties(
        &self,
        path: &Path,
        is_directory: bool,
        metadata: &Metadata,
    ) -> Result<bool> {
        if self.properties.is_empty() {
            return Ok(true);
        }

        if let Some(predicate) = &self.properties.creation_time {
            let created = metadata.created().map_err(|e| Error::io(path, e))?;
            if !predicate.matches(&created) {
                return Ok(false);
            }
        }
        if let Some(predicate) = &self.properties.modified_time {
            let modified = metadata.modified().map_err(|e| Error::io(path, e))?;
            if !predicate.matches(&modified) {
                return Ok(false);
            }
        }
        // Size predicates apply to files; a directory's metadata length says
        // nothing about its content.
        if let Some(predicate) = &self.properties.size {
            if !is_directory && !predicate.matches(&metadata.len()) {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

/// The slice of a path a name filter sees.
fn name_part_of(path: &Path, part: NamePart) -> String {
    match part {
        NamePart::Name => path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
        NamePart::NameWithoutExtension => path
            .file_stem()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
        NamePart::Extension => path
            .extension()
            .map(|e| e.to_string_lossy().into_owned())
            .unwrap_or_default(),
        NamePart::FullName => path.to_string_lossy().into_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::pattern::PatternOptions;
    use encoding_rs::UTF_8;
    use std::fs;

    fn name_filter(pattern: &str) -> Option<Filter> {
        Some(Filter::from_pattern(pattern).unwrap())
    }

    #[test]
    fn conjunction_of_sub_filters() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        fs::write(&path, "hello world").unwrap();
        let metadata = fs::metadata(&path).unwrap();

        let mut filter = FileSystemFilter {
            name: name_filter(r"^notes"),
            extension: name_filter("^txt$"),
            content: name_filter("hello"),
            ..Default::default()
        };

        let accepted = filter
            .accept(&path, false, &metadata, UTF_8)
            .unwrap()
            .expect("all sub-filters pass");
        assert_eq!(accepted.name_match.as_ref().unwrap().value, "notes");
        assert_eq!(accepted.extension_match.as_ref().unwrap().value, "txt");
        assert_eq!(accepted.content.as_ref().unwrap().primary.value, "hello");

        // Any failing sub-filter rejects the entry.
        filter.content = name_filter("absent");
        assert!(filter.accept(&path, false, &metadata, UTF_8).unwrap().is_none());
    }

    #[test]
    fn name_part_scoping() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("archive.tar");
        fs::write(&path, "").unwrap();
        let metadata = fs::metadata(&path).unwrap();

        let opts = PatternOptions {
            name_part: Some(NamePart::NameWithoutExtension),
            ..Default::default()
        };
        let filter = FileSystemFilter {
            name: Some(Filter::new("^archive$", &opts).unwrap()),
            ..Default::default()
        };
        assert!(filter.accept(&path, false, &metadata, UTF_8).unwrap().is_some());

        let opts = PatternOptions {
            name_part: Some(NamePart::Extension),
            ..Default::default()
        };
        let filter = FileSystemFilter {
            name: Some(Filter::new("^archive$", &opts).unwrap()),
            ..Default::default()
        };
        assert!(filter.accept(&path, false, &metadata, UTF_8).unwrap().is_none());
    }

    #[test]
    fn empty_option() {
        let dir = tempfile::tempdir().unwrap();
        let empty = dir.path().join("empty.log");
        let full = dir.path().join("full.log");
        fs::write(&empty, "").unwrap();
        fs::write(&full, "data").unwrap();

        let filter = FileSystemFilter {
            empty: FileEmptyOption::Empty,
            ..Default::default()
        };
        assert!(filter
            .accept(&empty, false, &fs::metadata(&empty).unwrap(), UTF_8)
            .unwrap()
            .is_some());
        assert!(filter
            .accept(&full, false, &fs::metadata(&full).unwrap(), UTF_8)
            .unwrap()
            .is_none());
    }

    #[test]
    fn skip_attributes_reject() {
        let dir = tempfile::tempdir().unwrap();
        let hidden = dir.path().join(".secret");
        fs::write(&hidden, "x").unwrap();

        let filter = FileSystemFilter {
            attributes_to_skip: FileAttributes::parse("hidden").unwrap(),
            ..Default::default()
        };
        assert!(filter
            .accept(&hidden, false, &fs::metadata(&hidden).unwrap(), UTF_8)
            .unwrap()
            .is_none());
    }

    #[test]
    fn size_predicate_ignores_directories() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("sub");
        fs::create_dir(&sub).unwrap();

        let filter = FileSystemFilter {
            properties: FilePropertyFilter {
                size: Some(crate::filter::property::PropertyPredicate::parse_size("=12345").unwrap()),
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(filter
            .accept(&sub, true, &fs::metadata(&sub).unwrap(), UTF_8)
            .unwrap()
            .is_some());
    }
}
