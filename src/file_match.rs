use std::cell::OnceCell;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use encoding_rs::Encoding;

use crate::filter::pattern::PatternMatch;

/// Decoded content of a file together with its primary content match.
#[derive(Debug, Clone)]
pub struct ContentMatch {
    pub text: String,
    pub encoding: &'static Encoding,
    pub had_bom: bool,
    pub primary: PatternMatch,
}

/// The record of a single filesystem item that passed all active filters.
///
/// A directory never carries a content match.
#[derive(Debug, Clone)]
pub struct FileMatch {
    pub path: PathBuf,
    pub is_directory: bool,
    pub name_match: Option<PatternMatch>,
    pub extension_match: Option<PatternMatch>,
    pub directory_name_match: Option<PatternMatch>,
    pub content: Option<ContentMatch>,
}

impl FileMatch {
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// A `FileMatch` together with the base directory it was discovered under.
/// The size is evaluated lazily and at most once.
#[derive(Debug)]
pub struct SearchResult {
    pub base: PathBuf,
    pub file_match: FileMatch,
    size: OnceCell<u64>,
}

impl SearchResult {
    pub fn new(base: PathBuf, file_match: FileMatch) -> Self {
        SearchResult {
            base,
            file_match,
            size: OnceCell::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.file_match.path
    }

    /// Path relative to the base directory it was found under.
    pub fn relative_path(&self) -> &Path {
        self.file_match
            .path
            .strip_prefix(&self.base)
            .unwrap_or(&self.file_match.path)
    }

    /// Size in bytes; directory sizes are computed recursively and memoized
    /// in the shared map.
    pub fn size(&self, sizes: &mut DirectorySizeMap) -> u64 {
        *self.size.get_or_init(|| {
            if self.file_match.is_directory {
                sizes.size_of(&self.file_match.path)
            } else {
                fs::metadata(&self.file_match.path)
                    .map(|m| m.len())
                    .unwrap_or(0)
            }
        })
    }
}

/// Recursive directory sizes, cached on first observation.
#[derive(Debug, Default)]
pub struct DirectorySizeMap {
    sizes: HashMap<PathBuf, u64>,
}

impl DirectorySizeMap {
    pub fn size_of(&mut self, dir: &Path) -> u64 {
        if let Some(size) = self.sizes.get(dir) {
            return *size;
        }
        let size = compute_dir_size(dir);
        self.sizes.insert(dir.to_path_buf(), size);
        size
    }
}

fn compute_dir_size(dir: &Path) -> u64 {
    let mut total = 0;
    let mut stack = vec![dir.to_path_buf()];
    while let Some(current) = stack.pop() {
        let entries = match fs::read_dir(&current) {
            Ok(entries) => entries,
            Err(_) => continue,
        };
        for entry in entries.flatten() {
            let Ok(file_type) = entry.file_type() else {
                continue;
            };
            if file_type.is_dir() {
                stack.push(entry.path());
            } else if file_type.is_file() {
                total += entry.metadata().map(|m| m.len()).unwrap_or(0);
            }
        }
    }
    total
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain_match(base: &Path, path: PathBuf, is_directory: bool) -> SearchResult {
        SearchResult::new(
            base.to_path_buf(),
            FileMatch {
                path,
                is_directory,
                name_match: None,
                extension_match: None,
                directory_name_match: None,
                content: None,
            },
        )
    }

    #[test]
    fn relative_path_strips_base() {
        let base = Path::new("/data");
        let result = plain_match(base, PathBuf::from("/data/sub/a.txt"), false);
        assert_eq!(result.relative_path(), Path::new("sub/a.txt"));
    }

    #[test]
    fn directory_sizes_are_recursive_and_cached() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("a"), b"12345").unwrap();
        fs::write(dir.path().join("sub/b"), b"123").unwrap();

        let mut sizes = DirectorySizeMap::default();
        assert_eq!(sizes.size_of(dir.path()), 8);

        // Cached: removing a file does not change the recorded size.
        fs::remove_file(dir.path().join("a")).unwrap();
        assert_eq!(sizes.size_of(dir.path()), 8);
    }

    #[test]
    fn result_size_is_lazy_and_stable() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("f");
        fs::write(&file, b"abcd").unwrap();

        let result = plain_match(dir.path(), file.clone(), false);
        let mut sizes = DirectorySizeMap::default();
        assert_eq!(result.size(&mut sizes), 4);

        fs::write(&file, b"abcdefgh").unwrap();
        assert_eq!(result.size(&mut sizes), 4);
    }
}
