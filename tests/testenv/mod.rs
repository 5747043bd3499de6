//! Shared environment for the integration tests: a temporary directory tree
//! built from declarative lists, with helpers for timestamps and snapshots.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use filetime::FileTime;
use tempfile::TempDir;

pub struct TestEnv {
    temp_dir: TempDir,
}

impl TestEnv {
    /// Create the working directory with the given subdirectories and files
    /// (path, content) under it.
    pub fn new(directories: &[&str], files: &[(&str, &str)]) -> TestEnv {
        let temp_dir = TempDir::new().expect("working directory");
        let root = temp_dir.path();

        for directory in directories {
            fs::create_dir_all(root.join(directory)).expect("test directory");
        }
        for (file, content) in files {
            if let Some(parent) = root.join(file).parent() {
                fs::create_dir_all(parent).expect("parent directory");
            }
            fs::write(root.join(file), content).expect("test file");
        }

        TestEnv { temp_dir }
    }

    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn path(&self, rel: &str) -> PathBuf {
        self.temp_dir.path().join(rel)
    }

    pub fn read(&self, rel: &str) -> String {
        fs::read_to_string(self.path(rel)).expect("readable file")
    }

    pub fn exists(&self, rel: &str) -> bool {
        self.path(rel).symlink_metadata().is_ok()
    }

    /// Pin a file's modification time (seconds since the epoch).
    pub fn set_mtime(&self, rel: &str, unix_seconds: i64) {
        filetime::set_file_mtime(self.path(rel), FileTime::from_unix_time(unix_seconds, 0))
            .expect("set mtime");
    }

    /// Byte-level snapshot of the whole tree; directories map to `None`.
    /// Two identical snapshots mean the tree did not change.
    pub fn snapshot(&self) -> BTreeMap<PathBuf, Option<Vec<u8>>> {
        let mut entries = BTreeMap::new();
        let mut stack = vec![self.temp_dir.path().to_path_buf()];
        while let Some(dir) = stack.pop() {
            for entry in fs::read_dir(&dir).expect("readable directory") {
                let entry = entry.expect("directory entry");
                let path = entry.path();
                let rel = path
                    .strip_prefix(self.temp_dir.path())
                    .expect("path under root")
                    .to_path_buf();
                if entry.file_type().expect("file type").is_dir() {
                    entries.insert(rel, None);
                    stack.push(path);
                } else {
                    entries.insert(rel, Some(fs::read(&path).expect("readable file")));
                }
            }
        }
        entries
    }
}
