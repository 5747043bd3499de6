use std::fs::{self, File, Metadata};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use filetime::FileTime;

use crate::context::CancelToken;
use crate::error::{Error, Result};

/// Granularity at which long byte comparisons poll for cancellation.
pub const CHUNK_SIZE: usize = 64 * 1024;

#[cfg(windows)]
pub fn is_hidden(path: &Path, metadata: &Metadata) -> bool {
    use std::os::windows::fs::MetadataExt;
    const FILE_ATTRIBUTE_HIDDEN: u32 = 0x2;
    metadata.file_attributes() & FILE_ATTRIBUTE_HIDDEN != 0 || name_starts_with_dot(path)
}

#[cfg(not(windows))]
pub fn is_hidden(path: &Path, _metadata: &Metadata) -> bool {
    name_starts_with_dot(path)
}

fn name_starts_with_dot(path: &Path) -> bool {
    path.file_name()
        .map(|name| name.to_string_lossy().starts_with('.'))
        .unwrap_or(false)
}

/// An empty file has length zero; an empty directory has no entries.
pub fn is_empty(path: &Path, metadata: &Metadata) -> bool {
    if metadata.is_dir() {
        match fs::read_dir(path) {
            Ok(mut entries) => entries.next().is_none(),
            Err(_) => false,
        }
    } else if metadata.is_file() {
        metadata.len() == 0
    } else {
        false
    }
}

/// Remove the `./` prefix from a path.
pub fn strip_current_dir(path: &Path) -> &Path {
    path.strip_prefix(".").unwrap_or(path)
}

/// Whether two paths point at the same underlying file.
#[cfg(unix)]
pub fn same_file(a: &Path, b: &Path) -> bool {
    use std::os::unix::fs::MetadataExt;
    match (fs::symlink_metadata(a), fs::symlink_metadata(b)) {
        (Ok(ma), Ok(mb)) => ma.dev() == mb.dev() && ma.ino() == mb.ino(),
        _ => false,
    }
}

#[cfg(not(unix))]
pub fn same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(ca), Ok(cb)) => ca == cb,
        _ => false,
    }
}

/// Compare two files byte for byte, polling for cancellation per chunk.
pub fn files_equal(a: &Path, b: &Path, cancel: &CancelToken) -> Result<bool> {
    let meta_a = fs::metadata(a).map_err(|e| Error::io(a, e))?;
    let meta_b = fs::metadata(b).map_err(|e| Error::io(b, e))?;
    if meta_a.len() != meta_b.len() {
        return Ok(false);
    }

    let mut file_a = File::open(a).map_err(|e| Error::io(a, e))?;
    stream_equals_file(&mut file_a, a, b, cancel)
}

/// Compare an already-open source stream against the file at `candidate`.
///
/// The stream is rewound first, so one source handle can be reused across
/// many candidate comparisons.
pub fn stream_equals_file(
    source: &mut File,
    source_path: &Path,
    candidate: &Path,
    cancel: &CancelToken,
) -> Result<bool> {
    source
        .seek(SeekFrom::Start(0))
        .map_err(|e| Error::io(source_path, e))?;
    let mut other = File::open(candidate).map_err(|e| Error::io(candidate, e))?;

    let mut buf_a = vec![0u8; CHUNK_SIZE];
    let mut buf_b = vec![0u8; CHUNK_SIZE];

    loop {
        if cancel.is_canceled() {
            return Err(Error::Canceled);
        }

        let read_a = read_full(source, &mut buf_a).map_err(|e| Error::io(source_path, e))?;
        let read_b = read_full(&mut other, &mut buf_b).map_err(|e| Error::io(candidate, e))?;

        if read_a != read_b || buf_a[..read_a] != buf_b[..read_b] {
            return Ok(false);
        }
        if read_a == 0 {
            return Ok(true);
        }
    }
}

/// Read until the buffer is full or the stream ends.
fn read_full(reader: &mut impl Read, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..])? {
            0 => break,
            n => filled += n,
        }
    }
    Ok(filled)
}

/// Copy a file, carrying the source's modification time over to the copy.
pub fn copy_file_with_times(src: &Path, dst: &Path) -> io::Result<()> {
    fs::copy(src, dst)?;
    let metadata = fs::metadata(src)?;
    filetime::set_file_mtime(dst, FileTime::from_last_modification_time(&metadata))
}

/// Transfer permissions and modification time from `src` onto `dst`.
pub fn copy_attributes(src: &Path, dst: &Path) -> io::Result<()> {
    let metadata = fs::metadata(src)?;
    fs::set_permissions(dst, metadata.permissions())?;
    filetime::set_file_mtime(dst, FileTime::from_last_modification_time(&metadata))
}

/// Replace the contents of `path` atomically: write a sibling temp file and
/// rename it over the original. Permissions and modification time of the
/// original are preserved.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let original = fs::metadata(path).ok();

    let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
    tmp.write_all(bytes)?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| e.error)?;

    if let Some(metadata) = original {
        fs::set_permissions(path, metadata.permissions())?;
        filetime::set_file_mtime(path, FileTime::from_last_modification_time(&metadata))?;
    }
    Ok(())
}

/// Rename that survives case-insensitive filesystems: when the paths differ
/// only by case, go through a unique sibling intermediate so the rename is
/// not a no-op.
pub fn rename(from: &Path, to: &Path) -> io::Result<()> {
    if !is_case_only_change(from, to) {
        return fs::rename(from, to);
    }

    let mut intermediate = to.as_os_str().to_owned();
    intermediate.push(".orang-rename");
    let mut intermediate = PathBuf::from(intermediate);
    let mut counter = 0u32;
    while intermediate.symlink_metadata().is_ok() {
        counter += 1;
        let mut next = to.as_os_str().to_owned();
        next.push(format!(".orang-rename{counter}"));
        intermediate = PathBuf::from(next);
    }

    fs::rename(from, &intermediate)?;
    fs::rename(&intermediate, to)
}

fn is_case_only_change(from: &Path, to: &Path) -> bool {
    if from.parent() != to.parent() {
        return false;
    }
    match (from.file_name(), to.file_name()) {
        (Some(a), Some(b)) => {
            a != b && a.to_string_lossy().to_lowercase() == b.to_string_lossy().to_lowercase()
        }
        _ => false,
    }
}
