use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors produced by the search-and-operate core.
///
/// Per-path I/O and encoding errors are non-fatal: the traversal reports them
/// through the error sink and moves on. Everything else aborts the command.
#[derive(Debug, Error)]
pub enum Error {
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{}: content is not valid {encoding}", path.display())]
    Encoding {
        path: PathBuf,
        encoding: &'static str,
    },

    #[error(transparent)]
    Regex(#[from] regex::Error),

    #[error("cannot rename '{}': '{}' already exists", path.display(), target.display())]
    RenameConflict { path: PathBuf, target: PathBuf },

    #[error("'{value}' is not a valid value for {what}")]
    UnknownEnumValue { what: &'static str, value: String },

    #[error("invalid {what}: {reason}")]
    OptionParse { what: &'static str, reason: String },

    #[error("operation canceled")]
    Canceled,
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether the traversal may log this error and continue.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::Io { .. } | Error::Encoding { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recoverable_kinds() {
        let err = Error::io("/tmp/x", io::Error::from(io::ErrorKind::PermissionDenied));
        assert!(err.is_recoverable());

        let err = Error::Encoding {
            path: PathBuf::from("/tmp/x"),
            encoding: "UTF-8",
        };
        assert!(err.is_recoverable());

        assert!(!Error::Canceled.is_recoverable());
        let err = Error::RenameConflict {
            path: PathBuf::from("a"),
            target: PathBuf::from("b"),
        };
        assert!(!err.is_recoverable());
    }
}
