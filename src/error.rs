//! Error type shared by every archive operation.
//!
//! Variants are grouped into four classes (see [`ErrorClass`]) so callers can
//! branch on the kind of failure without matching every variant.

use std::io;
use std::path::Path;
use thiserror::Error;

/// Coarse classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Bad options, bad names, or the wrong side of a Builder.
    Configuration,
    /// Open/seek/copy/flush failures on the archive or a staging file.
    Io,
    /// Malformed digests, tar headers, or JSON payloads.
    Format,
    /// A requested entry or blob is not in the archive, or the blob index
    /// has not been built yet.
    NotFound,
}

#[derive(Error, Debug)]
pub enum Error {
    // ── Configuration ───────────────────────────────────────────────────────
    #[error("invalid path: {0}")]
    InvalidPath(String),
    #[error("invalid tar path prefix {prefix:?}: {reason}")]
    InvalidPrefix { prefix: String, reason: &'static str },
    #[error("compression level {level} out of range for {codec} ({min}..={max})")]
    InvalidLevel { codec: &'static str, level: i32, min: i32, max: i32 },
    #[error("archive opened for {0}")]
    WrongMode(&'static str),
    #[error("entry name must not be empty")]
    EmptyName,
    #[error("archive already closed")]
    Closed,

    // ── I/O ─────────────────────────────────────────────────────────────────
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source:  io::Error,
    },

    // ── Format ──────────────────────────────────────────────────────────────
    #[error("invalid content digest {0:?}")]
    InvalidDigest(String),
    #[error("malformed tar header at offset {offset}: {reason}")]
    MalformedHeader { offset: u64, reason: String },
    #[error("JSON error in {context}: {source}")]
    Json {
        context: String,
        #[source]
        source:  serde_json::Error,
    },

    // ── Not found ───────────────────────────────────────────────────────────
    #[error("{0} not found in archive")]
    NotFound(String),
    #[error("blob {0:?} not found in archive")]
    BlobNotFound(String),
    #[error("blob index not built; call manifest() before reading blobs")]
    NotIndexed,
}

impl Error {
    pub fn class(&self) -> ErrorClass {
        match self {
            Error::InvalidPath(_)
            | Error::InvalidPrefix { .. }
            | Error::InvalidLevel { .. }
            | Error::WrongMode(_)
            | Error::EmptyName
            | Error::Closed => ErrorClass::Configuration,
            Error::Io { .. } => ErrorClass::Io,
            Error::InvalidDigest(_)
            | Error::MalformedHeader { .. }
            | Error::Json { .. } => ErrorClass::Format,
            Error::NotFound(_) | Error::BlobNotFound(_) | Error::NotIndexed => {
                ErrorClass::NotFound
            }
        }
    }

    pub(crate) fn io(context: impl Into<String>, source: io::Error) -> Self {
        Error::Io { context: context.into(), source }
    }

    pub(crate) fn json(context: impl Into<String>, source: serde_json::Error) -> Self {
        Error::Json { context: context.into(), source }
    }
}

/// Attach operation context to a bare `io::Result`.
pub(crate) trait IoContext<T> {
    fn context<C: Into<String>>(self, context: C) -> Result<T>;
    fn with_path(self, what: &str, path: &Path) -> Result<T>;
}

impl<T> IoContext<T> for io::Result<T> {
    fn context<C: Into<String>>(self, context: C) -> Result<T> {
        self.map_err(|e| Error::io(context, e))
    }

    fn with_path(self, what: &str, path: &Path) -> Result<T> {
        self.map_err(|e| Error::io(format!("{what} {}", path.display()), e))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classes_cover_taxonomy() {
        assert_eq!(Error::InvalidPath(String::new()).class(), ErrorClass::Configuration);
        assert_eq!(Error::WrongMode("reading").class(), ErrorClass::Configuration);
        assert_eq!(
            Error::io("seek", io::Error::new(io::ErrorKind::Other, "boom")).class(),
            ErrorClass::Io
        );
        assert_eq!(Error::InvalidDigest("x".into()).class(), ErrorClass::Format);
        assert_eq!(Error::NotIndexed.class(), ErrorClass::NotFound);
        assert_eq!(Error::BlobNotFound("abc".into()).class(), ErrorClass::NotFound);
    }

    #[test]
    fn io_error_keeps_context() {
        let res: io::Result<()> = Err(io::Error::new(io::ErrorKind::NotFound, "gone"));
        let msg = res.context("open staging file").unwrap_err().to_string();
        assert!(msg.starts_with("open staging file: "), "{msg}");
    }
}
