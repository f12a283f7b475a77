//! Options for opening an archive.
//!
//! [`ArchiveOptions`] is built up front and validated as a whole by
//! [`ArchiveOptions::validate`] before any file is created or opened.

use std::path::{Path, PathBuf};

use crate::codec::Compression;
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Create or truncate the file and append entries.
    Write,
    /// Open an existing, sealed archive.
    Read,
}

impl Mode {
    pub fn name(self) -> &'static str {
        match self {
            Mode::Write => "writing",
            Mode::Read  => "reading",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ArchiveOptions {
    pub path:            PathBuf,
    /// Namespace for every entry of this session, without leading or
    /// trailing `/`. Empty means entries sit at the archive root. A reader
    /// only sees entries below its prefix; an empty prefix sees everything.
    pub tar_path_prefix: String,
    pub mode:            Mode,
    /// Codec for blobs written in this session. Readers take the codec
    /// recorded with each blob instead.
    pub compression:     Compression,
}

impl ArchiveOptions {
    pub fn write<P: AsRef<Path>>(path: P) -> Self {
        Self::new(path, Mode::Write)
    }

    pub fn read<P: AsRef<Path>>(path: P) -> Self {
        Self::new(path, Mode::Read)
    }

    fn new<P: AsRef<Path>>(path: P, mode: Mode) -> Self {
        Self {
            path:            path.as_ref().to_owned(),
            tar_path_prefix: String::new(),
            mode,
            compression:     Compression::default(),
        }
    }

    /// Set the entry prefix. An empty value keeps the current prefix.
    pub fn with_prefix(mut self, prefix: &str) -> Self {
        if !prefix.is_empty() {
            self.tar_path_prefix = prefix.trim_matches('/').to_owned();
        }
        self
    }

    pub fn with_compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.path.as_os_str().is_empty() {
            return Err(Error::InvalidPath("path must not be empty".into()));
        }
        if self.path.file_name().is_none() {
            return Err(Error::InvalidPath(format!(
                "{} does not name a file",
                self.path.display()
            )));
        }
        if self.tar_path_prefix.split('/').any(|c| c == "..") {
            return Err(Error::InvalidPrefix {
                prefix: self.tar_path_prefix.clone(),
                reason: "must not contain `..`",
            });
        }
        if self.tar_path_prefix.contains('\0') {
            return Err(Error::InvalidPrefix {
                prefix: self.tar_path_prefix.clone(),
                reason: "must not contain NUL",
            });
        }
        self.compression.validate()
    }

    /// `<prefix>/<name>`, or just `name` without a prefix.
    pub fn entry_name(&self, name: &str) -> String {
        join_entry(&self.tar_path_prefix, name)
    }
}

pub(crate) fn join_entry(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_owned()
    } else {
        format!("{prefix}/{name}")
    }
}

/// Whether `name` lies below `prefix`. Every name is below the empty prefix.
pub(crate) fn under_prefix(prefix: &str, name: &str) -> bool {
    prefix.is_empty()
        || name
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with('/'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::CodecId;

    #[test]
    fn empty_prefix_is_noop() {
        let opts = ArchiveOptions::write("/tmp/a.tar").with_prefix("bk1").with_prefix("");
        assert_eq!(opts.tar_path_prefix, "bk1");
    }

    #[test]
    fn prefix_slashes_trimmed() {
        let opts = ArchiveOptions::write("/tmp/a.tar").with_prefix("/web-1/");
        assert_eq!(opts.tar_path_prefix, "web-1");
        assert_eq!(opts.entry_name("manifest.json"), "web-1/manifest.json");
        assert_eq!(ArchiveOptions::write("/tmp/a.tar").entry_name("info.json"), "info.json");
    }

    #[test]
    fn prefix_scope_is_per_segment() {
        assert!(under_prefix("", "anything/info.json"));
        assert!(under_prefix("bk1", "bk1/info.json"));
        assert!(under_prefix("a/b", "a/b/blobs/sha256/aa"));
        assert!(!under_prefix("bk1", "bk10/info.json"));
        assert!(!under_prefix("bk1", "bk1"));
        assert!(!under_prefix("bk1", "other/bk1/info.json"));
    }

    #[test]
    fn rejects_bad_options() {
        assert!(matches!(
            ArchiveOptions::write("").validate(),
            Err(Error::InvalidPath(_))
        ));
        assert!(matches!(
            ArchiveOptions::write("/tmp/a.tar").with_prefix("a/../b").validate(),
            Err(Error::InvalidPrefix { .. })
        ));
        assert!(matches!(
            ArchiveOptions::write("/tmp/a.tar")
                .with_compression(Compression::with_level(CodecId::Zstd, 99))
                .validate(),
            Err(Error::InvalidLevel { .. })
        ));
        assert!(ArchiveOptions::read("/tmp/a.tar").with_prefix("bk1").validate().is_ok());
    }
}
