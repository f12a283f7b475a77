//! High-level [`Builder`] API: owns the archive file for its whole lifetime.
//!
//! ```no_run
//! use snaptar::{ArchiveOptions, Builder, Info, Manifest};
//!
//! // Write
//! let mut b = Builder::open(ArchiveOptions::write("/var/backup/web.tar").with_prefix("web"))?;
//! let w = b.writer()?;
//! let config = w.write_blob(br#"{"Image":"nginx"}"#)?;
//! w.write_config_file("manifest.json", &[Manifest { config, ..Default::default() }])?;
//! w.write_config_file("info.json", &Info::new("24.0.0"))?;
//! b.close()?;
//!
//! // Read
//! let mut b = Builder::open(ArchiveOptions::read("/var/backup/web.tar").with_prefix("web"))?;
//! let r = b.reader()?;
//! let manifest = r.manifest()?;
//! let config = r.read_blobs_content(&manifest[0].config)?;
//! b.close()?;
//! # Ok::<(), snaptar::Error>(())
//! ```

use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::path::Path;

use log::{debug, warn};

use crate::config::{ArchiveOptions, Mode};
use crate::error::{Error, IoContext, Result};
use crate::io_stream::{Reader, Writer};

enum Access {
    Write(Writer),
    Read(Reader),
}

/// Lifecycle façade over one archive file: exactly one of [`Writer`] or
/// [`Reader`], released by [`close`](Builder::close) or on drop.
pub struct Builder {
    options: ArchiveOptions,
    access:  Option<Access>,
}

impl Builder {
    /// Validate `options`, then open the file. Nothing stays open on error.
    pub fn open(options: ArchiveOptions) -> Result<Self> {
        options.validate()?;
        let access = match options.mode {
            Mode::Write => {
                let file = create_archive_file(&options.path)?;
                Access::Write(Writer::new(
                    file,
                    options.path.clone(),
                    options.tar_path_prefix.clone(),
                    options.compression,
                ))
            }
            Mode::Read => {
                let file = File::open(&options.path).with_path("open archive", &options.path)?;
                Access::Read(Reader::new(file, options.tar_path_prefix.clone()))
            }
        };
        debug!(
            "opened {} for {} (prefix {:?})",
            options.path.display(),
            options.mode.name(),
            options.tar_path_prefix
        );
        Ok(Self { options, access: Some(access) })
    }

    pub fn writer(&mut self) -> Result<&mut Writer> {
        match &mut self.access {
            Some(Access::Write(w)) => Ok(w),
            Some(Access::Read(_))  => Err(Error::WrongMode(Mode::Read.name())),
            None                   => Err(Error::Closed),
        }
    }

    pub fn reader(&mut self) -> Result<&mut Reader> {
        match &mut self.access {
            Some(Access::Read(r))  => Ok(r),
            Some(Access::Write(_)) => Err(Error::WrongMode(Mode::Write.name())),
            None                   => Err(Error::Closed),
        }
    }

    /// Seal a written archive (tar trailer before file flush) or release a
    /// reader's file. Later calls are no-ops.
    pub fn close(&mut self) -> Result<()> {
        let result = match self.access.take() {
            Some(Access::Write(mut w)) => w.close(),
            Some(Access::Read(_)) | None => Ok(()),
        };
        if result.is_ok() {
            debug!("closed {}", self.options.path.display());
        }
        result
    }

    pub fn path(&self) -> &Path { &self.options.path }
    pub fn prefix(&self) -> &str { &self.options.tar_path_prefix }
    pub fn mode(&self) -> Mode { self.options.mode }
    pub fn is_closed(&self) -> bool { self.access.is_none() }
}

impl fmt::Debug for Builder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Builder")
            .field("path", &self.options.path)
            .field("prefix", &self.options.tar_path_prefix)
            .field("mode", &self.options.mode)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

impl Drop for Builder {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!("closing {} on drop: {e}", self.options.path.display());
        }
    }
}

fn create_archive_file(path: &Path) -> Result<File> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).with_path("create directory", dir)?;
    }
    OpenOptions::new()
        .create(true)
        .truncate(true)
        .read(true)
        .write(true)
        .open(path)
        .with_path("create archive", path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorClass;
    use tempfile::tempdir;

    #[test]
    fn creates_missing_parents() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a/b/c/backup.tar");
        let mut b = Builder::open(ArchiveOptions::write(&path)).unwrap();
        assert!(path.exists());
        b.close().unwrap();
    }

    #[test]
    fn truncates_existing_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("backup.tar");
        fs::write(&path, vec![7u8; 4096]).unwrap();
        let b = Builder::open(ArchiveOptions::write(&path)).unwrap();
        assert_eq!(fs::metadata(&path).unwrap().len(), 0);
        drop(b);
    }

    #[test]
    fn invalid_options_open_nothing() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sub/backup.tar");
        let err = Builder::open(ArchiveOptions::write(&path).with_prefix("../escape")).unwrap_err();
        assert_eq!(err.class(), ErrorClass::Configuration);
        assert!(!dir.path().join("sub").exists());
    }

    #[test]
    fn missing_archive_for_read() {
        let dir = tempdir().unwrap();
        let err = Builder::open(ArchiveOptions::read(dir.path().join("nope.tar"))).unwrap_err();
        assert_eq!(err.class(), ErrorClass::Io);
    }

    #[test]
    fn wrong_side_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("backup.tar");
        let mut w = Builder::open(ArchiveOptions::write(&path)).unwrap();
        assert!(matches!(w.reader(), Err(Error::WrongMode(_))));
        w.close().unwrap();

        let mut r = Builder::open(ArchiveOptions::read(&path)).unwrap();
        assert!(matches!(r.writer(), Err(Error::WrongMode(_))));
        r.close().unwrap();
    }

    #[test]
    fn close_is_idempotent() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("backup.tar");
        let mut b = Builder::open(ArchiveOptions::write(&path)).unwrap();
        b.writer().unwrap().write_blob(b"x").unwrap();
        b.close().unwrap();
        let sealed = fs::metadata(&path).unwrap().len();
        b.close().unwrap();
        assert!(b.is_closed());
        assert!(matches!(b.writer(), Err(Error::Closed)));
        assert_eq!(fs::metadata(&path).unwrap().len(), sealed);
        assert_eq!(sealed % 512, 0);
    }

    #[test]
    fn debug_shows_state() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("backup.tar");
        let mut b = Builder::open(ArchiveOptions::write(&path).with_prefix("bk1")).unwrap();
        let open = format!("{b:?}");
        assert!(open.contains("prefix: \"bk1\""), "{open}");
        assert!(open.contains("closed: false"), "{open}");
        b.close().unwrap();
        assert!(format!("{b:?}").contains("closed: true"));
    }
}
