use std::fs::{self, File};
use std::io::{self, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use log::{debug, trace};
use serde::Serialize;
use tar::{EntryType, Header};
use tempfile::NamedTempFile;

use crate::codec::{Compression, CODEC_PAX_KEY};
use crate::config::join_entry;
use crate::digest::{ContentDigest, DigestAlgorithm};
use crate::error::{Error, IoContext, Result};
use crate::io_stream::{mtime_now, ENTRY_MODE};

/// Append-only, content-addressable writer over one archive file.
pub struct Writer {
    tar:           tar::Builder<BufWriter<File>>,
    archive_path:  PathBuf,
    prefix:        String,
    compression:   Compression,
    blobs_written: u64,
}

impl Writer {
    pub(crate) fn new(
        file:         File,
        archive_path: PathBuf,
        prefix:       String,
        compression:  Compression,
    ) -> Self {
        Self {
            tar: tar::Builder::new(BufWriter::new(file)),
            archive_path,
            prefix,
            compression,
            blobs_written: 0,
        }
    }

    // ── Blobs ────────────────────────────────────────────────────────────────

    /// Store `content` under its SHA-256 digest. Returns the blob path
    /// relative to the prefix, e.g. `blobs/sha256/<hex>`.
    pub fn write_blob(&mut self, content: &[u8]) -> Result<String> {
        self.write_blob_with(DigestAlgorithm::Sha256, content)
    }

    /// Like [`write_blob`](Self::write_blob) with a chosen digest algorithm.
    pub fn write_blob_with(&mut self, algorithm: DigestAlgorithm, content: &[u8]) -> Result<String> {
        let digest = algorithm.digest(content);
        self.write_blob_reader(&digest.to_string(), content)
    }

    /// JSON-encode `value` and store it as a blob.
    pub fn write_blob_struct<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<String> {
        let content = serde_json::to_vec(value).map_err(|e| Error::json("blob struct", e))?;
        self.write_blob(&content)
    }

    /// Compress `source` and append it as the blob named by `digest`.
    ///
    /// `digest` is trusted: it is not recomputed over `source`, so export
    /// services can address streams by an id they already know (an image id,
    /// a digest of a mount point). `source` is consumed and dropped on every
    /// path out of this call.
    ///
    /// A failure after the header is written leaves a truncated entry behind;
    /// the archive must then be discarded.
    pub fn write_blob_reader<R: Read>(&mut self, digest: &str, mut source: R) -> Result<String> {
        let digest = ContentDigest::parse(digest)?;
        let entry = self.blob_entry(&digest);

        let mut staging = self.open_staging(&digest)?;
        let (plain_len, mut staged) = self
            .compression
            .encode(&mut source, BufWriter::new(staging.as_file_mut()))
            .context(format!("compress blob {digest} into staging file"))?;
        staged.flush().context("flush staging file")?;
        drop(staged);
        drop(source);

        let file = staging.as_file_mut();
        let meta = file.metadata().context("stat staging file")?;
        let size = meta.len();
        file.seek(SeekFrom::Start(0)).context("rewind staging file")?;

        let mtime = meta
            .modified()
            .map(|t| DateTime::<Utc>::from(t).timestamp().max(0) as u64)
            .unwrap_or_else(|_| mtime_now());

        let codec = self.compression.codec.name();
        self.tar
            .append_pax_extensions([(CODEC_PAX_KEY, codec.as_bytes())])
            .context(format!("record codec of {entry}"))?;

        let mut header = Header::new_gnu();
        header.set_entry_type(EntryType::Regular);
        header.set_size(size);
        header.set_mode(ENTRY_MODE);
        header.set_mtime(mtime);
        self.tar
            .append_data(&mut header, &entry, file)
            .context(format!("append blob {entry}"))?;

        self.blobs_written += 1;
        debug!(
            "wrote blob {} ({} bytes plain, {} bytes {})",
            entry, plain_len, size, codec
        );
        // `staging` drops here and removes the file.
        Ok(relative_blob_path(&digest))
    }

    /// `<prefix>/blobs/<algo>/<hex>` for a digest string.
    pub fn blob_path(&self, digest: &str) -> Result<String> {
        Ok(self.blob_entry(&ContentDigest::parse(digest)?))
    }

    fn blob_entry(&self, digest: &ContentDigest) -> String {
        join_entry(&self.prefix, &relative_blob_path(digest))
    }

    /// Staging file beside the archive, named after the archive and the blob.
    /// A leftover from an interrupted run is replaced.
    fn open_staging(&self, digest: &ContentDigest) -> Result<NamedTempFile> {
        let dir = match self.archive_path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let archive_name = self
            .archive_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let name = format!("{archive_name}.{}.temp", staging_key(digest));
        let path = dir.join(&name);

        match fs::remove_file(&path) {
            Ok(()) => trace!("removed stale staging file {}", path.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(Error::io(format!("remove stale {}", path.display()), e)),
        }

        tempfile::Builder::new()
            .prefix(&name)
            .suffix("")
            .rand_bytes(0)
            .tempfile_in(&dir)
            .with_path("create staging file", &path)
    }

    // ── Config files ─────────────────────────────────────────────────────────

    /// JSON-encode `value` and append it uncompressed as `<prefix>/<name>`.
    pub fn write_config_file<T: Serialize + ?Sized>(&mut self, name: &str, value: &T) -> Result<()> {
        let name = name.trim_start_matches('/');
        if name.is_empty() {
            return Err(Error::EmptyName);
        }
        let content = serde_json::to_vec(value).map_err(|e| Error::json(name, e))?;
        let entry = join_entry(&self.prefix, name);

        let mut header = Header::new_gnu();
        header.set_entry_type(EntryType::Regular);
        header.set_size(content.len() as u64);
        header.set_mode(ENTRY_MODE);
        header.set_mtime(mtime_now());
        self.tar
            .append_data(&mut header, &entry, content.as_slice())
            .context(format!("append {entry}"))?;

        debug!("wrote config file {} ({} bytes)", entry, content.len());
        Ok(())
    }

    // ── Accessors ────────────────────────────────────────────────────────────

    pub fn prefix(&self) -> &str { &self.prefix }
    pub fn compression(&self) -> Compression { self.compression }
    pub fn blobs_written(&self) -> u64 { self.blobs_written }
    pub fn archive_path(&self) -> &Path { &self.archive_path }

    // ── Close ────────────────────────────────────────────────────────────────

    /// Write the tar trailer, then flush and sync the file. Every step runs
    /// even if an earlier one failed; the first error is returned.
    pub(crate) fn close(&mut self) -> Result<()> {
        let steps = [
            self.tar.finish().context("write tar trailer"),
            self.tar.get_mut().flush().context("flush archive"),
            self.tar.get_ref().get_ref().sync_all().context("sync archive"),
        ];
        steps.into_iter().find_map(Result::err).map_or(Ok(()), Err)
    }
}

/// Longest digest hex used verbatim in a staging file name.
const STAGING_KEY_MAX: usize = 64;

/// Digest hex for the staging file name; longer values are hashed down so the
/// name stays within file system limits.
fn staging_key(digest: &ContentDigest) -> String {
    let hex = digest.hex();
    if hex.len() <= STAGING_KEY_MAX {
        hex.to_owned()
    } else {
        blake3::hash(hex.as_bytes()).to_hex().to_string()
    }
}

/// `blobs/<algo>/<hex>`: the prefix-independent name returned to callers.
fn relative_blob_path(digest: &ContentDigest) -> String {
    format!("blobs/{}/{}", digest.algorithm(), digest.hex())
}
