use std::fs::File;
use std::io::{self, Cursor, Read, Seek, SeekFrom, Take};

use log::{debug, trace};
use serde::de::DeserializeOwned;
use tar::{EntryType, Header};

use crate::codec::{CodecId, CODEC_PAX_KEY, MAGIC_LEN};
use crate::config::under_prefix;
use crate::error::{Error, IoContext, Result};
use crate::index::{is_blob_entry, BlobIndex, BlobLocation, HEADER_BLOCK_SIZE};
use crate::io_stream::normalize_entry_name;
use crate::manifest::{Info, Manifest, INFO_FILE, MANIFEST_FILE};

/// Reader over a sealed archive, limited to the entries below its prefix.
///
/// Starts unscanned; [`manifest`](Self::manifest) builds the blob index that
/// [`read_blobs`](Self::read_blobs) needs. Every call that moves the file
/// position takes `&mut self`, and a [`BlobStream`] keeps the reader borrowed
/// until it is dropped, so seek-based reads cannot interleave.
pub struct Reader {
    file:   File,
    prefix: String,
    index:  Option<BlobIndex>,
}

impl Reader {
    pub(crate) fn new(file: File, prefix: String) -> Self {
        Self { file, prefix, index: None }
    }

    // ── Metadata scans ───────────────────────────────────────────────────────

    /// Decode the first `info.json` entry in the archive.
    pub fn info(&mut self) -> Result<Info> {
        self.config_file(INFO_FILE)
    }

    /// Decode the first entry whose name ends with `name`.
    ///
    /// Scans from the start of the archive and stops at the first match; the
    /// blob index is neither used nor touched.
    pub fn config_file<T: DeserializeOwned>(&mut self, name: &str) -> Result<T> {
        rewind(&mut self.file)?;
        let mut archive = tar::Archive::new(&mut self.file);
        let entries = archive.entries_with_seek().context("read archive entries")?;
        for entry in entries {
            let mut entry = entry.context("read tar entry")?;
            let entry_name = normalize_entry_name(&entry.path_bytes());
            if !entry_name.ends_with(name) || !under_prefix(&self.prefix, &entry_name) {
                continue;
            }
            let mut content = Vec::new();
            entry
                .read_to_end(&mut content)
                .context(format!("read {entry_name}"))?;
            trace!("found {} ({} bytes)", entry_name, content.len());
            return serde_json::from_slice(&content).map_err(|e| Error::json(entry_name, e));
        }
        Err(Error::NotFound(name.to_owned()))
    }

    /// Scan the whole archive once: decode `manifest.json` (last one wins)
    /// and index every blob entry.
    ///
    /// The index is kept even when no manifest is found, so blobs stay
    /// readable from an archive whose manifest was never written.
    pub fn manifest(&mut self) -> Result<Vec<Manifest>> {
        let mut index = BlobIndex::default();
        let scanned = scan_manifest(&mut self.file, &self.prefix, &mut index);
        debug!("indexed {} blob(s)", index.len());
        self.index = Some(index);
        scanned?.ok_or_else(|| Error::NotFound(MANIFEST_FILE.to_owned()))
    }

    // ── Indexed access ───────────────────────────────────────────────────────

    /// Raw (still compressed) payload of the first indexed blob whose name
    /// ends with `suffix`.
    pub fn read_blobs(&mut self, suffix: &str) -> Result<BlobStream<'_>> {
        let location = self
            .index
            .as_ref()
            .ok_or(Error::NotIndexed)?
            .find(suffix)
            .cloned()
            .ok_or_else(|| Error::BlobNotFound(suffix.to_owned()))?;

        trace!("seek to {} for {}", location.offset, location.name);
        self.file
            .seek(SeekFrom::Start(location.offset))
            .context(format!("seek to blob {}", location.name))?;

        let mut header = Header::new_old();
        self.file
            .read_exact(header.as_mut_bytes())
            .context(format!("read header of blob {}", location.name))?;
        let size = check_header(&header, location.offset)?;

        Ok(BlobStream {
            name:   location.name,
            offset: location.offset,
            size,
            codec:  location.codec,
            inner:  (&mut self.file).take(size),
        })
    }

    /// Blob payload decoded with the codec it was written with, as a stream.
    ///
    /// Blobs that carry no codec record are identified by their leading bytes.
    pub fn read_blobs_decoded(&mut self, suffix: &str) -> Result<Box<dyn Read + '_>> {
        let mut stream = self.read_blobs(suffix)?;
        let mut head = Vec::with_capacity(MAGIC_LEN);
        (&mut stream)
            .take(MAGIC_LEN as u64)
            .read_to_end(&mut head)
            .context(format!("read blob {suffix}"))?;
        let codec = stream.codec.unwrap_or_else(|| CodecId::sniff(&head));
        trace!("decode {} as {}", stream.name, codec.name());
        codec
            .decoder(Cursor::new(head).chain(stream))
            .context(format!("open decoder for {suffix}"))
    }

    /// Blob payload fully decoded into memory.
    pub fn read_blobs_content(&mut self, suffix: &str) -> Result<Vec<u8>> {
        let mut decoder = self.read_blobs_decoded(suffix)?;
        let mut content = Vec::new();
        decoder
            .read_to_end(&mut content)
            .context(format!("decode blob {suffix}"))?;
        drop(decoder);
        Ok(content)
    }

    // ── Accessors ────────────────────────────────────────────────────────────

    pub fn is_indexed(&self) -> bool { self.index.is_some() }

    /// Indexed blobs in scan order; empty before the first manifest scan.
    pub fn blobs(&self) -> &[BlobLocation] {
        self.index.as_ref().map(BlobIndex::entries).unwrap_or(&[])
    }

    pub fn prefix(&self) -> &str { &self.prefix }
}

/// One blob entry's payload, bounded to the size in its header.
pub struct BlobStream<'a> {
    name:   String,
    offset: u64,
    size:   u64,
    codec:  Option<CodecId>,
    inner:  Take<&'a mut File>,
}

impl BlobStream<'_> {
    /// Full entry name, prefix included.
    pub fn name(&self) -> &str { &self.name }
    /// Archive offset of the entry's header block.
    pub fn offset(&self) -> u64 { self.offset }
    /// Payload size as stored (compressed).
    pub fn size(&self) -> u64 { self.size }
    /// Codec the writer recorded for this blob, if any.
    pub fn codec(&self) -> Option<CodecId> { self.codec }
    /// Bytes not yet read.
    pub fn remaining(&self) -> u64 { self.inner.limit() }
}

impl Read for BlobStream<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

fn rewind(file: &mut File) -> Result<()> {
    file.seek(SeekFrom::Start(0)).context("rewind archive")?;
    Ok(())
}

fn scan_manifest(
    file:   &mut File,
    prefix: &str,
    index:  &mut BlobIndex,
) -> Result<Option<Vec<Manifest>>> {
    rewind(file)?;
    let mut found = None;
    let mut archive = tar::Archive::new(file);
    let entries = archive.entries_with_seek().context("read archive entries")?;
    for entry in entries {
        let mut entry = entry.context("read tar entry")?;
        let name = normalize_entry_name(&entry.path_bytes());
        if !under_prefix(prefix, &name) {
            continue;
        }

        if name.ends_with(MANIFEST_FILE) {
            let mut content = Vec::new();
            entry.read_to_end(&mut content).context(format!("read {name}"))?;
            let manifest: Vec<Manifest> =
                serde_json::from_slice(&content).map_err(|e| Error::json(name.clone(), e))?;
            found = Some(manifest);
        }

        if is_blob_entry(&name) {
            let offset = entry
                .raw_file_position()
                .checked_sub(HEADER_BLOCK_SIZE)
                .ok_or_else(|| Error::MalformedHeader {
                    offset: entry.raw_file_position(),
                    reason: "payload starts inside the first header block".into(),
                })?;
            let codec = recorded_codec(&mut entry)?;
            trace!("index {} at {} ({:?})", name, offset, codec);
            index.push(name, offset, codec);
        }
    }
    Ok(found)
}

/// Codec named by the entry's PAX record, if the writer left one.
fn recorded_codec<R: Read>(entry: &mut tar::Entry<'_, R>) -> Result<Option<CodecId>> {
    let Some(extensions) = entry.pax_extensions().context("read pax extensions")? else {
        return Ok(None);
    };
    for extension in extensions {
        let extension = extension.context("read pax record")?;
        if extension.key() == Ok(CODEC_PAX_KEY) {
            return Ok(extension.value().ok().and_then(CodecId::from_name));
        }
    }
    Ok(None)
}

/// Validate a raw header block and return its payload size.
fn check_header(header: &Header, offset: u64) -> Result<u64> {
    let malformed = |reason: String| Error::MalformedHeader { offset, reason };

    let bytes = header.as_bytes();
    if bytes.iter().all(|&b| b == 0) {
        return Err(malformed("end-of-archive block".into()));
    }
    let stored = header.cksum().map_err(|e| malformed(e.to_string()))?;
    let computed: u32 = bytes
        .iter()
        .enumerate()
        .map(|(i, &b)| if (148..156).contains(&i) { u32::from(b' ') } else { u32::from(b) })
        .sum();
    if stored != computed {
        return Err(malformed(format!("checksum {stored} != computed {computed}")));
    }
    match header.entry_type() {
        EntryType::Regular | EntryType::Continuous => {}
        other => return Err(malformed(format!("unexpected entry type {other:?}"))),
    }
    header.entry_size().map_err(|e| malformed(e.to_string()))
}
