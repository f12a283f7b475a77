//! In-memory blob index built by a manifest scan.
//!
//! Never persisted. Each location points at the entry's tar header block, not
//! its payload, so a reader can seek there and parse exactly one entry.

use crate::codec::CodecId;

/// Size of one tar header block. Offsets are computed against it.
pub const HEADER_BLOCK_SIZE: u64 = 512;

/// Directory segment that marks an entry as a blob.
pub const BLOBS_DIR: &str = "blobs";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobLocation {
    /// Full entry name as stored in the tar stream (prefix included).
    pub name:   String,
    /// Byte offset of the entry's header block within the archive file.
    pub offset: u64,
    /// Codec recorded by the writer; `None` for entries written without one.
    pub codec:  Option<CodecId>,
}

/// Blob locations in scan order. Duplicates are kept; lookups return the
/// earliest.
#[derive(Debug, Clone, Default)]
pub struct BlobIndex {
    entries: Vec<BlobLocation>,
}

impl BlobIndex {
    pub fn push(&mut self, name: String, offset: u64, codec: Option<CodecId>) {
        self.entries.push(BlobLocation { name, offset, codec });
    }

    /// First entry whose name ends with `suffix`.
    pub fn find(&self, suffix: &str) -> Option<&BlobLocation> {
        self.entries.iter().find(|e| e.name.ends_with(suffix))
    }

    pub fn entries(&self) -> &[BlobLocation] { &self.entries }
    pub fn len(&self) -> usize { self.entries.len() }
    pub fn is_empty(&self) -> bool { self.entries.is_empty() }
}

/// Whether a tar entry name sits below a `blobs` directory at any depth.
pub fn is_blob_entry(name: &str) -> bool {
    let mut dirs = name.split('/');
    dirs.next_back();
    dirs.any(|d| d == BLOBS_DIR)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn find_returns_first_match() {
        let mut idx = BlobIndex::default();
        idx.push("bk/blobs/sha256/deadbeef".into(), 512, Some(CodecId::Gzip));
        idx.push("bk/blobs/sha256/deadbeef".into(), 4096, None);
        idx.push("bk/blobs/sha256/cafe".into(), 8192, Some(CodecId::Zstd));
        assert_eq!(idx.find("deadbeef").unwrap().offset, 512);
        assert_eq!(idx.find("blobs/sha256/cafe").unwrap().offset, 8192);
        assert!(idx.find("beef00").is_none());
        assert_eq!(idx.len(), 3);
    }

    #[test]
    fn blob_entries() {
        assert!(is_blob_entry("bk/blobs/sha256/aa"));
        assert!(is_blob_entry("blobs/blake3/aa"));
        assert!(!is_blob_entry("bk/manifest.json"));
    }

    #[test]
    fn blobs_must_be_a_whole_directory() {
        assert!(!is_blob_entry("bk/myblobs/x.json"));
        assert!(!is_blob_entry("bk/blobs-old/sha256/aa"));
        assert!(!is_blob_entry("bk/blobs"));
        assert!(!is_blob_entry("blobs.json"));
    }
}
