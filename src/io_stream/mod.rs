//! Streaming archive engine: writer and reader over a tar stream.
//!
//! # Layout
//! Every entry of one backup session sits under a prefix `P`:
//!
//! | Entry | Content | Compression |
//! |-------|---------|-------------|
//! | `P/info.json` | engine version + opaque backup metadata | none |
//! | `P/manifest.json` | list of exported units | none |
//! | `P/blobs/<algo>/<hex>` | content-addressed payload | per archive codec, recorded in a PAX header |
//! | `P/<name>` | any other JSON config | none |
//!
//! # Writer
//! [`Writer`] appends entries in caller order. Blobs are compressed into a
//! staging file first because a tar header must carry the exact payload
//! size before any payload byte is written.
//!
//! # Reader
//! [`Reader`] scans entries sequentially for metadata. A manifest scan also
//! records where every blob's header block starts, after which single blobs
//! are read by seeking straight to them.

pub mod reader;
pub mod writer;

pub use reader::{BlobStream, Reader};
pub use writer::Writer;

use chrono::Utc;

/// Permission bits of every entry the writer emits.
pub const ENTRY_MODE: u32 = 0o644;

/// Seconds since the epoch, for entry modification times.
pub(crate) fn mtime_now() -> u64 {
    Utc::now().timestamp().max(0) as u64
}

/// Entry name as stored, with any leading `/` dropped.
pub(crate) fn normalize_entry_name(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw).trim_start_matches('/').to_owned()
}
