//! Per-blob compression policy.
//!
//! One [`Compression`] is chosen when an archive is opened and applies to
//! every blob written through it. Config files (`info.json`,
//! `manifest.json`, ...) are always stored verbatim.
//!
//! Blobs are compressed as streams: the writer never holds a whole blob in
//! memory, and the reader hands back a decoder layered over the tar entry.
//!
//! The writer records each blob's codec in a PAX extended header under
//! [`CODEC_PAX_KEY`], so a reader never needs to be told how an archive was
//! written. Blobs without that record are identified by their magic bytes.

use std::io::{self, Read, Write};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;

use crate::error::{Error, Result};

/// Default gzip level; matches `gzip.DefaultCompression`.
pub const DEFAULT_GZIP_LEVEL: i32 = 6;
/// Default Zstd compression level.
pub const DEFAULT_ZSTD_LEVEL: i32 = 3;

/// PAX record naming the codec of the blob entry that follows it.
pub const CODEC_PAX_KEY: &str = "SNAPTAR.codec";

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];
const ZSTD_MAGIC: [u8; 4] = [0x28, 0xb5, 0x2f, 0xfd];

/// Bytes [`CodecId::sniff`] needs to tell every codec apart.
pub const MAGIC_LEN: usize = ZSTD_MAGIC.len();

// ── CodecId ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CodecId {
    /// Payload stored verbatim.
    None,
    /// gzip member per blob. Default, and what older archives contain.
    #[default]
    Gzip,
    /// Zstandard frame per blob.
    Zstd,
}

impl CodecId {
    /// Human-readable name (diagnostics and CLI only).
    pub fn name(self) -> &'static str {
        match self {
            CodecId::None => "none",
            CodecId::Gzip => "gzip",
            CodecId::Zstd => "zstd",
        }
    }

    /// Parse from a CLI string.
    pub fn from_name(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "none"         => Some(CodecId::None),
            "gzip" | "gz"  => Some(CodecId::Gzip),
            "zstd" | "zst" => Some(CodecId::Zstd),
            _              => None,
        }
    }

    pub fn default_level(self) -> i32 {
        match self {
            CodecId::None => 0,
            CodecId::Gzip => DEFAULT_GZIP_LEVEL,
            CodecId::Zstd => DEFAULT_ZSTD_LEVEL,
        }
    }

    /// Guess the codec of a payload from its leading bytes. Anything that is
    /// neither a gzip member nor a zstd frame is taken as stored verbatim.
    pub fn sniff(head: &[u8]) -> Self {
        if head.starts_with(&ZSTD_MAGIC) {
            CodecId::Zstd
        } else if head.starts_with(&GZIP_MAGIC) {
            CodecId::Gzip
        } else {
            CodecId::None
        }
    }

    /// Wrap `src` in a streaming decoder for this codec.
    pub fn decoder<'a, R: Read + 'a>(self, src: R) -> io::Result<Box<dyn Read + 'a>> {
        Ok(match self {
            CodecId::None => Box::new(src),
            CodecId::Gzip => Box::new(GzDecoder::new(src)),
            CodecId::Zstd => Box::new(zstd::stream::read::Decoder::new(src)?),
        })
    }

    fn level_range(self) -> (i32, i32) {
        match self {
            CodecId::None => (0, 0),
            CodecId::Gzip => (0, 9),
            CodecId::Zstd => (1, 22),
        }
    }
}

// ── Compression ──────────────────────────────────────────────────────────────

/// Codec plus level, validated before the archive file is touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Compression {
    pub codec: CodecId,
    pub level: i32,
}

impl Default for Compression {
    fn default() -> Self {
        Self::new(CodecId::default())
    }
}

impl Compression {
    /// `codec` at its default level.
    pub fn new(codec: CodecId) -> Self {
        Self { codec, level: codec.default_level() }
    }

    pub fn with_level(codec: CodecId, level: i32) -> Self {
        Self { codec, level }
    }

    pub fn none() -> Self { Self::new(CodecId::None) }
    pub fn gzip() -> Self { Self::new(CodecId::Gzip) }
    pub fn zstd() -> Self { Self::new(CodecId::Zstd) }

    pub fn validate(&self) -> Result<()> {
        let (min, max) = self.codec.level_range();
        if self.level < min || self.level > max {
            return Err(Error::InvalidLevel {
                codec: self.codec.name(),
                level: self.level,
                min,
                max,
            });
        }
        Ok(())
    }

    /// Compress all of `src` into `dst` and hand `dst` back once the codec
    /// trailer is written. Returns the number of plaintext bytes consumed.
    pub fn encode<R, W>(&self, src: &mut R, mut dst: W) -> io::Result<(u64, W)>
    where
        R: Read + ?Sized,
        W: Write,
    {
        match self.codec {
            CodecId::None => {
                let n = io::copy(src, &mut dst)?;
                Ok((n, dst))
            }
            CodecId::Gzip => {
                let level = flate2::Compression::new(self.level as u32);
                let mut enc = GzEncoder::new(dst, level);
                let n = io::copy(src, &mut enc)?;
                Ok((n, enc.finish()?))
            }
            CodecId::Zstd => {
                let mut enc = zstd::stream::write::Encoder::new(dst, self.level)?;
                let n = io::copy(src, &mut enc)?;
                Ok((n, enc.finish()?))
            }
        }
    }

    pub fn decoder<'a, R: Read + 'a>(&self, src: R) -> io::Result<Box<dyn Read + 'a>> {
        self.codec.decoder(src)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(c: Compression, data: &[u8]) -> Vec<u8> {
        let (n, encoded) = c.encode(&mut &data[..], Vec::new()).unwrap();
        assert_eq!(n, data.len() as u64);
        let mut out = Vec::new();
        c.decoder(&encoded[..]).unwrap().read_to_end(&mut out).unwrap();
        out
    }

    #[test]
    fn every_codec_roundtrips() {
        let data = b"layer bytes layer bytes layer bytes".repeat(64);
        for c in [Compression::none(), Compression::gzip(), Compression::zstd()] {
            assert_eq!(roundtrip(c, &data), data, "{}", c.codec.name());
        }
    }

    #[test]
    fn empty_input_roundtrips() {
        for c in [Compression::none(), Compression::gzip(), Compression::zstd()] {
            assert!(roundtrip(c, b"").is_empty());
        }
    }

    #[test]
    fn gzip_output_has_magic() {
        let (_, encoded) = Compression::gzip().encode(&mut &b"abc"[..], Vec::new()).unwrap();
        assert_eq!(&encoded[..2], &[0x1f, 0x8b]);
    }

    #[test]
    fn sniff_recognises_encoded_output() {
        for c in [Compression::none(), Compression::gzip(), Compression::zstd()] {
            let (_, encoded) = c.encode(&mut &b"sniffed payload"[..], Vec::new()).unwrap();
            assert_eq!(CodecId::sniff(&encoded[..MAGIC_LEN]), c.codec);
        }
        assert_eq!(CodecId::sniff(b""), CodecId::None);
        assert_eq!(CodecId::sniff(&[0x1f]), CodecId::None);
    }

    #[test]
    fn level_validation() {
        assert!(Compression::with_level(CodecId::Gzip, 9).validate().is_ok());
        assert!(Compression::with_level(CodecId::Gzip, 10).validate().is_err());
        assert!(Compression::with_level(CodecId::Zstd, 0).validate().is_err());
        assert!(Compression::with_level(CodecId::None, 3).validate().is_err());
        assert!(Compression::default().validate().is_ok());
    }

    #[test]
    fn names_roundtrip() {
        for id in [CodecId::None, CodecId::Gzip, CodecId::Zstd] {
            assert_eq!(CodecId::from_name(id.name()), Some(id));
        }
        assert_eq!(CodecId::from_name("lz4"), None);
    }
}
