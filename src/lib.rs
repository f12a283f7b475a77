pub mod error;
pub mod digest;
pub mod codec;
pub mod config;
pub mod manifest;
pub mod index;
pub mod io_stream;
pub mod archive;

pub use archive::Builder;
pub use codec::{CodecId, Compression};
pub use config::{ArchiveOptions, Mode};
pub use digest::{sha256_digest, ContentDigest, DigestAlgorithm};
pub use error::{Error, ErrorClass, Result};
pub use index::{BlobIndex, BlobLocation};
pub use io_stream::{BlobStream, Reader, Writer};
pub use manifest::{Info, Manifest};
