//! Compression codecs
//!
//! The [`Codec`] trait is the seam between byte-buffer transforms and the
//! rest of the tool: the pipeline and the archive reader/writer only ever
//! see `compress`/`decompress` over owned byte buffers. Concrete codecs are
//! [`Zlc`] (the archive's LZ77 variant), [`Rle0`] (legacy, decode-only) and
//! [`FpkPayloadCodec`] (the chain an archive entry actually goes through).

pub mod dict;
pub mod rle;
pub mod zlc;

pub use dict::MatchDictionary;
pub use rle::Rle0;
pub use zlc::Zlc;

use crate::error::Result;

/// A byte-buffer compression capability.
pub trait Codec {
    /// Compress `input` into the codec's stream format.
    fn compress(&self, input: &[u8]) -> Result<Vec<u8>>;

    /// Decompress a stream produced by this codec.
    fn decompress(&self, input: &[u8]) -> Result<Vec<u8>>;
}

/// The transform applied to one FPK archive entry.
///
/// Decoding always attempts RLE0 first and ZLC second; both pass unknown
/// data through untouched, so an entry stored with one, both, or neither
/// transform decodes correctly without any extra signaling in the TOC.
/// Encoding applies ZLC unless disabled, in which case entries are stored
/// raw (old extractors still read them thanks to the same pass-through
/// rule).
#[derive(Debug, Clone, Copy)]
pub struct FpkPayloadCodec {
    zlc: bool,
}

impl Default for FpkPayloadCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl FpkPayloadCodec {
    /// Payload codec with ZLC compression enabled.
    #[must_use]
    pub fn new() -> Self {
        Self { zlc: true }
    }

    /// Payload codec that stores entries uncompressed.
    #[must_use]
    pub fn stored() -> Self {
        Self { zlc: false }
    }
}

impl Codec for FpkPayloadCodec {
    fn compress(&self, input: &[u8]) -> Result<Vec<u8>> {
        if self.zlc {
            Ok(Zlc::compress(input))
        } else {
            Ok(input.to_vec())
        }
    }

    fn decompress(&self, input: &[u8]) -> Result<Vec<u8>> {
        Ok(Zlc::decompress(&Rle0::decompress(input)))
    }
}
