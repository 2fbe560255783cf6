//! Legacy RLE0 run-length codec, decode-only
//!
//! RLE0 predates ZLC in the archive format and survives only so old archives
//! keep extracting. A stream is a 24-byte header followed either by the raw
//! original bytes (`is_compressed == 0`) or by a token stream. Each token
//! byte selects a mode in its top 2 bits: mode 0 copies a literal run of
//! low-6-bits bytes (0 meaning 64), modes 1-3 repeat the next `mode` bytes
//! low-6-bits+1 times.
//!
//! Encoding was never implemented by the original tool and stays
//! unsupported here; [`Rle0::compress`] fails explicitly rather than
//! silently storing.

use crate::codec::Codec;
use crate::error::{Error, Result};

/// RLE0 stream signature bytes.
pub const MAGIC: [u8; 4] = *b"RLE0";

/// Size of the stream header.
pub const HEADER_SIZE: usize = 24;

/// Header of an RLE0 stream.
#[derive(Debug, Clone, Copy)]
struct Rle0Header {
    /// Bit depth of the original asset. Carried but unused by decode.
    #[allow(dead_code)]
    depth: u32,
    /// Length of the token stream. Carried but unused by decode; the output
    /// bound governs termination.
    #[allow(dead_code)]
    compressed_length: u32,
    original_length: u32,
    is_compressed: u32,
}

impl Rle0Header {
    /// Parse the fixed header. Returns `None` when the input is too short
    /// or the signature does not match.
    fn parse(input: &[u8]) -> Option<Self> {
        if input.len() < HEADER_SIZE || input[..4] != MAGIC {
            return None;
        }
        let word = |at: usize| {
            u32::from_le_bytes([input[at], input[at + 1], input[at + 2], input[at + 3]])
        };
        Some(Self {
            depth: word(4),
            compressed_length: word(8),
            original_length: word(12),
            is_compressed: word(16),
        })
    }
}

/// The RLE0 codec (decode-only).
#[derive(Debug, Clone, Copy, Default)]
pub struct Rle0;

impl Rle0 {
    /// Create the decoder.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Decompress an RLE0 stream.
    ///
    /// Input without the RLE0 signature (or shorter than the header) is
    /// returned unchanged. Truncated token streams stop early and yield a
    /// zero-padded result of the declared size.
    #[must_use]
    pub fn decompress(input: &[u8]) -> Vec<u8> {
        let Some(header) = Rle0Header::parse(input) else {
            return input.to_vec();
        };

        let mut out = vec![0u8; header.original_length as usize];
        let body = &input[HEADER_SIZE..];

        if header.is_compressed == 0 {
            let n = out.len().min(body.len());
            out[..n].copy_from_slice(&body[..n]);
            return out;
        }

        let mut p = 0;
        let mut out_p = 0;
        while out_p < out.len() && p < body.len() {
            let token = body[p];
            p += 1;
            let mut n = usize::from(token & 0x3F);
            if n == 0 {
                n = 0x40;
            }

            match usize::from(token >> 6) {
                0 => {
                    // literal run of n bytes
                    while n > 0 && out_p < out.len() && p < body.len() {
                        out[out_p] = body[p];
                        out_p += 1;
                        p += 1;
                        n -= 1;
                    }
                }
                mode => {
                    // repeat the next `mode` bytes n+1 times
                    if p + mode > body.len() {
                        break;
                    }
                    for _ in 0..=n {
                        for i in 0..mode {
                            if out_p >= out.len() {
                                break;
                            }
                            out[out_p] = body[p + i];
                            out_p += 1;
                        }
                    }
                    p += mode;
                }
            }
        }

        out
    }
}

impl Codec for Rle0 {
    fn compress(&self, _input: &[u8]) -> Result<Vec<u8>> {
        Err(Error::RleCompressionUnsupported)
    }

    fn decompress(&self, input: &[u8]) -> Result<Vec<u8>> {
        Ok(Rle0::decompress(input))
    }
}
