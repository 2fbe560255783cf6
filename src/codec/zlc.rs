//! ZLC compression codec
//!
//! ZLC is an LZ77 variant with a 4096-byte sliding window. A stream is an
//! 8-byte header (magic `ZLC2` + original size as `u32` LE) followed by
//! groups of up to eight tokens. Each group starts with one flag byte read
//! MSB-first: bit 0 means one literal byte follows, bit 1 means a 2-byte
//! back-reference follows. A back-reference packs a 12-bit offset and a
//! 4-bit length-minus-3, so matches span 3..=18 bytes; the encoded offset 0
//! stands for the full window distance of 4096 (offset 1 is the minimum, so
//! zero is never a literal offset).
//!
//! Decoding a stream with a foreign magic returns the input unchanged. The
//! archive payload chain relies on this pass-through to handle entries that
//! were stored without the transform; [`Zlc::strict`] turns it into an
//! explicit error instead.

use crate::codec::dict::MatchDictionary;
use crate::codec::Codec;
use crate::error::{Error, Result};

/// ZLC stream magic bytes.
pub const MAGIC: [u8; 4] = *b"ZLC2";

/// Size of the stream header: magic + original size.
pub const HEADER_SIZE: usize = 8;

/// Sliding window size in bytes.
pub const WINDOW_SIZE: usize = 4096;

/// Minimum usable match length.
pub const MIN_MATCH: usize = 3;

/// Maximum match length (4-bit length field + minimum).
pub const MAX_MATCH: usize = MIN_MATCH + 15;

/// Pack a back-reference into its 2-byte wire form.
///
/// `distance` must be in `1..=4096` and `len` in `3..=18`.
fn encode_token(distance: usize, len: usize) -> [u8; 2] {
    debug_assert!((1..=WINDOW_SIZE).contains(&distance));
    debug_assert!((MIN_MATCH..=MAX_MATCH).contains(&len));
    let lo = (distance & 0xFF) as u8;
    let hi = (((distance >> 4) & 0xF0) | (len - MIN_MATCH)) as u8;
    [lo, hi]
}

/// Unpack a back-reference token into `(distance, len)`.
fn decode_token(lo: u8, hi: u8) -> (usize, usize) {
    let mut distance = usize::from(lo) | ((usize::from(hi) & 0xF0) << 4);
    let len = (usize::from(hi) & 0x0F) + MIN_MATCH;
    if distance == 0 {
        distance = WINDOW_SIZE;
    }
    (distance, len)
}

/// The ZLC codec.
#[derive(Debug, Clone, Copy, Default)]
pub struct Zlc {
    strict: bool,
}

impl Zlc {
    /// Create a codec with the original pass-through decode behavior.
    #[must_use]
    pub fn new() -> Self {
        Self { strict: false }
    }

    /// Create a codec that rejects streams with a foreign magic instead of
    /// passing them through.
    #[must_use]
    pub fn strict() -> Self {
        Self { strict: true }
    }

    /// Compress `input` into a ZLC stream.
    #[must_use]
    pub fn compress(input: &[u8]) -> Vec<u8> {
        // worst case is one flag byte per 8 literals; reserve generously
        let mut out = Vec::with_capacity((input.len() * 3).max(1024));
        out.extend_from_slice(&MAGIC);
        out.extend_from_slice(&(input.len() as u32).to_le_bytes());

        let mut dict = MatchDictionary::new();
        let mut pos = 0;
        let mut flag: u8 = 0;
        let mut flag_bit: u8 = 0x80;
        let mut flag_at = out.len();
        out.push(0); // first flag byte, filled in on flush

        while pos < input.len() {
            if flag_bit == 0 {
                out[flag_at] = flag;
                flag_at = out.len();
                out.push(0);
                flag = 0;
                flag_bit = 0x80;
            }

            let max_len = MAX_MATCH.min(input.len() - pos);
            let window_start = pos.saturating_sub(WINDOW_SIZE);

            match dict.find_best_match(input, pos, max_len, window_start) {
                (Some(start), len) if len >= MIN_MATCH => {
                    flag |= flag_bit;
                    out.extend_from_slice(&encode_token(pos - start, len));
                    // register every consumed byte so matches inside the
                    // just-emitted run stay discoverable
                    for _ in 0..len {
                        dict.add(input, pos);
                        pos += 1;
                    }
                }
                _ => {
                    dict.add(input, pos);
                    out.push(input[pos]);
                    pos += 1;
                }
            }
            flag_bit >>= 1;
        }
        out[flag_at] = flag;

        out
    }

    /// Decompress a ZLC stream.
    ///
    /// Input without the ZLC magic is returned unchanged. Truncated or
    /// inconsistent streams stop decoding early and yield a zero-padded
    /// result of the declared size.
    #[must_use]
    pub fn decompress(input: &[u8]) -> Vec<u8> {
        if input.len() < HEADER_SIZE || input[..4] != MAGIC {
            return input.to_vec();
        }
        let original_size =
            u32::from_le_bytes([input[4], input[5], input[6], input[7]]) as usize;

        let mut out = vec![0u8; original_size];
        let mut in_p = HEADER_SIZE;
        let mut out_p = 0;

        while in_p < input.len() && out_p < out.len() {
            let mut flags = input[in_p];
            in_p += 1;

            for _ in 0..8 {
                if in_p >= input.len() || out_p >= out.len() {
                    break;
                }
                if flags & 0x80 != 0 {
                    if input.len() - in_p < 2 {
                        break;
                    }
                    let (distance, len) = decode_token(input[in_p], input[in_p + 1]);
                    in_p += 2;

                    // byte-by-byte so overlapping references (distance < len)
                    // read the bytes written moments earlier
                    for _ in 0..len {
                        if out_p >= out.len() {
                            break;
                        }
                        let Some(src) = out_p.checked_sub(distance) else {
                            // reference before the start of output; only a
                            // corrupt stream gets here
                            break;
                        };
                        out[out_p] = out[src];
                        out_p += 1;
                    }
                } else {
                    out[out_p] = input[in_p];
                    out_p += 1;
                    in_p += 1;
                }
                flags <<= 1;
            }
        }

        out
    }
}

impl Codec for Zlc {
    fn compress(&self, input: &[u8]) -> Result<Vec<u8>> {
        Ok(Zlc::compress(input))
    }

    fn decompress(&self, input: &[u8]) -> Result<Vec<u8>> {
        if self.strict && (input.len() < HEADER_SIZE || input[..4] != MAGIC) {
            let mut found = [0u8; 4];
            let head = input.get(..4).unwrap_or_default();
            found[..head.len()].copy_from_slice(head);
            return Err(Error::InvalidMagic {
                codec: "ZLC",
                expected: MAGIC,
                found,
            });
        }
        Ok(Zlc::decompress(input))
    }
}
