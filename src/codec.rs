//! Payload compression.
//!
//! The relay treats the codec as a black-box byte transform. [`ZstdCompressor`] is
//! the production implementation; anything implementing [`Compressor`] can be
//! plugged into the bridge.

use crate::{RelayError, Result};

/// Default zstd compression level
pub const DEFAULT_COMPRESSION_LEVEL: i32 = 3;

/// Byte-to-byte compression used for outbound payloads.
pub trait Compressor: Send + Sync + 'static {
    fn compress(&self, input: &[u8]) -> Result<Vec<u8>>;
}

/// Zstandard compressor.
#[derive(Debug, Clone, Copy)]
pub struct ZstdCompressor {
    level: i32,
}

impl ZstdCompressor {
    pub fn new(level: i32) -> Self {
        Self { level }
    }

    pub fn level(&self) -> i32 {
        self.level
    }
}

impl Default for ZstdCompressor {
    fn default() -> Self {
        Self::new(DEFAULT_COMPRESSION_LEVEL)
    }
}

impl Compressor for ZstdCompressor {
    fn compress(&self, input: &[u8]) -> Result<Vec<u8>> {
        zstd::stream::encode_all(input, self.level)
            .map_err(|source| RelayError::Compression { source })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zstd_output_decodes_to_input() {
        let input = br#"{"x":[1.0,2.0],"y":[3.0,4.0],"z":[5.0,6.0]}"#.repeat(50);
        let compressed = ZstdCompressor::default().compress(&input).unwrap();

        assert!(compressed.len() < input.len());
        assert_eq!(zstd::stream::decode_all(compressed.as_slice()).unwrap(), input);
    }

    #[test]
    fn empty_input_is_a_valid_frame() {
        let compressed = ZstdCompressor::new(1).compress(&[]).unwrap();
        assert!(zstd::stream::decode_all(compressed.as_slice()).unwrap().is_empty());
    }
}
