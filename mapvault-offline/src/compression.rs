//! zlib helpers for cached payload blobs.

use std::io::{self, Read, Write};

use flate2::Compression;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;

/// Deflate `data`; the caller decides whether the result is worth storing.
pub(crate) fn compress(data: &[u8]) -> io::Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    encoder.finish()
}

/// Inflate a blob stored with the compressed flag set.
pub(crate) fn decompress(data: &[u8]) -> io::Result<Vec<u8>> {
    let mut decoded = Vec::new();
    ZlibDecoder::new(data).read_to_end(&mut decoded)?;
    Ok(decoded)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_payloads() {
        let payload = b"the quick brown fox jumps over the lazy dog".repeat(16);
        let packed = compress(&payload).expect("compress");
        assert!(packed.len() < payload.len());
        assert_eq!(decompress(&packed).expect("decompress"), payload);
    }

    #[test]
    fn rejects_corrupt_input() {
        assert!(decompress(b"not a zlib stream").is_err());
    }
}
