//! Raw frame container.
//!
//! A persisted file is the selected buffer's bytes, optionally preceded by a 16-byte header
//! so another process can reinterpret them without knowing the pipeline's configuration:
//!
//! ```text
//! offset  size  field
//!      0     4  magic "FTF1"
//!      4     4  width          u32 little-endian
//!      8     4  height         u32 little-endian
//!     12     1  pixel format   0 = argb, 1 = rgb
//!     13     1  element type   0 = uint8, 1 = float32
//!     14     2  reserved       zero
//!     16     …  pixel data, row-major, tightly packed
//! ```
//!
//! Headerless files carry no layout; their reader must already know it.

use std::path::Path;

use frame_scale::pixel::{BufferMetadata, ElementType, PixelBuffer, PixelFormat};

use crate::error::{FrameError, FrameResult};

pub const MAGIC: [u8; 4] = *b"FTF1";
pub const HEADER_LEN: usize = 16;

/// Encode `meta` as a container header.
pub fn encode_header(meta: &BufferMetadata) -> [u8; HEADER_LEN] {
    let mut header = [0u8; HEADER_LEN];
    header[0..4].copy_from_slice(&MAGIC);
    header[4..8].copy_from_slice(&meta.width.to_le_bytes());
    header[8..12].copy_from_slice(&meta.height.to_le_bytes());
    header[12] = meta.pixel_format.code();
    header[13] = meta.element_type.code();
    header
}

/// Decode the header at the start of `bytes`.
pub fn decode_header(bytes: &[u8]) -> FrameResult<BufferMetadata> {
    if bytes.len() < HEADER_LEN || bytes[0..4] != MAGIC {
        return Err(FrameError::missing_metadata("file does not start with an FTF1 header"));
    }
    let u32_at = |at: usize| u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]]);
    let pixel_format = PixelFormat::from_code(bytes[12]).ok_or_else(|| {
        FrameError::missing_metadata(format!("unknown pixel format code {}", bytes[12]))
    })?;
    let element_type = ElementType::from_code(bytes[13]).ok_or_else(|| {
        FrameError::missing_metadata(format!("unknown element type code {}", bytes[13]))
    })?;
    Ok(BufferMetadata::new(u32_at(4), u32_at(8), pixel_format, element_type))
}

/// Read a headered file back into a buffer.
pub fn read_persisted(path: impl AsRef<Path>) -> FrameResult<PixelBuffer> {
    let path = path.as_ref();
    let mut bytes = std::fs::read(path).map_err(|e| FrameError::io_at("read frame", path, e))?;
    let meta = decode_header(&bytes).map_err(|e| e.with_context(path.display().to_string()))?;
    let data = bytes.split_off(HEADER_LEN);
    Ok(PixelBuffer::new(data, meta)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_layout_is_little_endian() {
        let meta = BufferMetadata::new(0x0102, 0x0304, PixelFormat::Rgb, ElementType::Float32);
        let h = encode_header(&meta);
        assert_eq!(&h[0..4], b"FTF1");
        assert_eq!(&h[4..8], &[0x02, 0x01, 0, 0]);
        assert_eq!(&h[8..12], &[0x04, 0x03, 0, 0]);
        assert_eq!((h[12], h[13]), (1, 1));
        assert_eq!(&h[14..16], &[0, 0]);
        assert_eq!(decode_header(&h).unwrap(), meta);
    }

    #[test]
    fn rejects_headerless_bytes() {
        assert!(matches!(
            decode_header(&[0u8; 32]),
            Err(FrameError::MissingMetadata { .. })
        ));
        assert!(decode_header(b"FTF1").is_err());
    }

    #[test]
    fn rejects_unknown_codes() {
        let mut h = encode_header(&BufferMetadata::argb8(1, 1));
        h[12] = 7;
        assert!(decode_header(&h).is_err());
    }

    #[test]
    fn truncated_file_is_a_length_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("short.raw");
        let mut bytes = encode_header(&BufferMetadata::argb8(2, 2)).to_vec();
        bytes.extend_from_slice(&[0; 10]);
        std::fs::write(&path, bytes).unwrap();
        assert!(matches!(
            read_persisted(&path),
            Err(FrameError::BufferMismatch { expected: 16, actual: 10, .. })
        ));
    }
}
