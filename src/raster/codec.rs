//! Raster codec seam.
//!
//! Slice-file formats each bring their own image encoding; the layer model
//! only needs `encode`/`decode`. [`DeflateCodec`] is the reference codec used
//! when no format-specific one is supplied: an 8-byte little-endian size
//! header followed by the zlib-compressed pixel rows.

use super::{GrayImage, Raster};
use crate::geometry::Size;
use crate::layer_error::LayerError;
use bytes::Bytes;
use flate2::Compression;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use std::io::{Read, Write};

/// Encodes rasters to compressed buffers and back.
pub trait RasterCodec: Send + Sync {
    /// Compress `raster` into an owned buffer.
    fn encode(&self, raster: &Raster) -> Result<Bytes, LayerError>;
    /// Decompress `bytes` into a raster.
    fn decode(&self, bytes: &[u8]) -> Result<Raster, LayerError>;
}

const HEADER_LEN: usize = 8;

/// Zlib-backed reference codec.
#[derive(Clone, Copy, Debug)]
pub struct DeflateCodec {
    level: Compression,
}

impl DeflateCodec {
    pub fn new(level: u32) -> Self {
        Self {
            level: Compression::new(level.min(9)),
        }
    }
}

impl Default for DeflateCodec {
    fn default() -> Self {
        Self {
            level: Compression::fast(),
        }
    }
}

impl RasterCodec for DeflateCodec {
    fn encode(&self, raster: &Raster) -> Result<Bytes, LayerError> {
        let mut out = Vec::with_capacity(HEADER_LEN + raster.pixels().len() / 8);
        out.extend_from_slice(&raster.width().to_le_bytes());
        out.extend_from_slice(&raster.height().to_le_bytes());
        let mut encoder = ZlibEncoder::new(out, self.level);
        encoder
            .write_all(raster.pixels())
            .map_err(|e| LayerError::Codec(e.to_string()))?;
        let out = encoder
            .finish()
            .map_err(|e| LayerError::Codec(e.to_string()))?;
        Ok(Bytes::from(out))
    }

    fn decode(&self, bytes: &[u8]) -> Result<Raster, LayerError> {
        if bytes.len() < HEADER_LEN {
            return Err(LayerError::Codec(format!(
                "buffer of {} bytes is shorter than the header",
                bytes.len()
            )));
        }
        let (header, body) = bytes.split_at(HEADER_LEN);
        let width = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
        let height = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);
        let size = Size::new(width, height);
        let mut data = Vec::with_capacity(size.area() as usize);
        ZlibDecoder::new(body)
            .read_to_end(&mut data)
            .map_err(|e| LayerError::Codec(e.to_string()))?;
        if data.len() as u64 != size.area() {
            return Err(LayerError::Codec(format!(
                "decoded {} bytes for a {size} raster",
                data.len()
            )));
        }
        GrayImage::from_raw(width, height, data)
            .map(Raster::from)
            .ok_or_else(|| LayerError::Codec(format!("invalid raster size {size}")))
    }
}
