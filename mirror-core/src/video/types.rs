//! Shared types for the receive/decode pipeline.
//!
//! [`VideoPacket`] is what the demuxer hands to the codec;
//! [`DecodedFrame`] is what the pipeline hands to the presentation
//! layer. Both move by value, never by shared reference.

use std::fmt;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

// ── PixelFormat ──────────────────────────────────────────────────

/// Pixel layout of decoded display frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// 4 bytes per pixel: Blue, Green, Red, Alpha (0xAARRGGBB in a
    /// little-endian `u32`, the usual "RGB32" display format).
    Bgra8,
}

impl PixelFormat {
    /// Bytes consumed by a single pixel in this format.
    pub const fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Bgra8 => 4,
        }
    }
}

// ── VideoCodec ───────────────────────────────────────────────────

/// Elementary-stream codec negotiated with the remote server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoCodec {
    #[default]
    H264,
    H265,
    Av1,
}

impl VideoCodec {
    /// Name used on the server command line.
    pub const fn as_str(self) -> &'static str {
        match self {
            VideoCodec::H264 => "h264",
            VideoCodec::H265 => "h265",
            VideoCodec::Av1 => "av1",
        }
    }
}

impl fmt::Display for VideoCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── VideoPacket ──────────────────────────────────────────────────

/// One compressed access unit cut out of the video stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoPacket {
    /// Compressed payload. Split off the receive buffer without copying.
    pub data: Bytes,
    /// Presentation timestamp in microseconds, when the header carried one.
    pub pts: Option<u64>,
    /// Whether the unit can be decoded without reference frames.
    pub keyframe: bool,
    /// Whether the unit is codec configuration (SPS/PPS) rather than a picture.
    pub config: bool,
}

impl VideoPacket {
    /// Payload length in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

// ── DecodedFrame ─────────────────────────────────────────────────

/// A decoded picture converted to the display pixel format.
///
/// `data` holds `height` tightly packed rows of
/// `width * format.bytes_per_pixel()` bytes.
#[derive(Clone, PartialEq, Eq)]
pub struct DecodedFrame {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Pixel layout.
    pub format: PixelFormat,
    /// Pixel data.
    pub data: Vec<u8>,
}

impl DecodedFrame {
    /// Bytes per row.
    pub fn stride(&self) -> usize {
        self.width as usize * self.format.bytes_per_pixel()
    }

    /// Returns the pixel bytes at `(x, y)`.
    ///
    /// # Panics
    ///
    /// Panics if `(x, y)` is out of bounds.
    pub fn pixel(&self, x: u32, y: u32) -> &[u8] {
        let bpp = self.format.bytes_per_pixel();
        let offset = y as usize * self.stride() + x as usize * bpp;
        &self.data[offset..offset + bpp]
    }
}

impl fmt::Debug for DecodedFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecodedFrame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("format", &self.format)
            .field("len", &self.data.len())
            .finish()
    }
}
