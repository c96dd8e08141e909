//! Frame codec abstraction.
//!
//! The decoder itself is opaque: a compressed [`VideoPacket`] goes in,
//! zero or more planar YUV 4:2:0 pictures come out through a sink.
//! Pictures borrow decoder-owned memory, so they only live for the
//! duration of the sink call.

use serde::{Deserialize, Serialize};

use crate::error::CodecError;
use crate::video::types::{VideoCodec, VideoPacket};

// ── YuvFrame ─────────────────────────────────────────────────────

/// A borrowed planar YUV 4:2:0 picture.
#[derive(Debug, Clone, Copy)]
pub struct YuvFrame<'a> {
    pub width: u32,
    pub height: u32,
    pub y: &'a [u8],
    pub u: &'a [u8],
    pub v: &'a [u8],
    /// Row pitch of the luma plane in bytes.
    pub y_stride: usize,
    /// Row pitch of both chroma planes in bytes.
    pub uv_stride: usize,
}

// ── CodecOptions ─────────────────────────────────────────────────

/// Decoder tuning. Latency wins over throughput.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecOptions {
    /// Disable frame reordering / B-frame buffering where supported.
    pub low_delay: bool,
    /// Decode threads; 0 asks the codec for all available parallelism.
    pub threads: usize,
}

impl Default for CodecOptions {
    fn default() -> Self {
        Self {
            low_delay: true,
            threads: 0,
        }
    }
}

// ── FrameCodec ───────────────────────────────────────────────────

/// A stateful decoder instance, owned by exactly one decode worker.
pub trait FrameCodec {
    /// Consume `packet` and hand every picture it completes to `sink`.
    ///
    /// Returns the number of pictures produced. A codec may buffer and
    /// produce nothing for a packet, or release several at once.
    fn decode(
        &mut self,
        packet: VideoPacket,
        sink: &mut dyn FnMut(YuvFrame<'_>),
    ) -> Result<usize, CodecError>;
}

impl<C: FrameCodec + ?Sized> FrameCodec for Box<C> {
    fn decode(
        &mut self,
        packet: VideoPacket,
        sink: &mut dyn FnMut(YuvFrame<'_>),
    ) -> Result<usize, CodecError> {
        (**self).decode(packet, sink)
    }
}

/// Opens codec instances on the decode worker.
///
/// The factory crosses into the worker; the codec it creates never
/// leaves it, so codecs need not be `Send`.
pub trait CodecFactory: Send + Sync {
    fn open(
        &self,
        codec: VideoCodec,
        options: &CodecOptions,
    ) -> Result<Box<dyn FrameCodec>, CodecError>;
}

/// The codec factory compiled into this build.
///
/// With the `h264` feature this is the openh264 decoder; otherwise every
/// codec reports [`CodecError::Unsupported`].
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultCodecFactory;

impl CodecFactory for DefaultCodecFactory {
    fn open(
        &self,
        codec: VideoCodec,
        options: &CodecOptions,
    ) -> Result<Box<dyn FrameCodec>, CodecError> {
        match codec {
            #[cfg(feature = "h264")]
            VideoCodec::H264 => Ok(Box::new(crate::video::h264::H264Codec::new(options)?)),
            other => {
                let _ = options;
                Err(CodecError::Unsupported(other.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(not(feature = "h264"))]
    #[test]
    fn default_factory_without_decoder_is_unsupported() {
        let err = DefaultCodecFactory
            .open(VideoCodec::H264, &CodecOptions::default())
            .err()
            .unwrap();
        assert_eq!(err, CodecError::Unsupported("h264".into()));
    }

    #[test]
    fn av1_is_unsupported() {
        let err = DefaultCodecFactory
            .open(VideoCodec::Av1, &CodecOptions::default())
            .err()
            .unwrap();
        assert!(matches!(err, CodecError::Unsupported(_)));
    }
}
