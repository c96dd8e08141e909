//! openh264-backed H.264 decoder.
//!
//! openh264 decodes one access unit per call and has no B-frame
//! reordering for the baseline/main streams the device encoder emits,
//! so the low-delay hint is inherent. Decoding is single-threaded.

use openh264::decoder::Decoder;
use openh264::formats::YUVSource;
use tracing::debug;

use crate::error::CodecError;
use crate::video::codec::{CodecOptions, FrameCodec, YuvFrame};
use crate::video::types::VideoPacket;

pub struct H264Codec {
    decoder: Decoder,
}

impl H264Codec {
    pub fn new(options: &CodecOptions) -> Result<Self, CodecError> {
        let decoder = Decoder::new().map_err(|e| CodecError::Setup(e.to_string()))?;
        debug!(
            low_delay = options.low_delay,
            threads = options.threads,
            "openh264 decoder ready"
        );
        Ok(Self { decoder })
    }
}

impl FrameCodec for H264Codec {
    fn decode(
        &mut self,
        packet: VideoPacket,
        sink: &mut dyn FnMut(YuvFrame<'_>),
    ) -> Result<usize, CodecError> {
        let decoded = self
            .decoder
            .decode(&packet.data)
            .map_err(|e| CodecError::Rejected(e.to_string()))?;

        let Some(yuv) = decoded else {
            return Ok(0);
        };

        let (width, height) = yuv.dimensions();
        let (y_stride, uv_stride, _) = yuv.strides();
        sink(YuvFrame {
            width: width as u32,
            height: height as u32,
            y: yuv.y(),
            u: yuv.u(),
            v: yuv.v(),
            y_stride,
            uv_stride,
        });
        Ok(1)
    }
}
