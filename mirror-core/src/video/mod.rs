//! Video receive path: demux, decode and convert.

pub mod codec;
pub mod convert;
pub mod demux;
#[cfg(feature = "h264")]
pub mod h264;
pub mod pipeline;
pub mod types;

pub use codec::{CodecFactory, CodecOptions, DefaultCodecFactory, FrameCodec, YuvFrame};
pub use convert::{ConverterCache, PixelConverter};
pub use demux::{DemuxCodec, DemuxEvent, DemuxLimits, DemuxState, StreamDemuxer};
pub use pipeline::{DecodePipeline, PipelineConfig, PipelineExit, PipelineStats};
pub use types::{DecodedFrame, PixelFormat, VideoCodec, VideoPacket};
