//! Incremental demuxer for the video socket byte stream.
//!
//! ## Wire format
//!
//! ```text
//! preamble:      u8        (1)   discarded
//! device name:   [u8; 64]  (64)  NUL-padded UTF-8
//! stream header: codec_id u32 | width u32 | height u32      (12)
//! packet*:       pts_flags u64 | length u32 (12) + payload (length)
//! ```
//!
//! All integers are big-endian. A packet length of zero is a
//! configuration record without payload and produces no event.
//!
//! The parser is a pure [`transition`] from `(state, buffered bytes)` to
//! `(next state, bytes consumed, output)`. [`DemuxCodec`] drives it as a
//! `tokio_util` [`Decoder`], and [`StreamDemuxer`] owns the receive
//! buffer for callers that push raw chunks.

use bytes::{Buf, BytesMut};
use serde::{Deserialize, Serialize};
use tokio_util::codec::Decoder;
use tracing::{debug, trace};

use crate::error::{FramingError, MirrorError};
use crate::video::types::VideoPacket;

// ── Constants ────────────────────────────────────────────────────

pub const PREAMBLE_LEN: usize = 1;
pub const DEVICE_NAME_LEN: usize = 64;
pub const STREAM_HEADER_LEN: usize = 12;
pub const PACKET_HEADER_LEN: usize = 12;

/// Initial receive buffer reservation.
pub const INITIAL_BUFFER_CAPACITY: usize = 512 * 1024;

const PACKET_FLAG_CONFIG: u64 = 1 << 63;
const PACKET_FLAG_KEY_FRAME: u64 = 1 << 62;
const PTS_MASK: u64 = PACKET_FLAG_KEY_FRAME - 1;

// ── DemuxLimits ──────────────────────────────────────────────────

/// Operational sanity ceilings. Not protocol constants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DemuxLimits {
    /// Largest accepted width or height.
    pub max_dimension: u32,
    /// Largest accepted packet payload in bytes.
    pub max_payload: u32,
}

impl Default for DemuxLimits {
    fn default() -> Self {
        Self {
            max_dimension: 8192,
            max_payload: 5 * 1024 * 1024,
        }
    }
}

// ── DemuxState ───────────────────────────────────────────────────

/// Position of the parser within the stream layout.
///
/// ```text
///  AwaitingPreamble ─► AwaitingDeviceName ─► AwaitingResolution
///                                                   │
///        ┌──────────────────────────────────────────┘
///        ▼
///  AwaitingPacketHeader ◄──► AwaitingPacketPayload
///
///  (any) ──framing error──► Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DemuxState {
    #[default]
    AwaitingPreamble,
    AwaitingDeviceName,
    AwaitingResolution,
    AwaitingPacketHeader,
    AwaitingPacketPayload {
        size: usize,
        pts_flags: u64,
    },
    /// Terminal: a framing error aborted the stream.
    Failed,
}

impl DemuxState {
    /// Bytes that must be buffered before this state can advance.
    pub fn required_len(&self) -> usize {
        match self {
            Self::AwaitingPreamble => PREAMBLE_LEN,
            Self::AwaitingDeviceName => DEVICE_NAME_LEN,
            Self::AwaitingResolution => STREAM_HEADER_LEN,
            Self::AwaitingPacketHeader => PACKET_HEADER_LEN,
            Self::AwaitingPacketPayload { size, .. } => *size,
            Self::Failed => 0,
        }
    }
}

// ── DemuxEvent ───────────────────────────────────────────────────

/// A typed record extracted from the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DemuxEvent {
    DeviceNameReady(String),
    ResolutionReady { width: u32, height: u32 },
    Packet(VideoPacket),
}

// ── Transition ───────────────────────────────────────────────────

/// What a successful step produces, before any bytes are split off.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Output {
    None,
    DeviceName(String),
    Resolution { width: u32, height: u32 },
    /// The consumed bytes are the packet payload.
    Packet { pts_flags: u64 },
}

/// Result of one parser step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Not enough bytes buffered for the current state.
    NeedMore,
    Advance {
        next: DemuxState,
        consume: usize,
        output: Output,
    },
}

/// Compute the next parser step without touching the buffer.
pub fn transition(
    state: &DemuxState,
    buf: &[u8],
    limits: &DemuxLimits,
) -> Result<Transition, FramingError> {
    if buf.len() < state.required_len() {
        return Ok(Transition::NeedMore);
    }

    let step = match *state {
        DemuxState::AwaitingPreamble => Transition::Advance {
            next: DemuxState::AwaitingDeviceName,
            consume: PREAMBLE_LEN,
            output: Output::None,
        },
        DemuxState::AwaitingDeviceName => Transition::Advance {
            next: DemuxState::AwaitingResolution,
            consume: DEVICE_NAME_LEN,
            output: Output::DeviceName(parse_device_name(&buf[..DEVICE_NAME_LEN])),
        },
        DemuxState::AwaitingResolution => {
            let width = read_be32(&buf[4..8]);
            let height = read_be32(&buf[8..12]);
            let max = limits.max_dimension;
            if width == 0 || height == 0 || width > max || height > max {
                return Err(FramingError::InvalidResolution { width, height, max });
            }
            Transition::Advance {
                next: DemuxState::AwaitingPacketHeader,
                consume: STREAM_HEADER_LEN,
                output: Output::Resolution { width, height },
            }
        }
        DemuxState::AwaitingPacketHeader => {
            let pts_flags = read_be64(&buf[0..8]);
            let size = read_be32(&buf[8..12]);
            if size > limits.max_payload {
                return Err(FramingError::PayloadTooLarge {
                    size,
                    max: limits.max_payload,
                });
            }
            let next = if size == 0 {
                DemuxState::AwaitingPacketHeader
            } else {
                DemuxState::AwaitingPacketPayload {
                    size: size as usize,
                    pts_flags,
                }
            };
            Transition::Advance {
                next,
                consume: PACKET_HEADER_LEN,
                output: Output::None,
            }
        }
        DemuxState::AwaitingPacketPayload { size, pts_flags } => Transition::Advance {
            next: DemuxState::AwaitingPacketHeader,
            consume: size,
            output: Output::Packet { pts_flags },
        },
        DemuxState::Failed => return Err(FramingError::Aborted),
    };
    Ok(step)
}

/// Device name: bytes before the first NUL, lossily decoded, trimmed.
pub fn parse_device_name(field: &[u8]) -> String {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    String::from_utf8_lossy(&field[..end]).trim().to_string()
}

fn read_be32(b: &[u8]) -> u32 {
    u32::from_be_bytes([b[0], b[1], b[2], b[3]])
}

fn read_be64(b: &[u8]) -> u64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&b[..8]);
    u64::from_be_bytes(raw)
}

fn packet_from(data: BytesMut, pts_flags: u64) -> VideoPacket {
    let config = pts_flags & PACKET_FLAG_CONFIG != 0;
    VideoPacket {
        data: data.freeze(),
        pts: (!config).then_some(pts_flags & PTS_MASK),
        keyframe: pts_flags & PACKET_FLAG_KEY_FRAME != 0,
        config,
    }
}

// ── DemuxCodec ───────────────────────────────────────────────────

/// `tokio_util` decoder over the stream layout.
#[derive(Debug, Default)]
pub struct DemuxCodec {
    state: DemuxState,
    limits: DemuxLimits,
}

impl DemuxCodec {
    pub fn new(limits: DemuxLimits) -> Self {
        Self {
            state: DemuxState::AwaitingPreamble,
            limits,
        }
    }

    pub fn state(&self) -> DemuxState {
        self.state
    }
}

impl Decoder for DemuxCodec {
    type Item = DemuxEvent;
    type Error = MirrorError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            let step = match transition(&self.state, src, &self.limits) {
                Ok(step) => step,
                Err(e) => {
                    self.state = DemuxState::Failed;
                    return Err(e.into());
                }
            };

            let (next, consume, output) = match step {
                Transition::NeedMore => {
                    // Make room for the whole payload once.
                    let need = self.state.required_len();
                    if need > src.len() {
                        src.reserve(need - src.len());
                    }
                    return Ok(None);
                }
                Transition::Advance {
                    next,
                    consume,
                    output,
                } => (next, consume, output),
            };

            trace!(from = ?self.state, to = ?next, consume, "demux transition");
            self.state = next;

            match output {
                Output::None => src.advance(consume),
                Output::DeviceName(name) => {
                    src.advance(consume);
                    debug!(%name, "device name received");
                    return Ok(Some(DemuxEvent::DeviceNameReady(name)));
                }
                Output::Resolution { width, height } => {
                    src.advance(consume);
                    debug!(width, height, "stream resolution received");
                    return Ok(Some(DemuxEvent::ResolutionReady { width, height }));
                }
                Output::Packet { pts_flags } => {
                    let payload = src.split_to(consume);
                    return Ok(Some(DemuxEvent::Packet(packet_from(payload, pts_flags))));
                }
            }
        }
    }
}

// ── StreamDemuxer ────────────────────────────────────────────────

/// Owns the receive buffer and the parser state for one stream.
///
/// Bytes are appended at the tail and consumed from the head; consumed
/// bytes are never parsed twice.
#[derive(Debug)]
pub struct StreamDemuxer {
    codec: DemuxCodec,
    buffer: BytesMut,
}

impl StreamDemuxer {
    pub fn new(limits: DemuxLimits) -> Self {
        Self {
            codec: DemuxCodec::new(limits),
            buffer: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
        }
    }

    /// Append `data` and push every event that is now complete into
    /// `events`.
    ///
    /// On a framing error the events produced before the violation are
    /// left in `events`; the demuxer is then dead and every later call
    /// fails with [`FramingError::Aborted`].
    pub fn feed(&mut self, data: &[u8], events: &mut Vec<DemuxEvent>) -> Result<(), MirrorError> {
        if self.codec.state == DemuxState::Failed {
            return Err(FramingError::Aborted.into());
        }
        self.buffer.extend_from_slice(data);
        while let Some(event) = self.codec.decode(&mut self.buffer)? {
            events.push(event);
        }
        Ok(())
    }

    pub fn state(&self) -> DemuxState {
        self.codec.state
    }

    /// Bytes received but not yet consumed.
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }
}

impl Default for StreamDemuxer {
    fn default() -> Self {
        Self::new(DemuxLimits::default())
    }
}

// ── Tests ────────────────────────────────────────────────────────
