//! # mirror-core
//!
//! Streaming and control core for mirroring an Android device over an
//! adb port forward.
//!
//! This crate contains:
//! - **Video**: `StreamDemuxer` for the length-prefixed video stream,
//!   `DecodePipeline` for the dedicated decode worker, pluggable
//!   `FrameCodec`s and YUV → BGRA conversion
//! - **Control**: `ControlMessage` wire encoding, `InputTranslator` and
//!   the non-blocking `ControlSender`
//! - **Remote**: `RemoteExecutor` (adb), device listing, server options
//! - **Session**: `SessionOrchestrator` driving push → forward → start →
//!   connect with retry, and idempotent teardown
//! - **Error**: `MirrorError`, a typed `thiserror` hierarchy

pub mod control;
pub mod error;
pub mod event;
pub mod remote;
pub mod session;
pub mod video;

// ── Re-exports for ergonomic usage ───────────────────────────────

pub use control::{
    ControlMessage, ControlSender, InputEvent, InputTranslator, Key, Modifiers, SendOutcome,
};
pub use error::{CodecError, FramingError, MirrorError};
pub use event::{EVENT_CHANNEL_CAPACITY, MirrorEvent};
pub use remote::{AdbExecutor, DeviceInfo, DeviceStatus, RemoteExecutor, ServerOptions};
pub use session::{SessionConfig, SessionHandle, SessionOrchestrator, SessionState, TcpDialer};
pub use video::{
    DecodePipeline, DecodedFrame, DefaultCodecFactory, DemuxLimits, StreamDemuxer, VideoCodec,
};
