//! Domain-specific error types for the mirroring core.
//!
//! Fatal failures travel as `Result<T, MirrorError>`. Outcomes that must
//! never stop a session (a rejected control send, a single bad packet)
//! are plain values or logged [`CodecError`]s instead.

use thiserror::Error;

// ── MirrorError ──────────────────────────────────────────────────

/// The canonical error type for a mirroring session.
#[derive(Debug, Error)]
pub enum MirrorError {
    // ── Framing Errors ───────────────────────────────────────────
    /// The video stream violated its fixed framing layout.
    #[error("framing error: {0}")]
    Framing(#[from] FramingError),

    // ── Codec Errors ─────────────────────────────────────────────
    /// The frame codec could not be initialised.
    #[error("decoder initialisation failed: {0}")]
    DecoderInit(#[source] CodecError),

    // ── Connection Errors ────────────────────────────────────────
    /// The TCP/IO layer reported an error.
    #[error("connection error: {0}")]
    Connection(#[from] std::io::Error),

    /// The video socket could not be connected in the allotted attempts.
    #[error("video socket not reachable after {attempts} attempts")]
    VideoConnectExhausted { attempts: u32 },

    /// The video socket closed after the stream had started.
    #[error("video stream closed by remote")]
    VideoClosed,

    /// An internal channel was closed unexpectedly.
    #[error("channel closed")]
    ChannelClosed,

    // ── Orchestration Errors ─────────────────────────────────────
    /// A remote command exited unsuccessfully.
    #[error("{step} failed (exit status {status:?}): {output}")]
    RemoteCommand {
        step: &'static str,
        status: Option<i32>,
        output: String,
    },

    /// A remote command could not be launched at all.
    #[error("{step} could not be launched: {source}")]
    RemoteLaunch {
        step: &'static str,
        #[source]
        source: std::io::Error,
    },

    /// A required local file is missing.
    #[error("missing local artifact: {0}")]
    MissingArtifact(String),

    /// A state transition was requested from an incompatible state.
    #[error("invalid session transition: {0}")]
    InvalidTransition(&'static str),

    /// Catch-all for errors that do not fit another variant.
    #[error("{0}")]
    Other(String),
}

// ── FramingError ─────────────────────────────────────────────────

/// Malformed or out-of-bounds fields in the video stream.
///
/// The stream carries no resync markers, so every variant is fatal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FramingError {
    /// Width or height is zero or exceeds the configured ceiling.
    #[error("invalid resolution {width}x{height} (max {max})")]
    InvalidResolution { width: u32, height: u32, max: u32 },

    /// A packet payload length exceeds the configured ceiling.
    #[error("packet payload too large: {size} bytes (max {max})")]
    PayloadTooLarge { size: u32, max: u32 },

    /// The demuxer already failed and refuses further input.
    #[error("stream already aborted")]
    Aborted,
}

// ── CodecError ───────────────────────────────────────────────────

/// Failures reported by a [`FrameCodec`](crate::video::FrameCodec).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// No decoder is available for the requested codec.
    #[error("no decoder available for {0}")]
    Unsupported(String),

    /// The decoder could not be created.
    #[error("decoder setup failed: {0}")]
    Setup(String),

    /// The decoder rejected a packet.
    #[error("packet rejected: {0}")]
    Rejected(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_messages() {
        let e = MirrorError::Framing(FramingError::InvalidResolution {
            width: 0,
            height: 1080,
            max: 8192,
        });
        assert!(e.to_string().contains("0x1080"));

        let e = MirrorError::RemoteCommand {
            step: "push server",
            status: Some(1),
            output: "device unauthorized".into(),
        };
        assert!(e.to_string().contains("push server"));
        assert!(e.to_string().contains("unauthorized"));
    }

    #[test]
    fn from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe broke");
        let e: MirrorError = io_err.into();
        assert!(matches!(e, MirrorError::Connection(_)));
    }
}
