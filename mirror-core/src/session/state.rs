//! Session lifecycle state machine.
//!
//! Transitions are validated and return `Result` instead of panicking.

use std::fmt;
use std::time::{Duration, Instant};

use crate::error::MirrorError;

// ── SessionState ─────────────────────────────────────────────────

/// The current phase of a mirroring session.
///
/// ```text
///  Idle ─► PushingBinary ─► ForwardingPort ─► StartingRemote
///                                                   │
///            ┌─(retry)─┐                            ▼
///            └─► ConnectingVideo ◄──────────────────┘
///                      │
///                      ▼
///              ConnectingControl ─► Streaming
///
///  any non-terminal ─► Failed      any ─► Closed
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Idle,
    PushingBinary,
    ForwardingPort,
    StartingRemote,
    /// Video socket connect in progress; `attempt` counts from 1.
    ConnectingVideo {
        attempt: u32,
    },
    ConnectingControl,
    Streaming {
        since: Instant,
        /// Whether the control channel came up.
        control: bool,
    },
    /// Fatal error; carries the user-facing reason.
    Failed(String),
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::PushingBinary => write!(f, "PushingBinary"),
            Self::ForwardingPort => write!(f, "ForwardingPort"),
            Self::StartingRemote => write!(f, "StartingRemote"),
            Self::ConnectingVideo { attempt } => write!(f, "ConnectingVideo(attempt {attempt})"),
            Self::ConnectingControl => write!(f, "ConnectingControl"),
            Self::Streaming { control: true, .. } => write!(f, "Streaming"),
            Self::Streaming { control: false, .. } => write!(f, "Streaming(video only)"),
            Self::Failed(reason) => write!(f, "Failed: {reason}"),
            Self::Closed => write!(f, "Closed"),
        }
    }
}

impl SessionState {
    pub fn is_streaming(&self) -> bool {
        matches!(self, Self::Streaming { .. })
    }

    /// `Failed` or `Closed`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Failed(_) | Self::Closed)
    }

    /// How long the session has been streaming.
    pub fn streaming_duration(&self) -> Option<Duration> {
        match self {
            Self::Streaming { since, .. } => Some(since.elapsed()),
            _ => None,
        }
    }

    // ── Transitions ──────────────────────────────────────────────

    fn advance(
        &mut self,
        from: fn(&SessionState) -> bool,
        to: SessionState,
        violation: &'static str,
    ) -> Result<(), MirrorError> {
        if from(self) {
            *self = to;
            Ok(())
        } else {
            Err(MirrorError::InvalidTransition(violation))
        }
    }

    /// Valid from: `Idle`.
    pub fn begin_push(&mut self) -> Result<(), MirrorError> {
        self.advance(
            |s| matches!(s, Self::Idle),
            Self::PushingBinary,
            "cannot push: session already started",
        )
    }

    /// Valid from: `PushingBinary`.
    pub fn begin_forward(&mut self) -> Result<(), MirrorError> {
        self.advance(
            |s| matches!(s, Self::PushingBinary),
            Self::ForwardingPort,
            "cannot forward: binary not pushed",
        )
    }

    /// Valid from: `ForwardingPort`.
    pub fn begin_start_remote(&mut self) -> Result<(), MirrorError> {
        self.advance(
            |s| matches!(s, Self::ForwardingPort),
            Self::StartingRemote,
            "cannot start server: port not forwarded",
        )
    }

    /// Enter `ConnectingVideo` for the next attempt.
    ///
    /// Valid from: `StartingRemote` (attempt 1), `ConnectingVideo`.
    pub fn begin_video_attempt(&mut self) -> Result<u32, MirrorError> {
        let attempt = match self {
            Self::StartingRemote => 1,
            Self::ConnectingVideo { attempt } => *attempt + 1,
            _ => {
                return Err(MirrorError::InvalidTransition(
                    "cannot connect video: server not started",
                ));
            }
        };
        *self = Self::ConnectingVideo { attempt };
        Ok(attempt)
    }

    /// Valid from: `ConnectingVideo`.
    pub fn begin_control(&mut self) -> Result<(), MirrorError> {
        self.advance(
            |s| matches!(s, Self::ConnectingVideo { .. }),
            Self::ConnectingControl,
            "cannot connect control: video not connected",
        )
    }

    /// Valid from: `ConnectingControl`.
    pub fn begin_streaming(&mut self, control: bool) -> Result<(), MirrorError> {
        self.advance(
            |s| matches!(s, Self::ConnectingControl),
            Self::Streaming {
                since: Instant::now(),
                control,
            },
            "cannot stream: control step not reached",
        )
    }

    /// Record a fatal error. Terminal states are left untouched.
    pub fn fail(&mut self, reason: impl Into<String>) {
        if !self.is_terminal() {
            *self = Self::Failed(reason.into());
        }
    }

    /// Explicit teardown. Valid from any state; idempotent.
    pub fn close(&mut self) {
        *self = Self::Closed;
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path() {
        let mut s = SessionState::default();
        s.begin_push().unwrap();
        s.begin_forward().unwrap();
        s.begin_start_remote().unwrap();
        assert_eq!(s.begin_video_attempt().unwrap(), 1);
        assert_eq!(s.begin_video_attempt().unwrap(), 2);
        assert_eq!(s, SessionState::ConnectingVideo { attempt: 2 });
        s.begin_control().unwrap();
        s.begin_streaming(true).unwrap();
        assert!(s.is_streaming());
        assert!(s.streaming_duration().is_some());
        assert_eq!(s.to_string(), "Streaming");
    }

    #[test]
    fn steps_cannot_be_skipped() {
        let mut s = SessionState::Idle;
        assert!(matches!(
            s.begin_forward(),
            Err(MirrorError::InvalidTransition(_))
        ));
        assert!(s.begin_video_attempt().is_err());
        assert!(s.begin_streaming(false).is_err());
        assert_eq!(s, SessionState::Idle);
    }

    #[test]
    fn failed_is_sticky_but_closable() {
        let mut s = SessionState::ConnectingVideo { attempt: 15 };
        s.fail("video socket not reachable");
        assert_eq!(s, SessionState::Failed("video socket not reachable".into()));
        s.fail("second error");
        assert_eq!(s, SessionState::Failed("video socket not reachable".into()));
        assert!(s.is_terminal());

        s.close();
        s.close();
        assert_eq!(s, SessionState::Closed);
        s.fail("late");
        assert_eq!(s, SessionState::Closed);
    }

    #[test]
    fn video_only_display() {
        let mut s = SessionState::ConnectingControl;
        s.begin_streaming(false).unwrap();
        assert_eq!(s.to_string(), "Streaming(video only)");
    }
}
