//! Session lifecycle: state machine, connection setup and teardown.

pub mod config;
pub mod dialer;
pub mod orchestrator;
pub mod state;

pub use config::SessionConfig;
pub use dialer::{BoxedStream, Dialer, MirrorStream, TcpDialer};
pub use orchestrator::{SessionHandle, SessionOrchestrator, SessionReport};
pub use state::SessionState;
