use std::path::PathBuf;
use std::time::Duration;

use crate::control::sender::CONTROL_QUEUE_CAPACITY;
use crate::remote::options::{DEFAULT_LOCAL_PORT, ServerOptions, local_artifact_name};
use crate::video::codec::CodecOptions;
use crate::video::demux::DemuxLimits;
use crate::video::pipeline::PipelineConfig;

/// Everything a session needs to know before it starts.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Target device; empty for the only attached one.
    pub serial: String,
    /// Local server artifact to push.
    pub server_file: PathBuf,
    pub local_port: u16,
    /// Video connect attempts before giving up.
    pub connect_attempts: u32,
    /// Pause between video connect attempts.
    pub retry_delay: Duration,
    /// How long a connected video socket may stay silent before the
    /// attempt counts as failed.
    pub first_byte_timeout: Duration,
    /// Grace period for the server to start listening.
    pub start_delay: Duration,
    /// Bounded wait for the decode worker and server process on teardown.
    pub stop_timeout: Duration,
    pub control_queue: usize,
    pub server: ServerOptions,
    pub limits: DemuxLimits,
    pub codec: CodecOptions,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            serial: String::new(),
            server_file: PathBuf::from(local_artifact_name()),
            local_port: DEFAULT_LOCAL_PORT,
            connect_attempts: 15,
            retry_delay: Duration::from_millis(200),
            first_byte_timeout: Duration::from_secs(2),
            start_delay: Duration::from_millis(500),
            stop_timeout: Duration::from_secs(1),
            control_queue: CONTROL_QUEUE_CAPACITY,
            server: ServerOptions::default(),
            limits: DemuxLimits::default(),
            codec: CodecOptions::default(),
        }
    }
}

impl SessionConfig {
    pub(crate) fn pipeline(&self) -> PipelineConfig {
        PipelineConfig {
            codec: self.server.video_codec,
            options: self.codec,
            limits: self.limits,
            ..PipelineConfig::default()
        }
    }
}
