//! Mirroring client configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use mirror_core::remote::options::DEFAULT_LOCAL_PORT;
use mirror_core::video::codec::CodecOptions;
use mirror_core::{DemuxLimits, ServerOptions, SessionConfig};

/// Top-level configuration for the mirroring client.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MirrorConfig {
    /// adb executable and command timeout.
    pub adb: AdbConfig,
    /// Options passed to the on-device server.
    pub server: ServerOptions,
    /// Connection and teardown timing.
    pub session: SessionSection,
    /// Stream sanity ceilings.
    pub limits: DemuxLimits,
    /// Decoder tuning.
    pub codec: CodecOptions,
    /// Logging.
    pub logging: LoggingConfig,
}

/// adb settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AdbConfig {
    /// Path to the adb executable, or a name looked up on `PATH`.
    pub path: PathBuf,
    /// Timeout for short adb commands in milliseconds.
    pub timeout_ms: u64,
}

/// Session timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSection {
    pub local_port: u16,
    /// Video connect attempts before giving up.
    pub connect_attempts: u32,
    pub retry_delay_ms: u64,
    /// Silence allowed on a fresh video socket before retrying.
    pub first_byte_timeout_ms: u64,
    /// Wait after launching the server before the first connect.
    pub start_delay_ms: u64,
    pub stop_timeout_ms: u64,
}

/// Logging.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level; `RUST_LOG` takes precedence.
    pub level: String,
}

// ── Defaults ─────────────────────────────────────────────────────

impl Default for AdbConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("adb"),
            timeout_ms: 10_000,
        }
    }
}

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            local_port: DEFAULT_LOCAL_PORT,
            connect_attempts: 15,
            retry_delay_ms: 200,
            first_byte_timeout_ms: 2000,
            start_delay_ms: 500,
            stop_timeout_ms: 1000,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

// ── Loading ──────────────────────────────────────────────────────

impl MirrorConfig {
    /// Load from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents).unwrap_or_else(|e| {
                tracing::warn!("invalid config {}: {e}; using defaults", path.display());
                Self::default()
            }),
            Err(_) => {
                tracing::info!("no config at {}; using defaults", path.display());
                Self::default()
            }
        }
    }

    pub fn adb_timeout(&self) -> Duration {
        Duration::from_millis(self.adb.timeout_ms)
    }

    /// Session parameters for one device. `server_file` overrides the
    /// default artifact name when given.
    pub fn session_config(&self, serial: &str, server_file: Option<&Path>) -> SessionConfig {
        let defaults = SessionConfig::default();
        SessionConfig {
            serial: serial.to_owned(),
            server_file: server_file
                .map(Path::to_path_buf)
                .unwrap_or(defaults.server_file),
            local_port: self.session.local_port,
            connect_attempts: self.session.connect_attempts.max(1),
            retry_delay: Duration::from_millis(self.session.retry_delay_ms),
            first_byte_timeout: Duration::from_millis(self.session.first_byte_timeout_ms),
            start_delay: Duration::from_millis(self.session.start_delay_ms),
            stop_timeout: Duration::from_millis(self.session.stop_timeout_ms),
            control_queue: defaults.control_queue,
            server: self.server.clone(),
            limits: self.limits,
            codec: self.codec,
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────
