//! Remote server launch options and the adb argument lists built from
//! them.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::video::types::VideoCodec;

/// Where the server artifact is pushed on the device.
pub const REMOTE_SERVER_PATH: &str = "/data/local/tmp/scrcpy-server.jar";
/// Abstract socket the server listens on.
pub const SOCKET_NAME: &str = "scrcpy";
pub const DEFAULT_LOCAL_PORT: u16 = 27183;
/// Must match the pushed artifact.
pub const SERVER_VERSION: &str = "3.3.3";

const SERVER_CLASS: &str = "com.genymobile.scrcpy.Server";
const DEFAULT_BIT_RATE: u32 = 8_000_000;

/// File name of the server artifact shipped for [`SERVER_VERSION`].
pub fn local_artifact_name() -> String {
    format!("scrcpy-server-v{SERVER_VERSION}")
}

// ── ServerOptions ────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerOptions {
    pub version: String,
    pub log_level: String,
    /// Longest video dimension; 0 keeps the native size.
    pub max_size: u16,
    pub video_bit_rate: u32,
    /// 0 leaves the frame rate unlimited.
    pub max_fps: u16,
    pub video_codec: VideoCodec,
    pub display_id: u32,
    /// `width:height:x:y`.
    pub crop: Option<String>,
    pub control: bool,
    pub stay_awake: bool,
    pub power_off_on_close: bool,
    pub show_touches: bool,
    pub clipboard_autosync: bool,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            version: SERVER_VERSION.to_owned(),
            log_level: "info".to_owned(),
            max_size: 0,
            video_bit_rate: DEFAULT_BIT_RATE,
            max_fps: 0,
            video_codec: VideoCodec::H264,
            display_id: 0,
            crop: None,
            control: true,
            stay_awake: false,
            power_off_on_close: false,
            show_touches: false,
            clipboard_autosync: true,
        }
    }
}

impl ServerOptions {
    /// `adb` arguments that start the server on the device.
    ///
    /// Values equal to the server's own defaults are left out. Audio is
    /// always disabled.
    pub fn launch_args(&self) -> Vec<String> {
        let mut args = vec![
            "shell".to_owned(),
            format!("CLASSPATH={REMOTE_SERVER_PATH}"),
            "app_process".to_owned(),
            "/".to_owned(),
            SERVER_CLASS.to_owned(),
            self.version.clone(),
        ];

        args.push(format!("log_level={}", self.log_level));
        args.push("video=true".to_owned());
        if self.max_size > 0 {
            args.push(format!("max_size={}", self.max_size));
        }
        if self.video_bit_rate != DEFAULT_BIT_RATE {
            args.push(format!("video_bit_rate={}", self.video_bit_rate));
        }
        if self.max_fps > 0 {
            args.push(format!("max_fps={}", self.max_fps));
        }
        if self.video_codec != VideoCodec::H264 {
            args.push(format!("video_codec={}", self.video_codec));
        }
        if self.display_id != 0 {
            args.push(format!("display_id={}", self.display_id));
        }
        if let Some(crop) = self.crop.as_deref().filter(|c| !c.is_empty()) {
            args.push(format!("crop={crop}"));
        }
        args.push("audio=false".to_owned());
        args.push(format!("control={}", self.control));
        if self.stay_awake {
            args.push("stay_awake=true".to_owned());
        }
        if self.power_off_on_close {
            args.push("power_off_on_close=true".to_owned());
        }
        if self.show_touches {
            args.push("show_touches=true".to_owned());
        }
        if !self.clipboard_autosync {
            args.push("clipboard_autosync=false".to_owned());
        }
        args.push("tunnel_forward=true".to_owned());
        args.push("send_dummy_byte=true".to_owned());
        args
    }
}

// ── Bridge commands ──────────────────────────────────────────────

pub fn push_args(local: &Path, remote: &str) -> Vec<String> {
    vec![
        "push".to_owned(),
        local.display().to_string(),
        remote.to_owned(),
    ]
}

pub fn forward_args(local_port: u16) -> Vec<String> {
    vec![
        "forward".to_owned(),
        format!("tcp:{local_port}"),
        format!("localabstract:{SOCKET_NAME}"),
    ]
}

pub fn forward_remove_args(local_port: u16) -> Vec<String> {
    vec![
        "forward".to_owned(),
        "--remove".to_owned(),
        format!("tcp:{local_port}"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_launch_args() {
        let args = ServerOptions::default().launch_args();
        assert_eq!(
            args,
            vec![
                "shell",
                "CLASSPATH=/data/local/tmp/scrcpy-server.jar",
                "app_process",
                "/",
                "com.genymobile.scrcpy.Server",
                "3.3.3",
                "log_level=info",
                "video=true",
                "audio=false",
                "control=true",
                "tunnel_forward=true",
                "send_dummy_byte=true",
            ]
        );
    }

    #[test]
    fn non_default_values_are_emitted() {
        let opts = ServerOptions {
            max_size: 1024,
            video_bit_rate: 4_000_000,
            max_fps: 60,
            video_codec: VideoCodec::H265,
            display_id: 2,
            crop: Some("1080:1920:0:0".into()),
            control: false,
            stay_awake: true,
            show_touches: true,
            clipboard_autosync: false,
            ..Default::default()
        };
        let args = opts.launch_args();
        for expected in [
            "max_size=1024",
            "video_bit_rate=4000000",
            "max_fps=60",
            "video_codec=h265",
            "display_id=2",
            "crop=1080:1920:0:0",
            "control=false",
            "stay_awake=true",
            "show_touches=true",
            "clipboard_autosync=false",
        ] {
            assert!(args.iter().any(|a| a == expected), "missing {expected}");
        }
        assert!(!args.iter().any(|a| a.starts_with("power_off_on_close")));
    }

    #[test]
    fn bridge_commands() {
        assert_eq!(
            forward_args(27183),
            vec!["forward", "tcp:27183", "localabstract:scrcpy"]
        );
        assert_eq!(
            forward_remove_args(27183),
            vec!["forward", "--remove", "tcp:27183"]
        );
        assert_eq!(
            push_args(Path::new("scrcpy-server-v3.3.3"), REMOTE_SERVER_PATH),
            vec!["push", "scrcpy-server-v3.3.3", "/data/local/tmp/scrcpy-server.jar"]
        );
        assert_eq!(local_artifact_name(), "scrcpy-server-v3.3.3");
    }
}
