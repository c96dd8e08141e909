//! `adb devices` output parsing.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceStatus {
    Ready,
    Unauthorized,
    Offline,
    Other(String),
}

impl DeviceStatus {
    pub fn parse(s: &str) -> Self {
        match s {
            "device" => DeviceStatus::Ready,
            "unauthorized" => DeviceStatus::Unauthorized,
            "offline" => DeviceStatus::Offline,
            other => DeviceStatus::Other(other.to_owned()),
        }
    }
}

impl fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceStatus::Ready => f.write_str("ready"),
            DeviceStatus::Unauthorized => f.write_str("unauthorized"),
            DeviceStatus::Offline => f.write_str("offline"),
            DeviceStatus::Other(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub serial: String,
    pub status: DeviceStatus,
}

/// Parse the listing printed by `adb devices`.
///
/// The header line and anything that is not exactly `<serial> <status>`
/// (daemon start-up chatter, blank lines) are skipped.
pub fn parse_device_list(output: &str) -> Vec<DeviceInfo> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with("List of devices"))
        .filter_map(|line| {
            let mut parts = line.split_whitespace();
            match (parts.next(), parts.next(), parts.next()) {
                (Some(serial), Some(status), None) => Some(DeviceInfo {
                    serial: serial.to_owned(),
                    status: DeviceStatus::parse(status),
                }),
                _ => None,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typical_listing() {
        let out = "List of devices attached\r\n\
                   R58M123ABC\tdevice\r\n\
                   emulator-5554\toffline\n\
                   192.168.1.7:5555\tunauthorized\n\n";
        let devices = parse_device_list(out);
        assert_eq!(devices.len(), 3);
        assert_eq!(devices[0].serial, "R58M123ABC");
        assert_eq!(devices[0].status, DeviceStatus::Ready);
        assert_eq!(devices[1].status, DeviceStatus::Offline);
        assert_eq!(devices[2].serial, "192.168.1.7:5555");
        assert_eq!(devices[2].status, DeviceStatus::Unauthorized);
    }

    #[test]
    fn daemon_chatter_is_skipped() {
        let out = "* daemon not running; starting now at tcp:5037\n\
                   * daemon started successfully\n\
                   List of devices attached\n\
                   abc\trecovery\n";
        let devices = parse_device_list(out);
        assert_eq!(
            devices,
            vec![DeviceInfo {
                serial: "abc".into(),
                status: DeviceStatus::Other("recovery".into()),
            }]
        );
        assert_eq!(devices[0].status.to_string(), "recovery");
    }

    #[test]
    fn empty_listing() {
        assert!(parse_device_list("List of devices attached\n\n").is_empty());
    }
}
