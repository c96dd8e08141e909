//! Target device selection.

use mirror_core::{DeviceInfo, DeviceStatus};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SelectError {
    #[error("no device attached")]
    NoDevice,
    #[error("device {serial} is {status}")]
    NotReady { serial: String, status: DeviceStatus },
    #[error("device {0} not found")]
    NotFound(String),
    #[error("{0} devices attached; pass --serial")]
    Ambiguous(usize),
}

/// Pick the device to mirror: the requested serial, or the only ready
/// device when none is requested.
pub fn select_device<'a>(
    devices: &'a [DeviceInfo],
    requested: Option<&str>,
) -> Result<&'a DeviceInfo, SelectError> {
    let device = match requested {
        Some(serial) => devices
            .iter()
            .find(|d| d.serial == serial)
            .ok_or_else(|| SelectError::NotFound(serial.to_owned()))?,
        None => {
            let ready: Vec<_> = devices
                .iter()
                .filter(|d| d.status == DeviceStatus::Ready)
                .collect();
            match ready.as_slice() {
                [only] => *only,
                [] => devices.first().ok_or(SelectError::NoDevice)?,
                many => return Err(SelectError::Ambiguous(many.len())),
            }
        }
    };
    if device.status != DeviceStatus::Ready {
        return Err(SelectError::NotReady {
            serial: device.serial.clone(),
            status: device.status.clone(),
        });
    }
    Ok(device)
}

// ── Tests ────────────────────────────────────────────────────────
