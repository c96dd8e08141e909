//! Notifications for the presentation layer.
//!
//! Delivered on a bounded channel. Frames are offered with `try_send`:
//! a consumer that falls behind loses frames, it never stalls the
//! decode worker, and no frame is delivered twice.

use crate::video::types::DecodedFrame;

#[derive(Debug)]
pub enum MirrorEvent {
    /// The device announced its name. Sent once per session.
    DeviceIdentified(String),
    /// A picture was decoded and converted to the display format.
    FrameDecoded(DecodedFrame),
}

/// Capacity of the presentation channel. Small on purpose: only the
/// latest frames matter.
pub const EVENT_CHANNEL_CAPACITY: usize = 8;
