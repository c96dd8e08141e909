//! Control channel wire format.
//!
//! Every message starts with a one-byte type tag; multi-byte integers
//! are big-endian. Encoding is infallible: all inputs are already typed.
//!
//! ```text
//! inject-touch   tag action pointer_id(i64) x(u32) y(u32) w(u16) h(u16)
//!                pressure(u16) action_button(u32) buttons(u32)
//! inject-keycode tag action keycode(u32) repeat(u32) meta_state(u32)
//! inject-text    tag len(u32) utf8[len]
//! ```

use bytes::{BufMut, Bytes, BytesMut};
use tokio_util::codec::Encoder;

use crate::control::keycodes::{AndroidKeycode, MetaState};
use crate::error::MirrorError;

/// Pointer id the device treats as a synthetic finger.
pub const VIRTUAL_FINGER_ID: i64 = -1;
/// Maximum touch pressure.
pub const PRESSURE_MAX: u16 = 0xFFFF;
/// `AMOTION_EVENT_BUTTON_PRIMARY`.
pub const BUTTON_PRIMARY: u32 = 1;

pub const TOUCH_MESSAGE_LEN: usize = 32;
pub const KEYCODE_MESSAGE_LEN: usize = 14;

// ── Enumerations ─────────────────────────────────────────────────

/// One-byte type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageType {
    InjectKeycode = 0,
    InjectText = 1,
    InjectTouchEvent = 2,
    InjectScroll = 3,
    BackOrScreenOn = 4,
    ExpandNotificationPanel = 5,
    CollapseNotificationPanel = 6,
    GetClipboard = 7,
    SetClipboard = 8,
    SetScreenPowerMode = 9,
    RotateDevice = 10,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum KeyAction {
    Down = 0,
    Up = 1,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MotionAction {
    Down = 0,
    Up = 1,
    Move = 2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ScreenPowerMode {
    Off = 0,
    Doze = 1,
    Normal = 2,
}

// ── ControlMessage ───────────────────────────────────────────────

/// A touch position in device frame coordinates, along with the frame
/// size it refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TouchPoint {
    pub x: u32,
    pub y: u32,
    pub screen_width: u16,
    pub screen_height: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlMessage {
    InjectTouch {
        action: MotionAction,
        point: TouchPoint,
    },
    InjectKeycode {
        action: KeyAction,
        keycode: AndroidKeycode,
        meta_state: MetaState,
    },
    InjectText(String),
    BackOrScreenOn(KeyAction),
    SetScreenPowerMode(ScreenPowerMode),
    RotateDevice,
    ExpandNotificationPanel,
    CollapseNotificationPanel,
}

impl ControlMessage {
    pub fn touch(action: MotionAction, x: u32, y: u32, screen_width: u16, screen_height: u16) -> Self {
        ControlMessage::InjectTouch {
            action,
            point: TouchPoint {
                x,
                y,
                screen_width,
                screen_height,
            },
        }
    }

    pub fn keycode(action: KeyAction, keycode: AndroidKeycode, meta_state: MetaState) -> Self {
        ControlMessage::InjectKeycode {
            action,
            keycode,
            meta_state,
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        ControlMessage::InjectText(text.into())
    }

    pub fn message_type(&self) -> MessageType {
        match self {
            ControlMessage::InjectTouch { .. } => MessageType::InjectTouchEvent,
            ControlMessage::InjectKeycode { .. } => MessageType::InjectKeycode,
            ControlMessage::InjectText(_) => MessageType::InjectText,
            ControlMessage::BackOrScreenOn(_) => MessageType::BackOrScreenOn,
            ControlMessage::SetScreenPowerMode(_) => MessageType::SetScreenPowerMode,
            ControlMessage::RotateDevice => MessageType::RotateDevice,
            ControlMessage::ExpandNotificationPanel => MessageType::ExpandNotificationPanel,
            ControlMessage::CollapseNotificationPanel => MessageType::CollapseNotificationPanel,
        }
    }

    /// Exact number of bytes [`encode_into`](Self::encode_into) writes.
    pub fn encoded_len(&self) -> usize {
        match self {
            ControlMessage::InjectTouch { .. } => TOUCH_MESSAGE_LEN,
            ControlMessage::InjectKeycode { .. } => KEYCODE_MESSAGE_LEN,
            ControlMessage::InjectText(text) => 1 + 4 + text.len(),
            ControlMessage::BackOrScreenOn(_) | ControlMessage::SetScreenPowerMode(_) => 2,
            ControlMessage::RotateDevice
            | ControlMessage::ExpandNotificationPanel
            | ControlMessage::CollapseNotificationPanel => 1,
        }
    }

    pub fn encode_into(&self, dst: &mut impl BufMut) {
        dst.put_u8(self.message_type() as u8);
        match self {
            ControlMessage::InjectTouch { action, point } => {
                dst.put_u8(*action as u8);
                dst.put_i64(VIRTUAL_FINGER_ID);
                dst.put_u32(point.x);
                dst.put_u32(point.y);
                dst.put_u16(point.screen_width);
                dst.put_u16(point.screen_height);
                dst.put_u16(PRESSURE_MAX);
                dst.put_u32(BUTTON_PRIMARY);
                dst.put_u32(BUTTON_PRIMARY);
            }
            ControlMessage::InjectKeycode {
                action,
                keycode,
                meta_state,
            } => {
                dst.put_u8(*action as u8);
                dst.put_u32(keycode.code());
                dst.put_u32(0);
                dst.put_u32(meta_state.bits());
            }
            ControlMessage::InjectText(text) => {
                dst.put_u32(text.len() as u32);
                dst.put_slice(text.as_bytes());
            }
            ControlMessage::BackOrScreenOn(action) => dst.put_u8(*action as u8),
            ControlMessage::SetScreenPowerMode(mode) => dst.put_u8(*mode as u8),
            ControlMessage::RotateDevice
            | ControlMessage::ExpandNotificationPanel
            | ControlMessage::CollapseNotificationPanel => {}
        }
    }

    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        self.encode_into(&mut buf);
        buf.freeze()
    }
}

// ── ControlCodec ─────────────────────────────────────────────────

/// Write-only codec for the control socket.
#[derive(Debug, Default, Clone, Copy)]
pub struct ControlCodec;

impl Encoder<ControlMessage> for ControlCodec {
    type Error = MirrorError;

    fn encode(&mut self, item: ControlMessage, dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.reserve(item.encoded_len());
        item.encode_into(dst);
        Ok(())
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn be_u32(b: &[u8]) -> u32 {
        u32::from_be_bytes(b.try_into().unwrap())
    }

    fn be_u16(b: &[u8]) -> u16 {
        u16::from_be_bytes(b.try_into().unwrap())
    }

    #[test]
    fn touch_layout() {
        let bytes = ControlMessage::touch(MotionAction::Down, 100, 200, 1080, 2400).to_bytes();
        assert_eq!(bytes.len(), TOUCH_MESSAGE_LEN);
        assert_eq!(bytes[0], MessageType::InjectTouchEvent as u8);
        assert_eq!(bytes[0], 2);
        assert_eq!(bytes[1], MotionAction::Down as u8);
        assert_eq!(i64::from_be_bytes(bytes[2..10].try_into().unwrap()), -1);
        assert_eq!(be_u32(&bytes[10..14]), 100);
        assert_eq!(be_u32(&bytes[14..18]), 200);
        assert_eq!(be_u16(&bytes[18..20]), 1080);
        assert_eq!(be_u16(&bytes[20..22]), 2400);
        assert_eq!(be_u16(&bytes[22..24]), 0xFFFF);
        assert_eq!(be_u32(&bytes[24..28]), 1);
        assert_eq!(be_u32(&bytes[28..32]), 1);
    }

    #[test]
    fn keycode_layout() {
        let msg = ControlMessage::keycode(KeyAction::Up, AndroidKeycode::ENTER, MetaState::SHIFT | MetaState::CTRL);
        let bytes = msg.to_bytes();
        assert_eq!(bytes.len(), KEYCODE_MESSAGE_LEN);
        assert_eq!(&bytes[..2], &[0, 1]);
        assert_eq!(be_u32(&bytes[2..6]), 66);
        assert_eq!(be_u32(&bytes[6..10]), 0);
        assert_eq!(be_u32(&bytes[10..14]), 0x1001);
    }

    #[test]
    fn text_length_is_utf8_bytes() {
        let bytes = ControlMessage::text("é").to_bytes();
        assert_eq!(bytes[0], MessageType::InjectText as u8);
        assert_eq!(be_u32(&bytes[1..5]), 2);
        assert_eq!(&bytes[5..], "é".as_bytes());
        assert_eq!(bytes.len(), 7);
    }

    #[test]
    fn empty_text() {
        assert_eq!(&ControlMessage::text("").to_bytes()[..], &[1, 0, 0, 0, 0]);
    }

    #[test]
    fn short_messages() {
        assert_eq!(&ControlMessage::BackOrScreenOn(KeyAction::Down).to_bytes()[..], &[4, 0]);
        assert_eq!(
            &ControlMessage::SetScreenPowerMode(ScreenPowerMode::Normal).to_bytes()[..],
            &[9, 2]
        );
        assert_eq!(&ControlMessage::RotateDevice.to_bytes()[..], &[10]);
        assert_eq!(&ControlMessage::ExpandNotificationPanel.to_bytes()[..], &[5]);
        assert_eq!(&ControlMessage::CollapseNotificationPanel.to_bytes()[..], &[6]);
    }

    #[test]
    fn codec_appends_back_to_back() {
        let mut codec = ControlCodec;
        let mut dst = BytesMut::new();
        codec.encode(ControlMessage::RotateDevice, &mut dst).unwrap();
        codec
            .encode(ControlMessage::BackOrScreenOn(KeyAction::Up), &mut dst)
            .unwrap();
        assert_eq!(&dst[..], &[10, 4, 1]);
    }
}
