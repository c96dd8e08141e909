//! Control channel: wire messages, input translation, socket writer.

pub mod input;
pub mod keycodes;
pub mod message;
pub mod sender;

pub use input::{InputEvent, InputTranslator, Key, Modifiers, back, press};
pub use keycodes::{AndroidKeycode, MetaState};
pub use message::{
    ControlCodec, ControlMessage, KeyAction, MessageType, MotionAction, ScreenPowerMode,
    TouchPoint,
};
pub use sender::{ControlSender, ControlWriter, NotSentReason, PendingControl, SendOutcome};
