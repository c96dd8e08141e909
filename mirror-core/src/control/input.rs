//! Translation of user input into control messages.
//!
//! Callers supply device-relative coordinates and platform-independent
//! keys; [`InputTranslator`] tracks the little state needed (pointer
//! pressed, current frame size) to turn them into wire messages.

use bitflags::bitflags;

use crate::control::keycodes::{AndroidKeycode, MetaState};
use crate::control::message::{ControlMessage, KeyAction, MotionAction};

// ── Key ──────────────────────────────────────────────────────────

/// A key on the local keyboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    Home,
    Escape,
    Backspace,
    Delete,
    Enter,
    Tab,
    Space,
    Up,
    Down,
    Left,
    Right,
    /// A printable character key, identified by its unshifted glyph.
    Char(char),
}

impl Key {
    /// Android key code, if the key has one.
    pub fn android_keycode(self) -> Option<AndroidKeycode> {
        let code = match self {
            Key::Home => AndroidKeycode::HOME,
            Key::Escape => AndroidKeycode::BACK,
            Key::Backspace => AndroidKeycode::DEL,
            Key::Delete => AndroidKeycode::FORWARD_DEL,
            Key::Enter => AndroidKeycode::ENTER,
            Key::Tab => AndroidKeycode::TAB,
            Key::Space => AndroidKeycode::SPACE,
            Key::Up => AndroidKeycode::DPAD_UP,
            Key::Down => AndroidKeycode::DPAD_DOWN,
            Key::Left => AndroidKeycode::DPAD_LEFT,
            Key::Right => AndroidKeycode::DPAD_RIGHT,
            Key::Char(c) => return AndroidKeycode::letter(c),
        };
        Some(code)
    }
}

bitflags! {
    /// Local modifier keys held during a key event.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Modifiers: u8 {
        const SHIFT = 0b001;
        const ALT = 0b010;
        const CTRL = 0b100;
    }
}

impl Modifiers {
    pub fn meta_state(self) -> MetaState {
        let mut meta = MetaState::empty();
        meta.set(MetaState::SHIFT, self.contains(Modifiers::SHIFT));
        meta.set(MetaState::ALT, self.contains(Modifiers::ALT));
        meta.set(MetaState::CTRL, self.contains(Modifiers::CTRL));
        meta
    }
}

// ── InputEvent ───────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputEvent {
    PointerDown { x: u32, y: u32 },
    PointerMove { x: u32, y: u32 },
    PointerUp { x: u32, y: u32 },
    /// `text` is what the key typed, if anything; it is forwarded for
    /// IME passthrough.
    KeyDown {
        key: Key,
        modifiers: Modifiers,
        text: Option<String>,
    },
    KeyUp { key: Key, modifiers: Modifiers },
    Text(String),
}

// ── InputTranslator ──────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct InputTranslator {
    frame: Option<(u16, u16)>,
    pressed: bool,
}

impl InputTranslator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the device frame size that touch positions refer to.
    pub fn set_frame_size(&mut self, width: u32, height: u32) {
        self.frame = match (u16::try_from(width), u16::try_from(height)) {
            (Ok(w), Ok(h)) if w > 0 && h > 0 => Some((w, h)),
            _ => None,
        };
    }

    pub fn frame_size(&self) -> Option<(u16, u16)> {
        self.frame
    }

    pub fn is_pressed(&self) -> bool {
        self.pressed
    }

    /// Messages for one input event; possibly none.
    pub fn translate(&mut self, event: InputEvent) -> Vec<ControlMessage> {
        match event {
            InputEvent::PointerDown { x, y } => {
                let msg = self.touch(MotionAction::Down, x, y);
                if msg.is_some() {
                    self.pressed = true;
                }
                msg.into_iter().collect()
            }
            InputEvent::PointerMove { x, y } => {
                if !self.pressed {
                    return Vec::new();
                }
                self.touch(MotionAction::Move, x, y).into_iter().collect()
            }
            InputEvent::PointerUp { x, y } => {
                self.pressed = false;
                self.touch(MotionAction::Up, x, y).into_iter().collect()
            }
            InputEvent::KeyDown {
                key,
                modifiers,
                text,
            } => {
                let mut out = Vec::with_capacity(2);
                if let Some(code) = key.android_keycode() {
                    out.push(ControlMessage::keycode(
                        KeyAction::Down,
                        code,
                        modifiers.meta_state(),
                    ));
                }
                if let Some(text) = text.filter(|t| !t.is_empty()) {
                    out.push(ControlMessage::InjectText(text));
                }
                out
            }
            InputEvent::KeyUp { key, modifiers } => key
                .android_keycode()
                .map(|code| ControlMessage::keycode(KeyAction::Up, code, modifiers.meta_state()))
                .into_iter()
                .collect(),
            InputEvent::Text(text) if text.is_empty() => Vec::new(),
            InputEvent::Text(text) => vec![ControlMessage::InjectText(text)],
        }
    }

    /// Touch at `x`, `y`, dropped when no frame size is known or the
    /// point falls outside the frame.
    fn touch(&self, action: MotionAction, x: u32, y: u32) -> Option<ControlMessage> {
        let (w, h) = self.frame?;
        if x >= u32::from(w) || y >= u32::from(h) {
            return None;
        }
        Some(ControlMessage::touch(action, x, y, w, h))
    }
}

// ── Shortcuts ────────────────────────────────────────────────────

/// Key down followed by key up.
pub fn press(keycode: AndroidKeycode) -> [ControlMessage; 2] {
    [
        ControlMessage::keycode(KeyAction::Down, keycode, MetaState::empty()),
        ControlMessage::keycode(KeyAction::Up, keycode, MetaState::empty()),
    ]
}

/// Back, or wake the screen if it is off.
pub fn back() -> [ControlMessage; 2] {
    [
        ControlMessage::BackOrScreenOn(KeyAction::Down),
        ControlMessage::BackOrScreenOn(KeyAction::Up),
    ]
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn translator() -> InputTranslator {
        let mut t = InputTranslator::new();
        t.set_frame_size(1080, 2400);
        t
    }

    #[test]
    fn move_without_press_is_dropped() {
        let mut t = translator();
        assert!(t.translate(InputEvent::PointerMove { x: 5, y: 5 }).is_empty());

        let down = t.translate(InputEvent::PointerDown { x: 5, y: 5 });
        assert_eq!(down, vec![ControlMessage::touch(MotionAction::Down, 5, 5, 1080, 2400)]);
        assert!(t.is_pressed());

        let mv = t.translate(InputEvent::PointerMove { x: 6, y: 7 });
        assert_eq!(mv, vec![ControlMessage::touch(MotionAction::Move, 6, 7, 1080, 2400)]);

        t.translate(InputEvent::PointerUp { x: 6, y: 7 });
        assert!(!t.is_pressed());
        assert!(t.translate(InputEvent::PointerMove { x: 8, y: 8 }).is_empty());
    }

    #[test]
    fn pointer_needs_frame_size() {
        let mut t = InputTranslator::new();
        assert!(t.translate(InputEvent::PointerDown { x: 1, y: 1 }).is_empty());
        assert!(!t.is_pressed());
    }

    #[test]
    fn pointer_outside_frame_is_dropped() {
        let mut t = translator();
        assert!(t.translate(InputEvent::PointerDown { x: 1081, y: 10 }).is_empty());
        assert!(t.translate(InputEvent::PointerDown { x: 1080, y: 10 }).is_empty());
        assert!(t.translate(InputEvent::PointerDown { x: 10, y: 2400 }).is_empty());
        assert!(!t.is_pressed());
        assert_eq!(t.translate(InputEvent::PointerDown { x: 1079, y: 2399 }).len(), 1);
    }

    #[test]
    fn oversized_frame_is_ignored() {
        let mut t = InputTranslator::new();
        t.set_frame_size(70_000, 100);
        assert_eq!(t.frame_size(), None);
    }

    #[test]
    fn key_down_with_text_sends_both() {
        let mut t = translator();
        let out = t.translate(InputEvent::KeyDown {
            key: Key::Char('a'),
            modifiers: Modifiers::SHIFT,
            text: Some("A".into()),
        });
        assert_eq!(
            out,
            vec![
                ControlMessage::keycode(KeyAction::Down, AndroidKeycode::A, MetaState::SHIFT),
                ControlMessage::text("A"),
            ]
        );
    }

    #[test]
    fn unmapped_key_only_forwards_text() {
        let mut t = translator();
        let out = t.translate(InputEvent::KeyDown {
            key: Key::Char('1'),
            modifiers: Modifiers::empty(),
            text: Some("1".into()),
        });
        assert_eq!(out, vec![ControlMessage::text("1")]);
        assert!(
            t.translate(InputEvent::KeyUp {
                key: Key::Char('1'),
                modifiers: Modifiers::empty()
            })
            .is_empty()
        );
    }

    #[test]
    fn key_mapping() {
        assert_eq!(Key::Escape.android_keycode(), Some(AndroidKeycode::BACK));
        assert_eq!(Key::Backspace.android_keycode(), Some(AndroidKeycode::DEL));
        assert_eq!(Key::Delete.android_keycode(), Some(AndroidKeycode::FORWARD_DEL));
        assert_eq!(Key::Enter.android_keycode(), Some(AndroidKeycode::ENTER));
        assert_eq!(Key::Left.android_keycode(), Some(AndroidKeycode::DPAD_LEFT));
    }

    #[test]
    fn modifiers_to_meta_state() {
        let m = Modifiers::CTRL | Modifiers::ALT;
        assert_eq!(m.meta_state(), MetaState::CTRL | MetaState::ALT);
        assert_eq!(m.meta_state().bits(), 0x1002);
    }

    #[test]
    fn shortcuts() {
        let [down, up] = press(AndroidKeycode::HOME);
        assert_eq!(&down.to_bytes()[..2], &[0, 0]);
        assert_eq!(&up.to_bytes()[..2], &[0, 1]);
        assert_eq!(back().map(|m| m.to_bytes()[1]), [0, 1]);
    }
}
