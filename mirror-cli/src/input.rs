//! Console input → control message conversion.
//!
//! Each stdin line is either a `:command` or plain text to type on the
//! device. A line starting with `::` types the text after the first
//! colon verbatim.
//!
//! ```text
//! :home  :back  :rotate  :expand  :collapse  :quit
//! :appswitch  :menu  :volup  :voldown  :power-key
//! :power on|off         screen power, device stays awake
//! :tap <x> <y>          device frame coordinates
//! :key <name>           enter, tab, esc, backspace, delete, space,
//!                       up, down, left, right, or a single letter
//! ```

use mirror_core::control::{
    AndroidKeycode, ControlMessage, ScreenPowerMode, back, press,
};
use mirror_core::{InputEvent, InputTranslator, Key, Modifiers};

/// What a console line asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Messages to forward to the device; may be empty.
    Send(Vec<ControlMessage>),
    Quit,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("unknown command :{0}")]
    Unknown(String),
    #[error("usage: {0}")]
    Usage(&'static str),
    #[error("no frame decoded yet; touch coordinates have no reference size")]
    NoFrame,
}

/// Turns console lines into control messages.
#[derive(Debug, Default)]
pub struct Console {
    translator: InputTranslator,
}

impl Console {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track the size of the latest decoded frame.
    pub fn set_frame_size(&mut self, width: u32, height: u32) {
        self.translator.set_frame_size(width, height);
    }

    pub fn handle(&mut self, line: &str) -> Result<Command, CommandError> {
        let line = line.trim_end_matches(['\r', '\n']);
        if let Some(literal) = line.strip_prefix("::") {
            return Ok(self.text(&format!(":{literal}")));
        }
        let Some(command) = line.strip_prefix(':') else {
            return Ok(self.text(line));
        };

        let mut words = command.split_whitespace();
        let name = words.next().unwrap_or_default();
        let args: Vec<&str> = words.collect();

        let messages = match (name, args.as_slice()) {
            ("quit" | "q", []) => return Ok(Command::Quit),
            ("home", []) => press(AndroidKeycode::HOME).to_vec(),
            ("back", []) => back().to_vec(),
            ("appswitch", []) => press(AndroidKeycode::APP_SWITCH).to_vec(),
            ("menu", []) => press(AndroidKeycode::MENU).to_vec(),
            ("volup", []) => press(AndroidKeycode::VOLUME_UP).to_vec(),
            ("voldown", []) => press(AndroidKeycode::VOLUME_DOWN).to_vec(),
            ("power-key", []) => press(AndroidKeycode::POWER).to_vec(),
            ("rotate", []) => vec![ControlMessage::RotateDevice],
            ("expand", []) => vec![ControlMessage::ExpandNotificationPanel],
            ("collapse", []) => vec![ControlMessage::CollapseNotificationPanel],
            ("power", ["on"]) => vec![ControlMessage::SetScreenPowerMode(ScreenPowerMode::Normal)],
            ("power", ["off"]) => vec![ControlMessage::SetScreenPowerMode(ScreenPowerMode::Off)],
            ("power", _) => return Err(CommandError::Usage(":power on|off")),
            ("tap", [x, y]) => {
                let (Ok(x), Ok(y)) = (x.parse(), y.parse()) else {
                    return Err(CommandError::Usage(":tap <x> <y>"));
                };
                self.tap(x, y)?
            }
            ("tap", _) => return Err(CommandError::Usage(":tap <x> <y>")),
            ("key", [name]) => {
                let key = parse_key(name).ok_or(CommandError::Usage(":key <name>"))?;
                self.key(key)
            }
            ("key", _) => return Err(CommandError::Usage(":key <name>")),
            (other, _) => return Err(CommandError::Unknown(other.to_owned())),
        };
        Ok(Command::Send(messages))
    }

    fn text(&mut self, text: &str) -> Command {
        Command::Send(self.translator.translate(InputEvent::Text(text.to_owned())))
    }

    fn tap(&mut self, x: u32, y: u32) -> Result<Vec<ControlMessage>, CommandError> {
        if self.translator.frame_size().is_none() {
            return Err(CommandError::NoFrame);
        }
        let mut out = self.translator.translate(InputEvent::PointerDown { x, y });
        out.extend(self.translator.translate(InputEvent::PointerUp { x, y }));
        Ok(out)
    }

    fn key(&mut self, key: Key) -> Vec<ControlMessage> {
        let modifiers = Modifiers::empty();
        let mut out = self.translator.translate(InputEvent::KeyDown {
            key,
            modifiers,
            text: None,
        });
        out.extend(self.translator.translate(InputEvent::KeyUp { key, modifiers }));
        out
    }
}

fn parse_key(name: &str) -> Option<Key> {
    let key = match name.to_ascii_lowercase().as_str() {
        "enter" | "return" => Key::Enter,
        "tab" => Key::Tab,
        "esc" | "escape" => Key::Escape,
        "backspace" => Key::Backspace,
        "delete" | "del" => Key::Delete,
        "space" => Key::Space,
        "up" => Key::Up,
        "down" => Key::Down,
        "left" => Key::Left,
        "right" => Key::Right,
        "home" => Key::Home,
        other => {
            let mut chars = other.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) if c.is_ascii_alphabetic() => Key::Char(c),
                _ => return None,
            }
        }
    };
    Some(key)
}

// ── Tests ────────────────────────────────────────────────────────
