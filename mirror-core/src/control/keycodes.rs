//! Android key codes and meta-state flags.
//!
//! Values follow `android.view.KeyEvent`.

use bitflags::bitflags;

/// An Android `AKEYCODE_*` value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AndroidKeycode(pub u32);

impl AndroidKeycode {
    pub const UNKNOWN: Self = Self(0);
    pub const HOME: Self = Self(3);
    pub const BACK: Self = Self(4);
    pub const DPAD_UP: Self = Self(19);
    pub const DPAD_DOWN: Self = Self(20);
    pub const DPAD_LEFT: Self = Self(21);
    pub const DPAD_RIGHT: Self = Self(22);
    pub const VOLUME_UP: Self = Self(24);
    pub const VOLUME_DOWN: Self = Self(25);
    pub const POWER: Self = Self(26);
    pub const A: Self = Self(29);
    pub const Z: Self = Self(54);
    pub const COMMA: Self = Self(55);
    pub const PERIOD: Self = Self(56);
    pub const ALT_LEFT: Self = Self(57);
    pub const ALT_RIGHT: Self = Self(58);
    pub const SHIFT_LEFT: Self = Self(59);
    pub const SHIFT_RIGHT: Self = Self(60);
    pub const TAB: Self = Self(61);
    pub const SPACE: Self = Self(62);
    pub const ENTER: Self = Self(66);
    pub const DEL: Self = Self(67);
    pub const MENU: Self = Self(82);
    pub const ESCAPE: Self = Self(111);
    pub const FORWARD_DEL: Self = Self(112);
    pub const CTRL_LEFT: Self = Self(113);
    pub const CTRL_RIGHT: Self = Self(114);
    pub const APP_SWITCH: Self = Self(187);

    /// Key code of an ASCII letter, case-insensitive.
    pub fn letter(c: char) -> Option<Self> {
        let c = c.to_ascii_uppercase();
        c.is_ascii_uppercase()
            .then(|| Self(Self::A.0 + (c as u32 - 'A' as u32)))
    }

    pub const fn code(self) -> u32 {
        self.0
    }
}

bitflags! {
    /// `AMETA_*` modifier state sent with key events.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct MetaState: u32 {
        const SHIFT = 0x01;
        const ALT = 0x02;
        const CTRL = 0x1000;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn letters_span_a_to_z() {
        assert_eq!(AndroidKeycode::letter('a'), Some(AndroidKeycode::A));
        assert_eq!(AndroidKeycode::letter('Z'), Some(AndroidKeycode::Z));
        assert_eq!(AndroidKeycode::letter('m'), Some(AndroidKeycode(41)));
        assert_eq!(AndroidKeycode::letter('1'), None);
        assert_eq!(AndroidKeycode::letter('é'), None);
    }

    #[test]
    fn meta_bits() {
        assert_eq!((MetaState::SHIFT | MetaState::ALT).bits(), 0x03);
        assert_eq!(MetaState::empty().bits(), 0);
    }
}
