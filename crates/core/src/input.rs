//! Host pointer and keyboard event records

use crate::annotation::Point;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PointerKind {
    Down,
    Move,
    Up,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
    /// Cmd on macOS, the Windows key elsewhere
    pub meta: bool,
    pub alt: bool,
}

impl Modifiers {
    pub const NONE: Modifiers = Modifiers { shift: false, ctrl: false, meta: false, alt: false };

    /// Ctrl or Cmd, whichever the platform uses for shortcuts
    pub fn command(&self) -> bool {
        self.ctrl || self.meta
    }
}

/// Pointer event in client (window) coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerEvent {
    pub client_x: f32,
    pub client_y: f32,
    pub kind: PointerKind,
    pub modifiers: Modifiers,
}

impl PointerEvent {
    pub fn new(kind: PointerKind, client_x: f32, client_y: f32) -> Self {
        Self { client_x, client_y, kind, modifiers: Modifiers::NONE }
    }

    pub fn down(client_x: f32, client_y: f32) -> Self {
        Self::new(PointerKind::Down, client_x, client_y)
    }

    pub fn moved(client_x: f32, client_y: f32) -> Self {
        Self::new(PointerKind::Move, client_x, client_y)
    }

    pub fn up(client_x: f32, client_y: f32) -> Self {
        Self::new(PointerKind::Up, client_x, client_y)
    }

    pub fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }

    pub fn client(&self) -> Point {
        Point::new(self.client_x, self.client_y)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    Escape,
    Delete,
    Backspace,
    Enter,
    Character(char),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyEvent {
    pub key: Key,
    pub modifiers: Modifiers,
}

impl KeyEvent {
    pub fn new(key: Key) -> Self {
        Self { key, modifiers: Modifiers::NONE }
    }

    pub fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }

    /// Ctrl/Cmd + `ch`, case-insensitive
    pub fn is_command(&self, ch: char) -> bool {
        self.modifiers.command()
            && matches!(self.key, Key::Character(c) if c.eq_ignore_ascii_case(&ch))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_accepts_ctrl_or_meta() {
        let ctrl = Modifiers { ctrl: true, ..Default::default() };
        let meta = Modifiers { meta: true, ..Default::default() };
        assert!(ctrl.command());
        assert!(meta.command());
        assert!(!Modifiers::NONE.command());
    }

    #[test]
    fn test_is_command_ignores_case() {
        let modifiers = Modifiers { meta: true, shift: true, ..Default::default() };
        let event = KeyEvent::new(Key::Character('Z')).with_modifiers(modifiers);
        assert!(event.is_command('z'));
        assert!(!KeyEvent::new(Key::Character('z')).is_command('z'));
    }
}
