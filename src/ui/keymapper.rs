//! Key mapping for the input line
//!
//! Converts crossterm key events to editor and client actions.

use bitflags::bitflags;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};

bitflags! {
    /// Modifier keys
    #[derive(Clone, Copy, Debug, Default, PartialEq)]
    pub struct Modifiers: u8 {
        const SHIFT = 0b0001;
        const CTRL  = 0b0010;
        const ALT   = 0b0100;
    }
}

impl From<KeyModifiers> for Modifiers {
    fn from(mods: KeyModifiers) -> Self {
        let mut result = Modifiers::empty();
        if mods.contains(KeyModifiers::SHIFT) {
            result |= Modifiers::SHIFT;
        }
        if mods.contains(KeyModifiers::CONTROL) {
            result |= Modifiers::CTRL;
        }
        if mods.contains(KeyModifiers::ALT) {
            result |= Modifiers::ALT;
        }
        result
    }
}

/// What a key press asks for
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InputAction {
    /// Insert a character at the cursor
    Insert(char),
    Backspace,
    Delete,
    /// Delete the word before the cursor
    DeleteWord,
    /// Clear the whole input line
    ClearLine,
    CursorLeft,
    CursorRight,
    WordLeft,
    WordRight,
    Home,
    End,

    Submit,
    HistoryOlder,
    HistoryNewer,

    /// Scroll the output view
    ScrollUp(u16),
    ScrollDown(u16),
    ScrollToBottom,

    ClearOutput,
    TogglePueblo,
    ToggleReconnect,
    ToggleColors,
    Quit,
}

/// Lines scrolled per page key
const PAGE_SCROLL: u16 = 10;
/// Lines scrolled per wheel notch
const WHEEL_SCROLL: u16 = 3;

/// Key mapper for converting key events to actions
pub struct KeyMapper;

impl KeyMapper {
    /// Map a crossterm KeyEvent to an action
    pub fn map(event: &KeyEvent) -> Option<InputAction> {
        let mods = Modifiers::from(event.modifiers);

        if mods.contains(Modifiers::CTRL) {
            return Self::map_ctrl(event.code);
        }

        match event.code {
            KeyCode::Char(ch) => {
                if mods.contains(Modifiers::ALT) {
                    return Self::map_alt(ch);
                }
                Some(InputAction::Insert(ch))
            }

            KeyCode::Enter => Some(InputAction::Submit),
            KeyCode::Backspace => {
                if mods.contains(Modifiers::ALT) {
                    Some(InputAction::DeleteWord)
                } else {
                    Some(InputAction::Backspace)
                }
            }
            KeyCode::Delete => Some(InputAction::Delete),
            KeyCode::Esc => Some(InputAction::ClearLine),

            KeyCode::Up => Some(InputAction::HistoryOlder),
            KeyCode::Down => Some(InputAction::HistoryNewer),
            KeyCode::Left => Some(InputAction::CursorLeft),
            KeyCode::Right => Some(InputAction::CursorRight),
            KeyCode::Home => Some(InputAction::Home),
            KeyCode::End => {
                if mods.contains(Modifiers::SHIFT) {
                    Some(InputAction::ScrollToBottom)
                } else {
                    Some(InputAction::End)
                }
            }

            KeyCode::PageUp => Some(InputAction::ScrollUp(PAGE_SCROLL)),
            KeyCode::PageDown => Some(InputAction::ScrollDown(PAGE_SCROLL)),

            KeyCode::F(2) => Some(InputAction::TogglePueblo),
            KeyCode::F(3) => Some(InputAction::ToggleReconnect),
            KeyCode::F(4) => Some(InputAction::ToggleColors),

            _ => None,
        }
    }

    /// Ctrl combinations (readline-style where one exists)
    fn map_ctrl(code: KeyCode) -> Option<InputAction> {
        match code {
            KeyCode::Char(ch) => match ch.to_ascii_lowercase() {
                'a' => Some(InputAction::Home),
                'e' => Some(InputAction::End),
                'b' => Some(InputAction::CursorLeft),
                'f' => Some(InputAction::CursorRight),
                'h' => Some(InputAction::Backspace),
                'd' => Some(InputAction::Delete),
                'w' => Some(InputAction::DeleteWord),
                'u' => Some(InputAction::ClearLine),
                'p' => Some(InputAction::HistoryOlder),
                'n' => Some(InputAction::HistoryNewer),
                'l' => Some(InputAction::ClearOutput),
                'c' | 'q' => Some(InputAction::Quit),
                _ => None,
            },
            KeyCode::Left => Some(InputAction::WordLeft),
            KeyCode::Right => Some(InputAction::WordRight),
            KeyCode::End => Some(InputAction::ScrollToBottom),
            _ => None,
        }
    }

    fn map_alt(ch: char) -> Option<InputAction> {
        match ch {
            'b' => Some(InputAction::WordLeft),
            'f' => Some(InputAction::WordRight),
            _ => None,
        }
    }

    /// Map mouse wheel events to scrolling
    pub fn map_mouse(event: &MouseEvent) -> Option<InputAction> {
        match event.kind {
            MouseEventKind::ScrollUp => Some(InputAction::ScrollUp(WHEEL_SCROLL)),
            MouseEventKind::ScrollDown => Some(InputAction::ScrollDown(WHEEL_SCROLL)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyEventState;

    fn key(code: KeyCode, modifiers: KeyModifiers) -> KeyEvent {
        KeyEvent {
            code,
            modifiers,
            kind: crossterm::event::KeyEventKind::Press,
            state: KeyEventState::NONE,
        }
    }

    #[test]
    fn test_map_plain_keys() {
        assert_eq!(
            KeyMapper::map(&key(KeyCode::Char('x'), KeyModifiers::NONE)),
            Some(InputAction::Insert('x'))
        );
        assert_eq!(
            KeyMapper::map(&key(KeyCode::Char('X'), KeyModifiers::SHIFT)),
            Some(InputAction::Insert('X'))
        );
        assert_eq!(
            KeyMapper::map(&key(KeyCode::Enter, KeyModifiers::NONE)),
            Some(InputAction::Submit)
        );
    }

    #[test]
    fn test_map_history_keys() {
        assert_eq!(
            KeyMapper::map(&key(KeyCode::Up, KeyModifiers::NONE)),
            Some(InputAction::HistoryOlder)
        );
        assert_eq!(
            KeyMapper::map(&key(KeyCode::Down, KeyModifiers::NONE)),
            Some(InputAction::HistoryNewer)
        );
        assert_eq!(
            KeyMapper::map(&key(KeyCode::Char('p'), KeyModifiers::CONTROL)),
            Some(InputAction::HistoryOlder)
        );
    }

    #[test]
    fn test_map_ctrl_keys() {
        assert_eq!(
            KeyMapper::map(&key(KeyCode::Char('c'), KeyModifiers::CONTROL)),
            Some(InputAction::Quit)
        );
        assert_eq!(
            KeyMapper::map(&key(KeyCode::Char('W'), KeyModifiers::CONTROL | KeyModifiers::SHIFT)),
            Some(InputAction::DeleteWord)
        );
        assert_eq!(
            KeyMapper::map(&key(KeyCode::Char('z'), KeyModifiers::CONTROL)),
            None
        );
    }

    #[test]
    fn test_modifiers_from_crossterm() {
        let mods = Modifiers::from(KeyModifiers::CONTROL | KeyModifiers::ALT);
        assert!(mods.contains(Modifiers::CTRL));
        assert!(mods.contains(Modifiers::ALT));
        assert!(!mods.contains(Modifiers::SHIFT));
    }
}
