//! Single-line input editor
//!
//! Cursor positions are char indices into the buffer; display columns are
//! computed with `unicode-width` so wide characters place the cursor right.

use unicode_width::UnicodeWidthChar;

use super::keymapper::InputAction;

#[derive(Clone, Debug, Default)]
pub struct LineEditor {
    chars: Vec<char>,
    /// Cursor position (0..=chars.len())
    cursor: usize,
}

impl LineEditor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(&self) -> String {
        self.chars.iter().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Replace the content, cursor at the end
    pub fn set_text(&mut self, text: &str) {
        self.chars = text.chars().collect();
        self.cursor = self.chars.len();
    }

    pub fn clear(&mut self) {
        self.chars.clear();
        self.cursor = 0;
    }

    /// Apply an editing action. Returns true if it was an editing action.
    pub fn apply(&mut self, action: InputAction) -> bool {
        match action {
            InputAction::Insert(ch) => self.insert(ch),
            InputAction::Backspace => {
                if self.cursor > 0 {
                    self.cursor -= 1;
                    self.chars.remove(self.cursor);
                }
            }
            InputAction::Delete => {
                if self.cursor < self.chars.len() {
                    self.chars.remove(self.cursor);
                }
            }
            InputAction::DeleteWord => {
                let start = self.word_start();
                self.chars.drain(start..self.cursor);
                self.cursor = start;
            }
            InputAction::ClearLine => self.clear(),
            InputAction::CursorLeft => self.cursor = self.cursor.saturating_sub(1),
            InputAction::CursorRight => self.cursor = (self.cursor + 1).min(self.chars.len()),
            InputAction::WordLeft => self.cursor = self.word_start(),
            InputAction::WordRight => self.cursor = self.word_end(),
            InputAction::Home => self.cursor = 0,
            InputAction::End => self.cursor = self.chars.len(),
            _ => return false,
        }
        true
    }

    fn insert(&mut self, ch: char) {
        if ch.is_control() {
            return;
        }
        self.chars.insert(self.cursor, ch);
        self.cursor += 1;
    }

    fn word_start(&self) -> usize {
        let mut pos = self.cursor;
        while pos > 0 && self.chars[pos - 1].is_whitespace() {
            pos -= 1;
        }
        while pos > 0 && !self.chars[pos - 1].is_whitespace() {
            pos -= 1;
        }
        pos
    }

    fn word_end(&self) -> usize {
        let len = self.chars.len();
        let mut pos = self.cursor;
        while pos < len && self.chars[pos].is_whitespace() {
            pos += 1;
        }
        while pos < len && !self.chars[pos].is_whitespace() {
            pos += 1;
        }
        pos
    }

    /// Display width of the text before the cursor
    pub fn cursor_column(&self) -> usize {
        self.chars[..self.cursor]
            .iter()
            .map(|c| c.width().unwrap_or(0))
            .sum()
    }

    /// The visible part of the line for a field `width` columns wide, and
    /// the cursor column inside it.
    pub fn view(&self, width: usize) -> (String, usize) {
        if width == 0 {
            return (String::new(), 0);
        }

        // Scroll so the cursor stays inside the field
        let cursor_col = self.cursor_column();
        let skip_cols = (cursor_col + 1).saturating_sub(width);

        let mut out = String::new();
        let mut col = 0;
        let mut used = 0;
        for ch in &self.chars {
            let w = ch.width().unwrap_or(0);
            if col < skip_cols {
                col += w;
                continue;
            }
            if used + w > width {
                break;
            }
            out.push(*ch);
            used += w;
            col += w;
        }
        (out, cursor_col.saturating_sub(skip_cols).min(width))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn editor(text: &str) -> LineEditor {
        let mut e = LineEditor::new();
        e.set_text(text);
        e
    }

    #[test]
    fn test_insert_and_backspace() {
        let mut e = LineEditor::new();
        for ch in "lok".chars() {
            e.apply(InputAction::Insert(ch));
        }
        e.apply(InputAction::CursorLeft);
        e.apply(InputAction::Insert('o'));
        assert_eq!(e.text(), "look");
        assert_eq!(e.cursor(), 3);

        e.apply(InputAction::End);
        e.apply(InputAction::Backspace);
        assert_eq!(e.text(), "loo");
    }

    #[test]
    fn test_delete_word() {
        let mut e = editor("page Bob=hello  ");
        e.apply(InputAction::DeleteWord);
        assert_eq!(e.text(), "page ");
        e.apply(InputAction::DeleteWord);
        assert_eq!(e.text(), "");
    }

    #[test]
    fn test_word_motion() {
        let mut e = editor("say hi there");
        e.apply(InputAction::WordLeft);
        assert_eq!(e.cursor(), 7);
        e.apply(InputAction::WordLeft);
        assert_eq!(e.cursor(), 4);
        e.apply(InputAction::WordRight);
        assert_eq!(e.cursor(), 6);
    }

    #[test]
    fn test_wide_chars_cursor_column() {
        let e = editor("a日本");
        assert_eq!(e.cursor_column(), 5);
    }

    #[test]
    fn test_view_scrolls_to_cursor() {
        let e = editor("abcdefghij");
        let (text, col) = e.view(5);
        assert_eq!(text, "ghij");
        assert_eq!(col, 4);

        let mut e = editor("abcdefghij");
        e.apply(InputAction::Home);
        assert_eq!(e.view(5), ("abcde".to_string(), 0));
    }

    #[test]
    fn test_non_editing_actions_are_ignored() {
        let mut e = editor("x");
        assert!(!e.apply(InputAction::Submit));
        assert!(!e.apply(InputAction::HistoryOlder));
        assert_eq!(e.text(), "x");
    }
}
