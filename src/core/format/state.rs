//! Style state
//!
//! Defines the style vocabulary (attributes, foreground and background
//! colors) and the ordered set of active tokens carried between chunks.

use std::fmt;

/// Basic text attributes
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Attr {
    Bold,
    Dim,
    Italic,
    Underline,
    Blink,
    Reverse,
    Hidden,
    Strikethrough,
}

impl Attr {
    pub fn class_name(self) -> &'static str {
        match self {
            Attr::Bold => "bold",
            Attr::Dim => "dim",
            Attr::Italic => "italic",
            Attr::Underline => "underline",
            Attr::Blink => "blink",
            Attr::Reverse => "reverse",
            Attr::Hidden => "hidden",
            Attr::Strikethrough => "strikethrough",
        }
    }
}

/// The eight standard terminal colors
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BaseColor {
    Black,
    Red,
    Green,
    Yellow,
    Blue,
    Magenta,
    Cyan,
    White,
}

impl BaseColor {
    const ALL: [BaseColor; 8] = [
        BaseColor::Black,
        BaseColor::Red,
        BaseColor::Green,
        BaseColor::Yellow,
        BaseColor::Blue,
        BaseColor::Magenta,
        BaseColor::Cyan,
        BaseColor::White,
    ];

    /// Color for an SGR offset (0..=7)
    fn from_offset(offset: u16) -> Option<Self> {
        Self::ALL.get(offset as usize).copied()
    }

    pub fn name(self) -> &'static str {
        match self {
            BaseColor::Black => "black",
            BaseColor::Red => "red",
            BaseColor::Green => "green",
            BaseColor::Yellow => "yellow",
            BaseColor::Blue => "blue",
            BaseColor::Magenta => "magenta",
            BaseColor::Cyan => "cyan",
            BaseColor::White => "white",
        }
    }
}

/// A standard or bright palette color
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct AnsiColor {
    pub base: BaseColor,
    pub bright: bool,
}

impl AnsiColor {
    pub const fn new(base: BaseColor, bright: bool) -> Self {
        Self { base, bright }
    }
}

/// A single style token.
///
/// Each token maps to exactly one CSS class name of the output vocabulary.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StyleToken {
    Attr(Attr),
    Fg(AnsiColor),
    Bg(AnsiColor),
}

/// Exclusivity class of a token
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenClass {
    Attribute,
    Foreground,
    Background,
}

impl StyleToken {
    /// Classify a numeric SGR code. Returns `None` for reset (0) and for
    /// codes outside the vocabulary.
    pub fn from_code(code: u16) -> Option<Self> {
        let token = match code {
            1 => StyleToken::Attr(Attr::Bold),
            2 => StyleToken::Attr(Attr::Dim),
            3 => StyleToken::Attr(Attr::Italic),
            4 => StyleToken::Attr(Attr::Underline),
            5 => StyleToken::Attr(Attr::Blink),
            7 => StyleToken::Attr(Attr::Reverse),
            8 => StyleToken::Attr(Attr::Hidden),
            9 => StyleToken::Attr(Attr::Strikethrough),
            30..=37 => StyleToken::Fg(AnsiColor::new(BaseColor::from_offset(code - 30)?, false)),
            90..=97 => StyleToken::Fg(AnsiColor::new(BaseColor::from_offset(code - 90)?, true)),
            40..=47 => StyleToken::Bg(AnsiColor::new(BaseColor::from_offset(code - 40)?, false)),
            100..=107 => StyleToken::Bg(AnsiColor::new(BaseColor::from_offset(code - 100)?, true)),
            _ => return None,
        };
        Some(token)
    }

    pub fn class(&self) -> TokenClass {
        match self {
            StyleToken::Attr(_) => TokenClass::Attribute,
            StyleToken::Fg(_) => TokenClass::Foreground,
            StyleToken::Bg(_) => TokenClass::Background,
        }
    }

    /// CSS class name, e.g. `bold`, `ansi-bright-red`, `bg-blue`
    pub fn class_name(&self) -> String {
        match self {
            StyleToken::Attr(attr) => attr.class_name().to_string(),
            StyleToken::Fg(color) => color_class("ansi", color),
            StyleToken::Bg(color) => color_class("bg", color),
        }
    }
}

fn color_class(prefix: &str, color: &AnsiColor) -> String {
    if color.bright {
        format!("{}-bright-{}", prefix, color.base.name())
    } else {
        format!("{}-{}", prefix, color.base.name())
    }
}

impl fmt::Display for StyleToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.class_name())
    }
}

/// Outcome of applying one SGR code to a [`StyleState`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CodeEffect {
    /// Code 0: the state was cleared
    Reset,
    /// A recognized token was applied
    Applied,
    /// Unknown code, state untouched
    Ignored,
}

/// Ordered set of active style tokens.
///
/// Holds at most one foreground and one background color, and no duplicate
/// attributes. Tokens keep insertion order, which is also the order of the
/// rendered class list.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StyleState {
    tokens: Vec<StyleToken>,
}

impl StyleState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a single numeric SGR code
    pub fn apply(&mut self, code: u16) -> CodeEffect {
        if code == 0 {
            self.reset();
            return CodeEffect::Reset;
        }

        match StyleToken::from_code(code) {
            Some(token) => {
                self.push(token);
                CodeEffect::Applied
            }
            None => CodeEffect::Ignored,
        }
    }

    /// Add a token, replacing any token of the same color class
    pub fn push(&mut self, token: StyleToken) {
        match token.class() {
            TokenClass::Attribute => {
                if self.tokens.contains(&token) {
                    return;
                }
            }
            class => self.tokens.retain(|t| t.class() != class),
        }
        self.tokens.push(token);
    }

    pub fn reset(&mut self) {
        self.tokens.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn tokens(&self) -> &[StyleToken] {
        &self.tokens
    }

    pub fn foreground(&self) -> Option<AnsiColor> {
        self.tokens.iter().find_map(|t| match t {
            StyleToken::Fg(color) => Some(*color),
            _ => None,
        })
    }

    pub fn background(&self) -> Option<AnsiColor> {
        self.tokens.iter().find_map(|t| match t {
            StyleToken::Bg(color) => Some(*color),
            _ => None,
        })
    }

    pub fn has_attr(&self, attr: Attr) -> bool {
        self.tokens.contains(&StyleToken::Attr(attr))
    }

    /// Space-separated class list in insertion order
    pub fn class_list(&self) -> String {
        self.tokens
            .iter()
            .map(StyleToken::class_name)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_classification() {
        assert_eq!(StyleToken::from_code(1), Some(StyleToken::Attr(Attr::Bold)));
        assert_eq!(StyleToken::from_code(6), None);
        assert_eq!(StyleToken::from_code(38), None);
        assert_eq!(
            StyleToken::from_code(91).map(|t| t.class_name()),
            Some("ansi-bright-red".to_string())
        );
        assert_eq!(
            StyleToken::from_code(107).map(|t| t.class_name()),
            Some("bg-bright-white".to_string())
        );
        assert_eq!(
            StyleToken::from_code(44).map(|t| t.class_name()),
            Some("bg-blue".to_string())
        );
    }

    #[test]
    fn test_color_replaces_same_class_only() {
        let mut state = StyleState::new();
        state.apply(1);
        state.apply(31);
        state.apply(42);
        state.apply(34);

        assert_eq!(state.class_list(), "bold bg-green ansi-blue");
        assert_eq!(state.foreground(), Some(AnsiColor::new(BaseColor::Blue, false)));
        assert_eq!(state.background(), Some(AnsiColor::new(BaseColor::Green, false)));
    }

    #[test]
    fn test_reset_and_ignored() {
        let mut state = StyleState::new();
        assert_eq!(state.apply(4), CodeEffect::Applied);
        assert_eq!(state.apply(4), CodeEffect::Applied);
        assert_eq!(state.class_list(), "underline");

        assert_eq!(state.apply(58), CodeEffect::Ignored);
        assert_eq!(state.class_list(), "underline");

        assert_eq!(state.apply(0), CodeEffect::Reset);
        assert!(state.is_empty());
    }
}
