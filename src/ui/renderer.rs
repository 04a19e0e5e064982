//! Terminal renderer using crossterm
//!
//! Draws the output rows, the status bar and the input line. Styled runs
//! are rendered with native terminal attributes and colors.

use std::io::{self, Write};

use crossterm::{
    cursor::{Hide, MoveTo, Show},
    execute, queue,
    style::{
        Attribute, Color, Print, ResetColor, SetAttribute, SetBackgroundColor,
        SetForegroundColor,
    },
    terminal::{
        self, Clear, ClearType, DisableLineWrap, EnableLineWrap, EnterAlternateScreen,
        LeaveAlternateScreen,
    },
};
use unicode_width::UnicodeWidthStr;

use super::input::LineEditor;
use super::view::{Row, StatusInfo};
use crate::config::Theme;
use crate::core::client::LineClass;
use crate::core::format::{AnsiColor, Attr, BaseColor, StyleState};
use crate::core::session::{ConnectionState, NoticeLevel};

/// Input prompt
const PROMPT: &str = "> ";

/// Terminal renderer
pub struct Renderer {
    /// Whether the terminal has been initialized
    initialized: bool,
    theme: Theme,
    status_bar: bool,
}

impl Renderer {
    pub fn new(theme: Theme, status_bar: bool) -> Self {
        Self {
            initialized: false,
            theme,
            status_bar,
        }
    }

    /// Initialize the terminal for rendering
    pub fn init(&mut self) -> io::Result<()> {
        terminal::enable_raw_mode()?;

        let mut stdout = io::stdout();
        execute!(
            stdout,
            EnterAlternateScreen,
            crossterm::event::EnableMouseCapture,
            DisableLineWrap,
            Clear(ClearType::All),
            MoveTo(0, 0)
        )?;

        stdout.flush()?;
        self.initialized = true;
        Ok(())
    }

    /// Cleanup the terminal
    pub fn cleanup(&mut self) -> io::Result<()> {
        if !self.initialized {
            return Ok(());
        }
        self.initialized = false;

        let mut stdout = io::stdout();

        // Reset all attributes first
        let _ = execute!(stdout, ResetColor, SetAttribute(Attribute::Reset));
        let _ = execute!(stdout, Show);
        let _ = execute!(stdout, EnableLineWrap);
        let _ = execute!(stdout, crossterm::event::DisableMouseCapture);
        let _ = execute!(stdout, LeaveAlternateScreen);
        let _ = stdout.flush();

        // Disable raw mode - this is the most important part
        terminal::disable_raw_mode()?;
        Ok(())
    }

    /// Rows available for output on a terminal `rows` tall
    pub fn output_height(&self, rows: u16) -> u16 {
        let chrome = if self.status_bar { 2 } else { 1 };
        rows.saturating_sub(chrome)
    }

    /// Draw a full frame
    pub fn render(
        &mut self,
        size: (u16, u16),
        rows: &[Row],
        status: &StatusInfo,
        editor: &LineEditor,
        input_enabled: bool,
    ) -> io::Result<()> {
        let (cols, term_rows) = size;
        let height = self.output_height(term_rows);

        let stdout = io::stdout();
        let mut out = io::BufWriter::with_capacity(65536, stdout.lock());

        // Begin synchronized update (reduces flicker)
        write!(out, "\x1b[?2026h")?;
        queue!(out, Hide)?;

        for y in 0..height {
            queue!(out, MoveTo(0, y), ResetColor, SetAttribute(Attribute::Reset))?;
            if let Some(row) = rows.get(y as usize) {
                self.draw_row(&mut out, row)?;
            }
            queue!(
                out,
                ResetColor,
                SetAttribute(Attribute::Reset),
                Clear(ClearType::UntilNewLine)
            )?;
        }

        let mut next_row = height;
        if self.status_bar {
            self.draw_status(&mut out, next_row, cols, status)?;
            next_row += 1;
        }

        let cursor_col = self.draw_input(&mut out, next_row, cols, editor, input_enabled)?;
        queue!(out, MoveTo(cursor_col, next_row), Show)?;

        // End synchronized update
        write!(out, "\x1b[?2026l")?;
        out.flush()
    }

    fn draw_row<W: Write>(&self, out: &mut W, row: &Row) -> io::Result<()> {
        let class_color = self.class_color(row.class);

        for run in &row.runs {
            if run.text.is_empty() {
                continue;
            }
            queue!(out, SetAttribute(Attribute::Reset), ResetColor)?;

            match run.style.foreground() {
                Some(color) => queue!(out, SetForegroundColor(ansi_color(color)))?,
                None => {
                    if let Some(color) = class_color {
                        queue!(out, SetForegroundColor(color))?;
                    }
                }
            }
            if let Some(color) = run.style.background() {
                queue!(out, SetBackgroundColor(ansi_color(color)))?;
            }
            for attr in attributes(&run.style) {
                queue!(out, SetAttribute(attr))?;
            }

            queue!(out, Print(&run.text))?;
        }
        Ok(())
    }

    fn class_color(&self, class: LineClass) -> Option<Color> {
        match class {
            LineClass::Server => None,
            LineClass::Markup => Some(self.theme.markup_fg.to_crossterm()),
            LineClass::System => Some(self.theme.system_fg.to_crossterm()),
            LineClass::Error => Some(self.theme.error_fg.to_crossterm()),
            LineClass::UserCommand => Some(self.theme.command_fg.to_crossterm()),
        }
    }

    fn draw_status<W: Write>(
        &self,
        out: &mut W,
        y: u16,
        cols: u16,
        status: &StatusInfo,
    ) -> io::Result<()> {
        let theme = &self.theme;
        let state_color = match status.state {
            ConnectionState::Connected => theme.connected,
            ConnectionState::Connecting => theme.connecting,
            ConnectionState::Disconnected => theme.disconnected,
        };

        let mut label = format!(" ● {}", status.state.label());
        if let Some(target) = &status.target {
            if status.state != ConnectionState::Disconnected {
                label.push_str(&format!(" {}", target));
            }
        }

        let mut flags = format!(
            " │ Pueblo {} │ Reconnect {}",
            on_off(status.markup),
            on_off(status.auto_reconnect)
        );
        if let Some((attempt, max)) = status.reconnect_attempt {
            flags.push_str(&format!(" ({}/{})", attempt, max));
        }
        if status.scrolled {
            flags.push_str(" │ SCROLL");
        }

        queue!(
            out,
            MoveTo(0, y),
            SetAttribute(Attribute::Reset),
            SetBackgroundColor(theme.status_bar_bg.to_crossterm()),
            SetForegroundColor(state_color.to_crossterm()),
            Print(&label),
            SetForegroundColor(theme.status_bar_fg.to_crossterm()),
            Print(&flags)
        )?;
        let mut used = label.width() + flags.width();

        if let Some(notice) = &status.toast {
            let color = match notice.level {
                NoticeLevel::Info => theme.info_fg,
                NoticeLevel::Success => theme.success_fg,
                NoticeLevel::Warning => theme.warning_fg,
                NoticeLevel::Error => theme.error_fg,
            };
            let text = format!(" │ {}", notice.text);
            let available = (cols as usize).saturating_sub(used);
            let text = truncate(&text, available);
            used += text.width();
            queue!(out, SetForegroundColor(color.to_crossterm()), Print(&text))?;
        }

        let pad = (cols as usize).saturating_sub(used);
        queue!(out, Print(" ".repeat(pad)), ResetColor)?;
        Ok(())
    }

    /// Draw the input line; returns the cursor column
    fn draw_input<W: Write>(
        &self,
        out: &mut W,
        y: u16,
        cols: u16,
        editor: &LineEditor,
        input_enabled: bool,
    ) -> io::Result<u16> {
        let prompt_width = PROMPT.width();
        let field = (cols as usize).saturating_sub(prompt_width + 1);
        let (text, cursor) = editor.view(field);

        queue!(out, MoveTo(0, y), SetAttribute(Attribute::Reset), ResetColor)?;
        if input_enabled {
            queue!(out, SetForegroundColor(self.theme.command_fg.to_crossterm()))?;
        } else {
            queue!(out, SetAttribute(Attribute::Dim))?;
        }
        queue!(
            out,
            Print(PROMPT),
            ResetColor,
            SetAttribute(Attribute::Reset),
            Print(&text),
            Clear(ClearType::UntilNewLine)
        )?;

        Ok((prompt_width + cursor).min(cols.saturating_sub(1) as usize) as u16)
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        let _ = self.cleanup();
    }
}

fn on_off(value: bool) -> &'static str {
    if value {
        "on"
    } else {
        "off"
    }
}

/// Cut `text` to at most `width` display columns
fn truncate(text: &str, width: usize) -> String {
    let mut out = String::new();
    let mut used = 0;
    for ch in text.chars() {
        let w = unicode_width::UnicodeWidthChar::width(ch).unwrap_or(0);
        if used + w > width {
            break;
        }
        out.push(ch);
        used += w;
    }
    out
}

/// Terminal attributes for the active style
fn attributes(style: &StyleState) -> Vec<Attribute> {
    [
        (Attr::Bold, Attribute::Bold),
        (Attr::Dim, Attribute::Dim),
        (Attr::Italic, Attribute::Italic),
        (Attr::Underline, Attribute::Underlined),
        (Attr::Blink, Attribute::SlowBlink),
        (Attr::Reverse, Attribute::Reverse),
        (Attr::Hidden, Attribute::Hidden),
        (Attr::Strikethrough, Attribute::CrossedOut),
    ]
    .into_iter()
    .filter(|(attr, _)| style.has_attr(*attr))
    .map(|(_, attribute)| attribute)
    .collect()
}

/// Palette color for an ANSI color
fn ansi_color(color: AnsiColor) -> Color {
    match (color.base, color.bright) {
        (BaseColor::Black, false) => Color::Black,
        (BaseColor::Red, false) => Color::DarkRed,
        (BaseColor::Green, false) => Color::DarkGreen,
        (BaseColor::Yellow, false) => Color::DarkYellow,
        (BaseColor::Blue, false) => Color::DarkBlue,
        (BaseColor::Magenta, false) => Color::DarkMagenta,
        (BaseColor::Cyan, false) => Color::DarkCyan,
        (BaseColor::White, false) => Color::Grey,
        (BaseColor::Black, true) => Color::DarkGrey,
        (BaseColor::Red, true) => Color::Red,
        (BaseColor::Green, true) => Color::Green,
        (BaseColor::Yellow, true) => Color::Yellow,
        (BaseColor::Blue, true) => Color::Blue,
        (BaseColor::Magenta, true) => Color::Magenta,
        (BaseColor::Cyan, true) => Color::Cyan,
        (BaseColor::White, true) => Color::White,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ansi_color_mapping() {
        assert_eq!(ansi_color(AnsiColor::new(BaseColor::Red, false)), Color::DarkRed);
        assert_eq!(ansi_color(AnsiColor::new(BaseColor::Red, true)), Color::Red);
        assert_eq!(ansi_color(AnsiColor::new(BaseColor::Black, true)), Color::DarkGrey);
    }

    #[test]
    fn test_attributes_follow_style() {
        let mut style = StyleState::new();
        style.apply(1);
        style.apply(4);
        style.apply(31);
        assert_eq!(
            attributes(&style),
            vec![Attribute::Bold, Attribute::Underlined]
        );
    }

    #[test]
    fn test_truncate_by_width() {
        assert_eq!(truncate("abc日本", 4), "abc");
        assert_eq!(truncate("abc", 10), "abc");
    }

    #[test]
    fn test_output_height() {
        assert_eq!(Renderer::new(Theme::default(), true).output_height(24), 22);
        assert_eq!(Renderer::new(Theme::default(), false).output_height(24), 23);
        assert_eq!(Renderer::new(Theme::default(), true).output_height(1), 0);
    }
}
