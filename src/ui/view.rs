//! Output buffer and status information for the terminal front end
//!
//! Keeps the received [`OutputLine`]s, wraps them to the screen width and
//! tracks the scroll position. Nothing here touches the terminal.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use unicode_width::UnicodeWidthChar;

use crate::core::client::{LineClass, OutputLine};
use crate::core::format::{Fragment, StyleState, StyledRun};
use crate::core::session::{ConnectionState, Notice};

/// Lines kept in the output buffer
pub const SCROLLBACK_LIMIT: usize = 5000;
/// How long a toast stays in the status bar
pub const TOAST_DURATION: Duration = Duration::from_secs(4);

/// One display row
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Row {
    pub class: LineClass,
    pub runs: Vec<StyledRun>,
}

impl Row {
    fn new(class: LineClass) -> Self {
        Self {
            class,
            runs: Vec::new(),
        }
    }

    fn push(&mut self, style: &StyleState, ch: char) {
        match self.runs.last_mut() {
            Some(run) if run.style == *style => run.text.push(ch),
            _ => self.runs.push(StyledRun {
                style: style.clone(),
                text: ch.to_string(),
            }),
        }
    }

    pub fn text(&self) -> String {
        self.runs.iter().map(|r| r.text.as_str()).collect()
    }
}

/// Scrollable output buffer
#[derive(Debug)]
pub struct OutputView {
    lines: VecDeque<OutputLine>,
    max_lines: usize,
    /// Rows scrolled back from the bottom
    scroll: usize,
}

impl Default for OutputView {
    fn default() -> Self {
        Self::new(SCROLLBACK_LIMIT)
    }
}

impl OutputView {
    pub fn new(max_lines: usize) -> Self {
        Self {
            lines: VecDeque::new(),
            max_lines: max_lines.max(1),
            scroll: 0,
        }
    }

    pub fn push(&mut self, line: OutputLine) {
        self.lines.push_back(line);
        while self.lines.len() > self.max_lines {
            self.lines.pop_front();
        }
    }

    pub fn clear(&mut self) {
        self.lines.clear();
        self.scroll = 0;
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn scroll(&self) -> usize {
        self.scroll
    }

    pub fn scroll_up(&mut self, rows: usize) {
        self.scroll = self.scroll.saturating_add(rows);
    }

    pub fn scroll_down(&mut self, rows: usize) {
        self.scroll = self.scroll.saturating_sub(rows);
    }

    pub fn scroll_to_bottom(&mut self) {
        self.scroll = 0;
    }

    /// Rows to show in a `width` x `height` area, top to bottom.
    /// The scroll offset is clamped to the available history.
    pub fn visible_rows(&mut self, width: usize, height: usize) -> Vec<Row> {
        if width == 0 || height == 0 {
            return Vec::new();
        }

        // Wrap from the newest line back until the window is covered
        let wanted = height.saturating_add(self.scroll);
        let mut rows: VecDeque<Row> = VecDeque::new();
        for line in self.lines.iter().rev() {
            for row in wrap_line(line, width).into_iter().rev() {
                rows.push_front(row);
            }
            if rows.len() >= wanted {
                break;
            }
        }

        let max_scroll = rows.len().saturating_sub(height);
        self.scroll = self.scroll.min(max_scroll);

        let end = rows.len() - self.scroll;
        let start = end.saturating_sub(height);
        rows.into_iter().skip(start).take(end - start).collect()
    }
}

/// Split a line into display rows no wider than `width`
pub fn wrap_line(line: &OutputLine, width: usize) -> Vec<Row> {
    let runs = match &line.fragment {
        Fragment::Styled(runs) => runs.clone(),
        Fragment::Trusted(markup) => vec![StyledRun::plain(markup_text(markup))],
    };

    let width = width.max(1);
    let mut rows = Vec::new();
    let mut row = Row::new(line.class);
    let mut used = 0;

    for run in &runs {
        for ch in run.text.chars() {
            if ch == '\n' {
                rows.push(std::mem::replace(&mut row, Row::new(line.class)));
                used = 0;
                continue;
            }
            let w = match ch {
                '\t' => 1,
                _ => ch.width().unwrap_or(0),
            };
            if used + w > width && used > 0 {
                rows.push(std::mem::replace(&mut row, Row::new(line.class)));
                used = 0;
            }
            row.push(&run.style, if ch == '\t' { ' ' } else { ch });
            used += w;
        }
    }
    rows.push(row);
    rows
}

/// Visible text of a trusted markup block: tags removed, common entities
/// decoded.
pub fn markup_text(markup: &str) -> String {
    let mut text = String::with_capacity(markup.len());
    let mut in_tag = false;
    for ch in markup.chars() {
        match ch {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if !in_tag => text.push(ch),
            _ => {}
        }
    }

    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#039;", "'")
        .replace("&#39;", "'")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}

/// Everything the status bar shows
#[derive(Clone, Debug)]
pub struct StatusInfo {
    pub state: ConnectionState,
    pub target: Option<String>,
    pub markup: bool,
    pub auto_reconnect: bool,
    pub reconnect_attempt: Option<(u32, u32)>,
    pub scrolled: bool,
    pub toast: Option<Notice>,
}

/// The most recent toast, expiring after [`TOAST_DURATION`]
#[derive(Debug, Default)]
pub struct ToastSlot {
    current: Option<(Notice, Instant)>,
}

impl ToastSlot {
    pub fn show(&mut self, notice: Notice, now: Instant) {
        self.current = Some((notice, now + TOAST_DURATION));
    }

    /// Current toast; drops it once expired
    pub fn current(&mut self, now: Instant) -> Option<&Notice> {
        if matches!(&self.current, Some((_, expires)) if now >= *expires) {
            self.current = None;
        }
        self.current.as_ref().map(|(notice, _)| notice)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.current.as_ref().map(|(_, expires)| *expires)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::session::NoticeLevel;

    fn server_line(text: &str) -> OutputLine {
        OutputLine {
            class: LineClass::Server,
            fragment: Fragment::Styled(vec![StyledRun::plain(text)]),
        }
    }

    #[test]
    fn test_wrap_keeps_styles() {
        let mut red = StyleState::new();
        red.apply(31);
        let line = OutputLine {
            class: LineClass::Server,
            fragment: Fragment::Styled(vec![
                StyledRun::plain("abc"),
                StyledRun {
                    style: red.clone(),
                    text: "defg".to_string(),
                },
            ]),
        };

        let rows = wrap_line(&line, 4);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].text(), "abcd");
        assert_eq!(rows[0].runs.len(), 2);
        assert_eq!(rows[1].runs, vec![StyledRun { style: red, text: "efg".to_string() }]);
    }

    #[test]
    fn test_wrap_wide_chars_and_newlines() {
        let rows = wrap_line(&server_line("日本語\nx"), 4);
        let texts: Vec<String> = rows.iter().map(Row::text).collect();
        assert_eq!(texts, vec!["日本", "語", "x"]);
    }

    #[test]
    fn test_empty_line_is_one_row() {
        assert_eq!(wrap_line(&server_line(""), 10).len(), 1);
    }

    #[test]
    fn test_markup_text() {
        assert_eq!(
            markup_text("<b>Tom &amp; <i>Jerry</i></b> &lt;3"),
            "Tom & Jerry <3"
        );
    }

    #[test]
    fn test_visible_rows_and_scroll_clamp() {
        let mut view = OutputView::new(100);
        for i in 0..10 {
            view.push(server_line(&format!("line {}", i)));
        }

        let rows = view.visible_rows(80, 3);
        let texts: Vec<String> = rows.iter().map(Row::text).collect();
        assert_eq!(texts, vec!["line 7", "line 8", "line 9"]);

        view.scroll_up(2);
        let texts: Vec<String> = view.visible_rows(80, 3).iter().map(Row::text).collect();
        assert_eq!(texts, vec!["line 5", "line 6", "line 7"]);

        view.scroll_up(100);
        let texts: Vec<String> = view.visible_rows(80, 3).iter().map(Row::text).collect();
        assert_eq!(texts, vec!["line 0", "line 1", "line 2"]);
        assert_eq!(view.scroll(), 7);
    }

    #[test]
    fn test_scrollback_limit() {
        let mut view = OutputView::new(2);
        view.push(server_line("a"));
        view.push(server_line("b"));
        view.push(server_line("c"));
        assert_eq!(view.len(), 2);
        let texts: Vec<String> = view.visible_rows(10, 5).iter().map(Row::text).collect();
        assert_eq!(texts, vec!["b", "c"]);
    }

    #[test]
    fn test_toast_expires() {
        let now = Instant::now();
        let mut slot = ToastSlot::default();
        slot.show(Notice::new(NoticeLevel::Success, "Connected"), now);
        assert!(slot.current(now).is_some());
        assert!(slot.current(now + TOAST_DURATION).is_none());
        assert!(slot.deadline().is_none());
    }
}
