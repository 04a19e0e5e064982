//! Command history for mushterm
//!
//! Provides command history storage, search, and up/down navigation with a
//! preserved draft of whatever was being typed.

/// Default maximum number of history entries
pub const HISTORY_LIMIT: usize = 100;

/// Command history storage
#[derive(Clone, Debug)]
pub struct CommandHistory {
    /// All submitted commands (newest last)
    entries: Vec<String>,
    /// Maximum entries
    max_entries: usize,
}

impl Default for CommandHistory {
    fn default() -> Self {
        Self::new(HISTORY_LIMIT)
    }
}

impl CommandHistory {
    /// Create an empty history holding at most `max_entries` commands
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: Vec::new(),
            max_entries: max_entries.max(1),
        }
    }

    /// Add a command to history. Blank commands are skipped.
    pub fn add(&mut self, command: &str) -> bool {
        let trimmed = command.trim();
        if trimmed.is_empty() {
            return false;
        }

        self.entries.push(trimmed.to_string());

        // Trim if exceeding limit
        if self.entries.len() > self.max_entries {
            let excess = self.entries.len() - self.max_entries;
            self.entries.drain(..excess);
        }
        true
    }

    /// Replace the whole history (oldest first)
    pub fn replace(&mut self, entries: Vec<String>) {
        self.entries = entries;
        if self.entries.len() > self.max_entries {
            let excess = self.entries.len() - self.max_entries;
            self.entries.drain(..excess);
        }
    }

    /// Entry `back` steps from the newest (0 = newest)
    pub fn from_newest(&self, back: usize) -> Option<&str> {
        let len = self.entries.len();
        if back >= len {
            return None;
        }
        self.entries.get(len - 1 - back).map(String::as_str)
    }

    /// Search history by query (newest first)
    pub fn search(&self, query: &str) -> Vec<&str> {
        let query_lower = query.to_lowercase();
        self.entries
            .iter()
            .rev() // newest first
            .filter(|e| e.to_lowercase().contains(&query_lower))
            .map(String::as_str)
            .collect()
    }

    /// Get recent history (newest first)
    pub fn recent(&self, count: usize) -> Vec<&str> {
        self.entries.iter().rev().take(count).map(String::as_str).collect()
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Navigation direction through history
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    /// Towards older entries (Up)
    Older,
    /// Towards newer entries and finally the draft (Down)
    Newer,
}

/// Cursor over [`CommandHistory`] with a draft buffer.
///
/// `cursor == None` means not navigating: the input shows the draft.
/// `Some(n)` shows the entry `n` steps back from the newest.
#[derive(Clone, Debug, Default)]
pub struct HistoryNavigator {
    history: CommandHistory,
    cursor: Option<usize>,
    draft: String,
}

impl HistoryNavigator {
    pub fn new(max_entries: usize) -> Self {
        Self {
            history: CommandHistory::new(max_entries),
            cursor: None,
            draft: String::new(),
        }
    }

    pub fn history(&self) -> &CommandHistory {
        &self.history
    }

    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    pub fn is_navigating(&self) -> bool {
        self.cursor.is_some()
    }

    /// Record a submitted command, regardless of where the cursor is
    pub fn append(&mut self, command: &str) {
        self.history.add(command);
        self.cursor = None;
        self.draft.clear();
    }

    /// Install a history received from the server
    pub fn replace(&mut self, entries: Vec<String>) {
        self.history.replace(entries);
        self.cursor = None;
    }

    /// Move the cursor. `input` is the current content of the input line,
    /// captured as the draft when navigation starts.
    ///
    /// Returns the new input content, or `None` if nothing changed.
    pub fn navigate(&mut self, direction: Direction, input: &str) -> Option<String> {
        match (direction, self.cursor) {
            (Direction::Older, None) => {
                if self.history.is_empty() {
                    return None;
                }
                self.draft = input.to_string();
                self.cursor = Some(0);
            }
            (Direction::Older, Some(n)) => {
                let oldest = self.history.len().saturating_sub(1);
                if n >= oldest {
                    self.cursor = Some(oldest);
                    return None;
                }
                self.cursor = Some(n + 1);
            }
            (Direction::Newer, None) => return None,
            (Direction::Newer, Some(0)) => {
                self.cursor = None;
                return Some(std::mem::take(&mut self.draft));
            }
            (Direction::Newer, Some(n)) => {
                self.cursor = Some(n - 1);
            }
        }
        self.shown().map(str::to_string)
    }

    /// Entry currently shown, or `None` when the draft is active
    pub fn shown(&self) -> Option<&str> {
        self.cursor.and_then(|n| self.history.from_newest(n))
    }
}
