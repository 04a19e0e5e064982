//! Escape sequence formatter
//!
//! Scans a text chunk for SGR escape sequences and turns it into styled runs.
//! Other escape sequences and a handful of control characters are dropped.

use super::fragment::{Fragment, StyledRun};
use super::state::{CodeEffect, StyleState};

const ESC: u8 = 0x1B;
const BEL: u8 = 0x07;

/// Control characters that are discarded from visible text
fn is_stripped_control(ch: char) -> bool {
    matches!(
        ch,
        '\x00' // NUL
        | '\x07' // BEL
        | '\x08' // BS
        | '\x0B' // VT
        | '\x0C' // FF
        | '\x0E' // SO
        | '\x0F' // SI
    )
}

/// A classified span of the input chunk
#[derive(Debug, PartialEq, Eq)]
enum Segment<'a> {
    /// Literal text (control characters not yet stripped)
    Text(&'a str),
    /// Select Graphic Rendition codes, left to right
    Sgr(Vec<u16>),
}

/// Split a chunk into literal text and SGR sequences.
///
/// Non-SGR escape sequences are consumed and produce no segment.
fn scan(chunk: &str) -> Vec<Segment<'_>> {
    let bytes = chunk.as_bytes();
    let mut segments = Vec::new();
    let mut text_start = 0;
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] != ESC {
            i += 1;
            continue;
        }

        if text_start < i {
            segments.push(Segment::Text(&chunk[text_start..i]));
        }

        let (consumed, sgr) = parse_escape(&bytes[i..]);
        if let Some(codes) = sgr {
            segments.push(Segment::Sgr(codes));
        }
        i += consumed;
        text_start = i;
    }

    if text_start < bytes.len() {
        segments.push(Segment::Text(&chunk[text_start..]));
    }
    segments
}

/// Parse one escape sequence starting at `bytes[0] == ESC`.
///
/// Returns the number of bytes consumed and, for SGR sequences, the codes.
/// Every consumed byte is ASCII, so slicing the source `str` at the returned
/// boundary stays on a char boundary.
fn parse_escape(bytes: &[u8]) -> (usize, Option<Vec<u16>>) {
    match bytes.get(1) {
        None => (1, None),
        Some(b'[') => parse_csi(bytes),
        Some(b']') => (skip_osc(bytes), None),
        Some(0x20..=0x2F) => {
            // ESC intermediates final, e.g. charset selection ESC ( B
            let mut j = 1;
            while matches!(bytes.get(j), Some(0x20..=0x2F)) {
                j += 1;
            }
            match bytes.get(j) {
                Some(0x30..=0x7E) => (j + 1, None),
                _ => (j, None),
            }
        }
        Some(0x30..=0x7E) => (2, None),
        Some(_) => (1, None),
    }
}

fn parse_csi(bytes: &[u8]) -> (usize, Option<Vec<u16>>) {
    let mut j = 2;
    let params_start = j;
    while matches!(bytes.get(j), Some(0x30..=0x3F)) {
        j += 1;
    }
    let params_end = j;
    while matches!(bytes.get(j), Some(0x20..=0x2F)) {
        j += 1;
    }
    let intermediates = j > params_end;

    let final_byte = match bytes.get(j) {
        Some(&b @ 0x40..=0x7E) => b,
        Some(_) => {
            tracing::debug!("Malformed CSI dropped ({} bytes)", j);
            return (j, None);
        }
        None => {
            tracing::debug!("Incomplete CSI at end of chunk dropped");
            return (j, None);
        }
    };

    let params = &bytes[params_start..params_end];
    let is_sgr = final_byte == b'm'
        && !intermediates
        && params.iter().all(|b| b.is_ascii_digit() || *b == b';');

    if !is_sgr {
        tracing::debug!(
            "Non-SGR CSI dropped: params={:?}, final={:?}",
            String::from_utf8_lossy(params),
            final_byte as char
        );
        return (j + 1, None);
    }

    (j + 1, Some(parse_sgr_params(params)))
}

/// `ESC [ m` means reset; empty fields and out-of-range numbers are skipped.
fn parse_sgr_params(params: &[u8]) -> Vec<u16> {
    if params.is_empty() {
        return vec![0];
    }
    params
        .split(|b| *b == b';')
        .filter(|field| !field.is_empty())
        .filter_map(|field| std::str::from_utf8(field).ok()?.parse::<u16>().ok())
        .collect()
}

/// Skip an OSC string terminated by BEL or ST (ESC \)
fn skip_osc(bytes: &[u8]) -> usize {
    let mut j = 2;
    while j < bytes.len() {
        match bytes[j] {
            BEL => return j + 1,
            ESC => {
                return if bytes.get(j + 1) == Some(&b'\\') { j + 2 } else { j };
            }
            _ => j += 1,
        }
    }
    j
}

/// Accumulates styled runs while codes and text are applied in order
struct RunBuilder {
    runs: Vec<StyledRun>,
    state: StyleState,
}

impl RunBuilder {
    /// Start a chunk, re-opening a container for the carried state
    fn new(carried: &StyleState) -> Self {
        Self {
            runs: vec![StyledRun {
                style: carried.clone(),
                text: String::new(),
            }],
            state: carried.clone(),
        }
    }

    fn container_open(&self) -> bool {
        self.runs.last().map_or(false, |run| !run.style.is_empty())
    }

    fn open(&mut self, style: StyleState) {
        self.runs.push(StyledRun {
            style,
            text: String::new(),
        });
    }

    fn push_text(&mut self, text: &str) {
        if let Some(run) = self.runs.last_mut() {
            run.text.extend(text.chars().filter(|c| !is_stripped_control(*c)));
        }
    }

    fn apply(&mut self, code: u16) {
        let was_open = self.container_open();
        match self.state.apply(code) {
            CodeEffect::Reset => {
                if was_open {
                    self.open(StyleState::new());
                }
            }
            CodeEffect::Applied => {
                let style = self.state.clone();
                self.open(style);
            }
            CodeEffect::Ignored => {
                tracing::trace!("Ignoring SGR code {}", code);
            }
        }
    }

    /// Drop runs that render nothing. Containers opened by an escape
    /// sequence are kept even when empty.
    fn finish(self) -> (Vec<StyledRun>, StyleState) {
        let runs = self
            .runs
            .into_iter()
            .enumerate()
            .filter(|(idx, run)| !run.text.is_empty() || (*idx > 0 && !run.style.is_empty()))
            .map(|(_, run)| run)
            .collect();
        (runs, self.state)
    }
}

/// Format one chunk under the carried style state.
///
/// Returns the styled runs for the chunk and the state to carry into the next
/// chunk of the same stream.
pub fn format_chunk(chunk: &str, carried: &StyleState) -> (Vec<StyledRun>, StyleState) {
    let mut builder = RunBuilder::new(carried);
    for segment in scan(chunk) {
        match segment {
            Segment::Text(text) => builder.push_text(text),
            Segment::Sgr(codes) => {
                for code in codes {
                    builder.apply(code);
                }
            }
        }
    }
    builder.finish()
}

/// Stateful formatter for one logical stream
#[derive(Debug, Clone)]
pub struct EscapeFormatter {
    state: StyleState,
    /// Emit style containers (ANSI colors preference)
    colors: bool,
}

impl Default for EscapeFormatter {
    fn default() -> Self {
        Self::new(true)
    }
}

impl EscapeFormatter {
    pub fn new(colors: bool) -> Self {
        Self {
            state: StyleState::new(),
            colors,
        }
    }

    /// Format a chunk and carry its final style state forward
    pub fn format(&mut self, chunk: &str) -> Fragment {
        let (runs, state) = format_chunk(chunk, &self.state);
        self.state = state;

        if self.colors {
            Fragment::Styled(runs)
        } else {
            let text: String = runs.into_iter().map(|r| r.text).collect();
            Fragment::text(text)
        }
    }

    pub fn state(&self) -> &StyleState {
        &self.state
    }

    pub fn set_colors(&mut self, colors: bool) {
        self.colors = colors;
    }

    pub fn colors(&self) -> bool {
        self.colors
    }

    /// Forget carried styling (stream reset or disconnect)
    pub fn reset(&mut self) {
        self.state.reset();
    }
}
