//! Rendered output fragments
//!
//! A fragment always declares what it is: styled text produced by the escape
//! formatter, or trusted markup passed through from a markup block. Sinks
//! dispatch on that declaration and never inspect the content.

use super::state::StyleState;

/// Literal text rendered under one style container.
///
/// `text` is stored unescaped; escaping happens on HTML rendering.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StyledRun {
    pub style: StyleState,
    pub text: String,
}

impl StyledRun {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            style: StyleState::new(),
            text: text.into(),
        }
    }

    fn write_html(&self, out: &mut String) {
        if self.style.is_empty() {
            escape_html_into(&self.text, out);
        } else {
            out.push_str("<span class=\"");
            out.push_str(&self.style.class_list());
            out.push_str("\">");
            escape_html_into(&self.text, out);
            out.push_str("</span>");
        }
    }
}

/// Declared kind of a fragment
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FragmentKind {
    /// Escaped text with zero or more style containers
    Styled,
    /// Raw markup from a trusted block, inserted as-is
    Trusted,
}

/// One unit of rendered output
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Fragment {
    Styled(Vec<StyledRun>),
    Trusted(String),
}

impl Fragment {
    /// Unstyled text fragment
    pub fn text(text: impl Into<String>) -> Self {
        Fragment::Styled(vec![StyledRun::plain(text)])
    }

    pub fn kind(&self) -> FragmentKind {
        match self {
            Fragment::Styled(_) => FragmentKind::Styled,
            Fragment::Trusted(_) => FragmentKind::Trusted,
        }
    }

    /// HTML rendering. Every container opened here is closed here.
    pub fn to_html(&self) -> String {
        match self {
            Fragment::Styled(runs) => {
                let mut out = String::new();
                for run in runs {
                    run.write_html(&mut out);
                }
                out
            }
            Fragment::Trusted(markup) => markup.clone(),
        }
    }

    /// Visible text without any styling (trusted markup is returned verbatim)
    pub fn plain_text(&self) -> String {
        match self {
            Fragment::Styled(runs) => runs.iter().map(|r| r.text.as_str()).collect(),
            Fragment::Trusted(markup) => markup.clone(),
        }
    }

    /// True if the fragment has no styled containers
    pub fn is_unstyled(&self) -> bool {
        match self {
            Fragment::Styled(runs) => runs.iter().all(|r| r.style.is_empty()),
            Fragment::Trusted(_) => false,
        }
    }
}

/// Escape the five HTML metacharacters
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    escape_html_into(text, &mut out);
    out
}

fn escape_html_into(text: &str, out: &mut String) {
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            _ => out.push(ch),
        }
    }
}
