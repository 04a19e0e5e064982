//! Inbound text formatting pipeline
//!
//! ```text
//! chunk ─► MarkupDetector ─┬─► EscapeFormatter ─► Fragment::Styled
//!                          ├─► (trusted)        ─► Fragment::Trusted
//!                          └─► marker note
//! ```
//!
//! Both the style state and the markup mode live here and are mutated only
//! by the chunk currently being processed.

pub mod fragment;
pub mod markup;
pub mod parser;
pub mod state;

pub use fragment::{escape_html, Fragment, FragmentKind, StyledRun};
pub use markup::{Marker, MarkupDetector, MarkupMode, Routed, CAPABILITY_ANNOUNCEMENT};
pub use parser::{format_chunk, EscapeFormatter};
pub use state::{AnsiColor, Attr, BaseColor, CodeEffect, StyleState, StyleToken};

/// Output of the pipeline for one piece of a chunk
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Formatted {
    Fragment(Fragment),
    Note(Marker),
}

/// Markup detector and escape formatter for one session stream
#[derive(Debug, Clone, Default)]
pub struct OutputPipeline {
    markup: MarkupDetector,
    formatter: EscapeFormatter,
}

impl OutputPipeline {
    pub fn new(markup_enabled: bool, colors: bool) -> Self {
        Self {
            markup: MarkupDetector::new(markup_enabled),
            formatter: EscapeFormatter::new(colors),
        }
    }

    /// Process one inbound chunk in arrival order
    pub fn process(&mut self, chunk: &str) -> Vec<Formatted> {
        self.markup
            .route(chunk)
            .into_iter()
            .map(|routed| match routed {
                Routed::Format(text) => Formatted::Fragment(self.formatter.format(&text)),
                Routed::Trusted(markup) => Formatted::Fragment(Fragment::Trusted(markup)),
                Routed::Note(marker) => Formatted::Note(marker),
            })
            .collect()
    }

    /// Format locally generated text (notes, echoes) without touching the
    /// stream's carried style or markup mode
    pub fn format_local(&self, text: &str) -> Fragment {
        let mut formatter = EscapeFormatter::new(self.formatter.colors());
        formatter.format(text)
    }

    pub fn markup_mode(&self) -> MarkupMode {
        self.markup.mode()
    }

    pub fn markup_enabled(&self) -> bool {
        self.markup.is_enabled()
    }

    pub fn set_markup_enabled(&mut self, enabled: bool) {
        self.markup.set_enabled(enabled);
    }

    pub fn set_colors(&mut self, colors: bool) {
        self.formatter.set_colors(colors);
    }

    pub fn style(&self) -> &StyleState {
        self.formatter.state()
    }

    /// Stream reset: clear carried style and leave any markup block
    pub fn reset(&mut self) {
        self.formatter.reset();
        self.markup.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_markup_block_bypasses_formatter() {
        let mut pipeline = OutputPipeline::new(true, true);
        let mut out = Vec::new();
        out.extend(pipeline.process("$#$#html_start"));
        out.extend(pipeline.process("<b>bold</b>"));
        out.extend(pipeline.process("$#$#html_end"));

        assert_eq!(
            out,
            vec![
                Formatted::Note(Marker::BlockStart),
                Formatted::Fragment(Fragment::Trusted("<b>bold</b>".to_string())),
                Formatted::Note(Marker::BlockEnd),
            ]
        );
    }

    #[test]
    fn test_marker_is_text_when_disabled() {
        let mut pipeline = OutputPipeline::new(false, true);
        let out = pipeline.process("\x1b[1m$#$#html_start");
        assert_eq!(out.len(), 1);
        match &out[0] {
            Formatted::Fragment(fragment) => {
                assert_eq!(fragment.kind(), FragmentKind::Styled);
                assert_eq!(
                    fragment.to_html(),
                    "<span class=\"bold\">$#$#html_start</span>"
                );
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_local_text_leaves_stream_style() {
        let mut pipeline = OutputPipeline::new(false, true);
        pipeline.process("\x1b[31mred");
        assert_eq!(pipeline.format_local("note <1>").to_html(), "note &lt;1&gt;");
        assert_eq!(pipeline.style().class_list(), "ansi-red");

        pipeline.reset();
        assert!(pipeline.style().is_empty());
    }
}
