//! Pueblo markup detection
//!
//! Pueblo-capable servers wrap rich HTML in `$#$#html_start` /
//! `$#$#html_end` markers and announce support with `$#$#pueblo`. The
//! detector consumes those markers and decides, for every piece of a chunk,
//! whether it is trusted markup or text for the escape formatter.

/// Prefix shared by every Pueblo control marker
const MARKER_PREFIX: &str = "$#$#";

/// Command sent to announce client support
pub const CAPABILITY_ANNOUNCEMENT: &str = "$#$#pueblo 1.0";

/// Recognized control markers
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Marker {
    /// `$#$#pueblo` - server supports the markup protocol
    Capability,
    /// `$#$#html_start`
    BlockStart,
    /// `$#$#html_end`
    BlockEnd,
}

impl Marker {
    const ALL: [Marker; 3] = [Marker::Capability, Marker::BlockStart, Marker::BlockEnd];

    pub fn keyword(self) -> &'static str {
        match self {
            Marker::Capability => "pueblo",
            Marker::BlockStart => "html_start",
            Marker::BlockEnd => "html_end",
        }
    }

    /// Informational note shown when the marker is seen
    pub fn note(self) -> &'static str {
        match self {
            Marker::Capability => "Server supports Pueblo HTML",
            Marker::BlockStart => "Entering Pueblo HTML mode",
            Marker::BlockEnd => "Exiting Pueblo HTML mode",
        }
    }

    fn len(self) -> usize {
        MARKER_PREFIX.len() + self.keyword().len()
    }
}

/// Current rendering mode of the stream
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MarkupMode {
    /// Feature off: markers are ordinary text
    #[default]
    Disabled,
    /// Feature on, outside a markup block
    RawText,
    /// Inside a markup block: chunks are trusted markup
    MarkupBlock,
}

/// A routed piece of an inbound chunk
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Routed {
    /// Goes through the escape formatter
    Format(String),
    /// Inserted as trusted markup
    Trusted(String),
    /// A marker was consumed; show this note
    Note(Marker),
}

/// Stateful marker filter in front of the escape formatter
#[derive(Clone, Debug, Default)]
pub struct MarkupDetector {
    mode: MarkupMode,
}

impl MarkupDetector {
    pub fn new(enabled: bool) -> Self {
        let mut detector = Self::default();
        detector.set_enabled(enabled);
        detector
    }

    pub fn mode(&self) -> MarkupMode {
        self.mode
    }

    pub fn is_enabled(&self) -> bool {
        self.mode != MarkupMode::Disabled
    }

    /// Toggle the feature. Disabling abandons an open block; enabling always
    /// starts outside a block.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.mode = if enabled {
            MarkupMode::RawText
        } else {
            MarkupMode::Disabled
        };
    }

    /// Return to the resting mode for the current feature toggle
    pub fn reset(&mut self) {
        if self.mode == MarkupMode::MarkupBlock {
            self.mode = MarkupMode::RawText;
        }
    }

    /// Route one inbound chunk
    pub fn route(&mut self, chunk: &str) -> Vec<Routed> {
        if self.mode == MarkupMode::Disabled {
            return vec![Routed::Format(chunk.to_string())];
        }

        let mut routed = Vec::new();
        let mut rest = chunk;
        let mut saw_marker = false;

        while let Some((pos, marker)) = find_marker(rest) {
            saw_marker = true;
            self.push_piece(&mut routed, &rest[..pos], true);
            self.apply(marker);
            routed.push(Routed::Note(marker));
            rest = &rest[pos + marker.len()..];
        }
        self.push_piece(&mut routed, rest, saw_marker);
        routed
    }

    fn apply(&mut self, marker: Marker) {
        tracing::debug!("Pueblo marker: {:?}", marker);
        match marker {
            Marker::Capability => {}
            Marker::BlockStart => self.mode = MarkupMode::MarkupBlock,
            Marker::BlockEnd => self.mode = MarkupMode::RawText,
        }
    }

    /// Route a piece under the current mode. Whitespace-only remnants next to
    /// a marker are dropped.
    fn push_piece(&self, routed: &mut Vec<Routed>, piece: &str, beside_marker: bool) {
        if beside_marker && piece.trim().is_empty() {
            return;
        }
        let piece = piece.to_string();
        routed.push(match self.mode {
            MarkupMode::MarkupBlock => Routed::Trusted(piece),
            MarkupMode::RawText | MarkupMode::Disabled => Routed::Format(piece),
        });
    }
}

/// Find the earliest known marker. Unknown `$#$#` words are left as text.
fn find_marker(text: &str) -> Option<(usize, Marker)> {
    let mut offset = 0;
    while let Some(found) = text[offset..].find(MARKER_PREFIX) {
        let pos = offset + found;
        let after = &text[pos + MARKER_PREFIX.len()..];
        if let Some(marker) = Marker::ALL
            .iter()
            .copied()
            .find(|m| after.starts_with(m.keyword()))
        {
            return Some((pos, marker));
        }
        offset = pos + MARKER_PREFIX.len();
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_passthrough() {
        let mut detector = MarkupDetector::new(true);

        assert_eq!(
            detector.route("$#$#html_start"),
            vec![Routed::Note(Marker::BlockStart)]
        );
        assert_eq!(detector.mode(), MarkupMode::MarkupBlock);
        assert_eq!(
            detector.route("<b>bold</b>"),
            vec![Routed::Trusted("<b>bold</b>".to_string())]
        );
        assert_eq!(
            detector.route("$#$#html_end"),
            vec![Routed::Note(Marker::BlockEnd)]
        );
        assert_eq!(detector.mode(), MarkupMode::RawText);
        assert_eq!(
            detector.route("<b>"),
            vec![Routed::Format("<b>".to_string())]
        );
    }

    #[test]
    fn test_capability_keeps_mode() {
        let mut detector = MarkupDetector::new(true);
        assert_eq!(
            detector.route("$#$#pueblo 2.50 md5=\"abc\""),
            vec![
                Routed::Note(Marker::Capability),
                Routed::Format(" 2.50 md5=\"abc\"".to_string()),
            ]
        );
        assert_eq!(detector.mode(), MarkupMode::RawText);
    }

    #[test]
    fn test_disabled_treats_markers_as_text() {
        let mut detector = MarkupDetector::new(false);
        assert_eq!(
            detector.route("$#$#html_start"),
            vec![Routed::Format("$#$#html_start".to_string())]
        );
        assert_eq!(detector.mode(), MarkupMode::Disabled);
    }

    #[test]
    fn test_disable_abandons_block() {
        let mut detector = MarkupDetector::new(true);
        detector.route("$#$#html_start");
        detector.set_enabled(false);
        assert_eq!(
            detector.route("<i>x</i>"),
            vec![Routed::Format("<i>x</i>".to_string())]
        );

        detector.set_enabled(true);
        assert_eq!(detector.mode(), MarkupMode::RawText);
        assert_eq!(
            detector.route("<i>x</i>"),
            vec![Routed::Format("<i>x</i>".to_string())]
        );
    }

    #[test]
    fn test_text_around_markers_follows_mode() {
        let mut detector = MarkupDetector::new(true);
        assert_eq!(
            detector.route("before $#$#html_start<hr>$#$#html_end after"),
            vec![
                Routed::Format("before ".to_string()),
                Routed::Note(Marker::BlockStart),
                Routed::Trusted("<hr>".to_string()),
                Routed::Note(Marker::BlockEnd),
                Routed::Format(" after".to_string()),
            ]
        );
    }

    #[test]
    fn test_unknown_marker_is_text() {
        let mut detector = MarkupDetector::new(true);
        assert_eq!(
            detector.route("$#$#xch_cmd foo"),
            vec![Routed::Format("$#$#xch_cmd foo".to_string())]
        );
    }

    #[test]
    fn test_reset_leaves_block() {
        let mut detector = MarkupDetector::new(true);
        detector.route("$#$#html_start");
        detector.reset();
        assert_eq!(detector.mode(), MarkupMode::RawText);

        let mut off = MarkupDetector::new(false);
        off.reset();
        assert_eq!(off.mode(), MarkupMode::Disabled);
    }
}
