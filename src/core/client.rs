//! Client core
//!
//! Wires the formatting pipeline, command history and session machine
//! together behind one message-passing surface: front ends feed user intents
//! and inbound events in, and get an ordered list of [`UiUpdate`]s back.

use std::time::Instant;

use tracing::debug;

use super::events::{InboundEvent, OutboundIntent};
use super::format::{Formatted, Fragment, FragmentKind, OutputPipeline};
use super::session::{
    ConnectionState, Effect, Notice, NoticeLevel, SessionMachine, SessionSettings,
};
use crate::history::{Direction, HistoryNavigator, HISTORY_LIMIT};

/// Kind of terminal line, mapped to a CSS class by HTML sinks
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LineClass {
    /// Text received from the server
    Server,
    /// Trusted markup block content
    Markup,
    /// Local informational message
    System,
    /// Local error message
    Error,
    /// Echo of a submitted command
    UserCommand,
}

impl LineClass {
    pub fn css_class(self) -> &'static str {
        match self {
            LineClass::Server => "server-message",
            LineClass::Markup => "pueblo-html server-message",
            LineClass::System => "system-message",
            LineClass::Error => "error-message",
            LineClass::UserCommand => "user-command",
        }
    }
}

/// One line appended to the terminal output
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutputLine {
    pub class: LineClass,
    pub fragment: Fragment,
}

impl OutputLine {
    /// HTML for the whole line, e.g. `<div class="server-message">..</div>`
    pub fn to_html(&self) -> String {
        format!(
            "<div class=\"{}\">{}</div>",
            self.class.css_class(),
            self.fragment.to_html()
        )
    }
}

/// Instructions for the front end and the transport
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UiUpdate {
    Line(OutputLine),
    Toast(Notice),
    Status(ConnectionState),
    InputEnabled(bool),
    /// Replace the content of the input line
    SetInput(String),
    /// Clear the terminal output
    Cleared,
    /// Deliver to the transport
    Send(OutboundIntent),
}

/// Construction options
#[derive(Clone, Debug)]
pub struct ClientOptions {
    pub session: SessionSettings,
    pub ansi_colors: bool,
    pub history_limit: usize,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            session: SessionSettings::default(),
            ansi_colors: true,
            history_limit: HISTORY_LIMIT,
        }
    }
}

/// The client core
#[derive(Debug)]
pub struct Client {
    session: SessionMachine,
    pipeline: OutputPipeline,
    history: HistoryNavigator,
}

impl Default for Client {
    fn default() -> Self {
        Self::new(ClientOptions::default())
    }
}

impl Client {
    pub fn new(options: ClientOptions) -> Self {
        let markup = options.session.markup;
        Self {
            session: SessionMachine::new(options.session),
            pipeline: OutputPipeline::new(markup, options.ansi_colors),
            history: HistoryNavigator::new(options.history_limit),
        }
    }

    pub fn session(&self) -> &SessionMachine {
        &self.session
    }

    pub fn pipeline(&self) -> &OutputPipeline {
        &self.pipeline
    }

    pub fn history(&self) -> &HistoryNavigator {
        &self.history
    }

    /// Greeting shown before any connection
    pub fn welcome(&self) -> Vec<UiUpdate> {
        vec![
            self.local_line(LineClass::System, "Welcome to mushterm"),
            self.local_line(LineClass::System, "Connect to a MUSH server to begin."),
            UiUpdate::Status(self.session.state()),
            UiUpdate::InputEnabled(self.session.can_submit()),
        ]
    }

    // ── Inbound ────────────────────────────────────────────────────────

    pub fn handle_event(&mut self, event: InboundEvent, now: Instant) -> Vec<UiUpdate> {
        match event {
            InboundEvent::ServerMessage { text } => self.server_message(&text),
            InboundEvent::CommandHistory { history } => {
                debug!("Received {} history entries", history.len());
                self.history.replace(history);
                Vec::new()
            }
            lifecycle => {
                let effects = self.session.handle(&lifecycle, now);
                self.apply(effects)
            }
        }
    }

    fn server_message(&mut self, text: &str) -> Vec<UiUpdate> {
        self.pipeline
            .process(text)
            .into_iter()
            .map(|formatted| match formatted {
                Formatted::Fragment(fragment) => {
                    let class = match fragment.kind() {
                        FragmentKind::Styled => LineClass::Server,
                        FragmentKind::Trusted => LineClass::Markup,
                    };
                    UiUpdate::Line(OutputLine { class, fragment })
                }
                Formatted::Note(marker) => self.local_line(LineClass::System, marker.note()),
            })
            .collect()
    }

    // ── User intents ───────────────────────────────────────────────────

    pub fn connect(&mut self, host: &str, port: &str) -> Vec<UiUpdate> {
        match self.session.connect(host, port) {
            Ok(effects) => self.apply(effects),
            Err(e) => vec![UiUpdate::Toast(Notice::new(NoticeLevel::Error, e.to_string()))],
        }
    }

    /// Close the connection and stop any reconnect episode
    pub fn disconnect(&mut self) -> Vec<UiUpdate> {
        let effects = self.session.disconnect();
        if effects.is_empty() {
            return vec![UiUpdate::Toast(Notice::new(NoticeLevel::Warning, "Not connected"))];
        }
        self.apply(effects)
    }

    /// Submit the input line. On success the command is appended to history
    /// and the input is cleared.
    pub fn submit(&mut self, input: &str) -> Vec<UiUpdate> {
        match self.session.submit(input) {
            Ok(effects) => {
                self.history.append(input);
                let mut updates = self.apply(effects);
                updates.push(UiUpdate::SetInput(String::new()));
                updates
            }
            Err(e) => {
                debug!("Submit rejected: {}", e);
                vec![UiUpdate::Toast(Notice::new(NoticeLevel::Error, e.to_string()))]
            }
        }
    }

    /// Move through history; `input` is the current input line
    pub fn navigate(&mut self, direction: Direction, input: &str) -> Vec<UiUpdate> {
        self.history
            .navigate(direction, input)
            .map(UiUpdate::SetInput)
            .into_iter()
            .collect()
    }

    pub fn set_markup(&mut self, enabled: bool) -> Vec<UiUpdate> {
        self.pipeline.set_markup_enabled(enabled);
        let effects = self.session.set_markup(enabled);
        self.apply(effects)
    }

    pub fn set_auto_reconnect(&mut self, enabled: bool) -> Vec<UiUpdate> {
        let effects = self.session.set_auto_reconnect(enabled);
        self.apply(effects)
    }

    pub fn set_auto_log(&mut self, enabled: bool, log_filename: Option<String>) -> Vec<UiUpdate> {
        let effects = self.session.set_auto_log(enabled, log_filename);
        self.apply(effects)
    }

    /// Affects new text only
    pub fn set_colors(&mut self, colors: bool) {
        self.pipeline.set_colors(colors);
    }

    pub fn clear(&self) -> Vec<UiUpdate> {
        vec![
            UiUpdate::Cleared,
            self.local_line(LineClass::System, "Terminal cleared"),
        ]
    }

    // ── Timers ─────────────────────────────────────────────────────────

    pub fn poll(&mut self, now: Instant) -> Vec<UiUpdate> {
        let effects = self.session.poll(now);
        self.apply(effects)
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.session.next_deadline()
    }

    pub fn shutdown(&mut self) {
        self.session.shutdown();
    }

    // ── Helpers ────────────────────────────────────────────────────────

    /// A locally generated line, formatted like server text
    pub fn local_line(&self, class: LineClass, text: &str) -> UiUpdate {
        UiUpdate::Line(OutputLine {
            class,
            fragment: self.pipeline.format_local(text),
        })
    }

    fn apply(&mut self, effects: Vec<Effect>) -> Vec<UiUpdate> {
        let mut updates = Vec::with_capacity(effects.len());
        for effect in effects {
            let update = match effect {
                Effect::Send(intent) => UiUpdate::Send(intent),
                Effect::Toast(notice) => UiUpdate::Toast(notice),
                Effect::SystemLine(notice) => {
                    let class = match notice.level {
                        NoticeLevel::Error => LineClass::Error,
                        _ => LineClass::System,
                    };
                    self.local_line(class, &notice.text)
                }
                Effect::Echo(command) => {
                    self.local_line(LineClass::UserCommand, &format!("> {}", command))
                }
                Effect::StateChanged(state) => {
                    if state == ConnectionState::Disconnected {
                        self.pipeline.reset();
                    }
                    UiUpdate::Status(state)
                }
                Effect::InputEnabled(enabled) => UiUpdate::InputEnabled(enabled),
                Effect::ReconnectExhausted { attempts } => UiUpdate::Toast(Notice::new(
                    NoticeLevel::Error,
                    format!("Failed to reconnect after {} attempts", attempts),
                )),
            };
            updates.push(update);
        }
        updates
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::format::CAPABILITY_ANNOUNCEMENT;
    use std::time::Duration;

    fn online(client: &mut Client, now: Instant) {
        client.connect("mush.example.org", "4201");
        client.handle_event(
            InboundEvent::ServerConnected {
                host: "mush.example.org".to_string(),
                port: 4201,
            },
            now,
        );
    }

    fn message(text: &str) -> InboundEvent {
        InboundEvent::ServerMessage {
            text: text.to_string(),
        }
    }

    fn lines(updates: &[UiUpdate]) -> Vec<(LineClass, String)> {
        updates
            .iter()
            .filter_map(|u| match u {
                UiUpdate::Line(line) => Some((line.class, line.fragment.to_html())),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_server_message_is_formatted() {
        let now = Instant::now();
        let mut client = Client::default();
        let updates = client.handle_event(message("Hi \x1b[31mred\x1b[0m <end>"), now);
        assert_eq!(
            lines(&updates),
            vec![(
                LineClass::Server,
                "Hi <span class=\"ansi-red\">red</span> &lt;end&gt;".to_string()
            )]
        );
    }

    #[test]
    fn test_markup_block_lines() {
        let now = Instant::now();
        let mut client = Client::new(ClientOptions {
            session: SessionSettings {
                markup: true,
                ..SessionSettings::default()
            },
            ..ClientOptions::default()
        });

        let mut updates = Vec::new();
        for text in ["$#$#html_start", "<b>bold</b>", "$#$#html_end"] {
            updates.extend(client.handle_event(message(text), now));
        }
        assert_eq!(
            lines(&updates),
            vec![
                (LineClass::System, "Entering Pueblo HTML mode".to_string()),
                (LineClass::Markup, "<b>bold</b>".to_string()),
                (LineClass::System, "Exiting Pueblo HTML mode".to_string()),
            ]
        );
    }

    #[test]
    fn test_submit_appends_history_and_clears_input() {
        let now = Instant::now();
        let mut client = Client::default();
        online(&mut client, now);

        client.submit("look");
        client.navigate(Direction::Older, "half typed");
        let updates = client.submit("inventory");

        assert!(updates.contains(&UiUpdate::Send(OutboundIntent::SendCommand {
            command: "inventory".to_string()
        })));
        assert_eq!(updates.last(), Some(&UiUpdate::SetInput(String::new())));
        assert_eq!(lines(&updates), vec![(LineClass::UserCommand, "&gt; inventory".to_string())]);
        assert_eq!(client.history().history().entries(), ["look", "inventory"]);
        assert_eq!(client.history().cursor(), None);
    }

    #[test]
    fn test_submit_offline_is_rejected() {
        let mut client = Client::default();
        let updates = client.submit("look");
        assert_eq!(
            updates,
            vec![UiUpdate::Toast(Notice::new(
                NoticeLevel::Error,
                "Not connected to any server"
            ))]
        );
        assert!(client.history().history().is_empty());
    }

    #[test]
    fn test_navigate_updates_input() {
        let now = Instant::now();
        let mut client = Client::default();
        client.handle_event(
            InboundEvent::CommandHistory {
                history: vec!["look".to_string(), "inventory".to_string()],
            },
            now,
        );
        assert_eq!(
            client.navigate(Direction::Older, "draft"),
            vec![UiUpdate::SetInput("inventory".to_string())]
        );
        assert_eq!(
            client.navigate(Direction::Newer, "inventory"),
            vec![UiUpdate::SetInput("draft".to_string())]
        );
        assert!(client.navigate(Direction::Newer, "draft").is_empty());
    }

    #[test]
    fn test_connect_validation_is_a_toast() {
        let mut client = Client::default();
        assert_eq!(
            client.connect("", ""),
            vec![UiUpdate::Toast(Notice::new(
                NoticeLevel::Error,
                "Please enter both host and port"
            ))]
        );
    }

    #[test]
    fn test_disconnect_resets_stream_state() {
        let now = Instant::now();
        let mut client = Client::new(ClientOptions {
            session: SessionSettings {
                markup: true,
                ..SessionSettings::default()
            },
            ..ClientOptions::default()
        });
        online(&mut client, now);
        client.handle_event(message("\x1b[32mgreen"), now);
        client.handle_event(message("$#$#html_start"), now);

        let updates = client.handle_event(InboundEvent::ServerDisconnected { message: None }, now);
        assert!(updates.contains(&UiUpdate::Status(ConnectionState::Disconnected)));
        assert!(client.pipeline().style().is_empty());

        let updates = client.handle_event(message("<b>x</b>"), now);
        assert_eq!(
            lines(&updates),
            vec![(LineClass::Server, "&lt;b&gt;x&lt;/b&gt;".to_string())]
        );
    }

    #[test]
    fn test_disconnect_stops_reconnect_episode() {
        let now = Instant::now();
        let mut client = Client::default();
        online(&mut client, now);
        client.handle_event(
            InboundEvent::ConnectionLost {
                host: Some("mush.example.org".to_string()),
                port: Some(4201),
            },
            now,
        );
        assert!(client.session().reconnect_running());

        let updates = client.disconnect();
        assert!(!updates.iter().any(|u| matches!(u, UiUpdate::Send(_))));
        assert_eq!(
            lines(&updates),
            vec![(LineClass::System, "Auto-reconnect cancelled".to_string())]
        );
        assert!(!client.session().reconnect_running());
        assert_eq!(client.session().policy().attempts_made(), 0);
        assert!(client.poll(now + Duration::from_secs(30)).is_empty());

        assert_eq!(
            client.disconnect(),
            vec![UiUpdate::Toast(Notice::new(NoticeLevel::Warning, "Not connected"))]
        );
    }

    #[test]
    fn test_announcement_after_connect() {
        let now = Instant::now();
        let mut client = Client::new(ClientOptions {
            session: SessionSettings {
                markup: true,
                ..SessionSettings::default()
            },
            ..ClientOptions::default()
        });
        online(&mut client, now);

        let deadline = client.next_deadline().unwrap();
        let updates = client.poll(deadline);
        assert!(updates.contains(&UiUpdate::Send(OutboundIntent::SendCommand {
            command: CAPABILITY_ANNOUNCEMENT.to_string()
        })));
        assert!(lines(&updates)
            .contains(&(LineClass::System, "Sent Pueblo identification".to_string())));
    }

    #[test]
    fn test_line_html() {
        let line = OutputLine {
            class: LineClass::Error,
            fragment: Fragment::text("Error: x"),
        };
        assert_eq!(line.to_html(), "<div class=\"error-message\">Error: x</div>");
    }
}
