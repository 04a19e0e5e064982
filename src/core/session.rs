//! Session lifecycle
//!
//! `SessionMachine` owns the connection state, the auto-reconnect policy and
//! the session-level preferences. It never talks to the network: inputs are
//! user intents and inbound events, outputs are [`Effect`]s for the front end
//! and the transport.
//!
//! Timers are plain deadlines. A scheduler calls [`SessionMachine::poll`]
//! with the current time (see [`SessionMachine::next_deadline`]); nothing in
//! here sleeps or reads the clock.

use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, info, warn};

use super::events::{InboundEvent, OutboundIntent, Target};
use super::format::CAPABILITY_ANNOUNCEMENT;

/// Delay between a successful connect and the capability announcement
pub const ANNOUNCE_DELAY: Duration = Duration::from_millis(1000);
/// Default delay between reconnect attempts
pub const RECONNECT_DELAY: Duration = Duration::from_secs(5);
/// Default reconnect attempts per lost connection
pub const MAX_RECONNECT_ATTEMPTS: u32 = 5;

/// Errors for user intents rejected before anything is sent
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("Please enter both host and port")]
    MissingTarget,

    #[error("Invalid port number: {0}")]
    InvalidPort(String),

    #[error("Already connected")]
    AlreadyConnected,

    #[error("Connection attempt already in progress")]
    ConnectInProgress,

    #[error("Not connected to any server")]
    NotConnected,

    #[error("Command is empty")]
    EmptyCommand,
}

/// Connection status
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

impl ConnectionState {
    pub fn label(self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "Disconnected",
            ConnectionState::Connecting => "Connecting...",
            ConnectionState::Connected => "Connected",
        }
    }
}

/// Severity of a user-visible notice
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// A user-visible message
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub text: String,
}

impl Notice {
    pub fn new(level: NoticeLevel, text: impl Into<String>) -> Self {
        Self {
            level,
            text: text.into(),
        }
    }
}

/// Output of a session transition
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Effect {
    /// Deliver to the transport
    Send(OutboundIntent),
    /// Transient notification
    Toast(Notice),
    /// Line appended to the terminal output
    SystemLine(Notice),
    /// Echo of a command sent on the user's behalf
    Echo(String),
    StateChanged(ConnectionState),
    /// Command input became enabled or disabled
    InputEnabled(bool),
    /// Auto-reconnect gave up
    ReconnectExhausted { attempts: u32 },
}

/// Auto-reconnect bookkeeping
#[derive(Clone, Debug)]
pub struct ReconnectPolicy {
    pub enabled: bool,
    pub max_attempts: u32,
    pub delay: Duration,
    attempts_made: u32,
    last_target: Option<Target>,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            max_attempts: MAX_RECONNECT_ATTEMPTS,
            delay: RECONNECT_DELAY,
            attempts_made: 0,
            last_target: None,
        }
    }
}

impl ReconnectPolicy {
    pub fn attempts_made(&self) -> u32 {
        self.attempts_made
    }

    pub fn last_target(&self) -> Option<&Target> {
        self.last_target.as_ref()
    }
}

/// Session-level preferences
#[derive(Clone, Debug)]
pub struct SessionSettings {
    pub markup: bool,
    pub auto_reconnect: bool,
    pub max_attempts: u32,
    pub reconnect_delay: Duration,
    pub announce_delay: Duration,
    pub auto_log: bool,
    pub log_filename: Option<String>,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            markup: false,
            auto_reconnect: true,
            max_attempts: MAX_RECONNECT_ATTEMPTS,
            reconnect_delay: RECONNECT_DELAY,
            announce_delay: ANNOUNCE_DELAY,
            auto_log: false,
            log_filename: None,
        }
    }
}

/// Connection lifecycle state machine
#[derive(Debug)]
pub struct SessionMachine {
    state: ConnectionState,
    policy: ReconnectPolicy,
    markup: bool,
    auto_log: bool,
    log_filename: Option<String>,
    announce_delay: Duration,
    /// Next reconnect tick; `Some` while the reconnect timer runs
    reconnect_due: Option<Instant>,
    /// Pending one-shot capability announcement
    announce_due: Option<Instant>,
}

impl Default for SessionMachine {
    fn default() -> Self {
        Self::new(SessionSettings::default())
    }
}

impl SessionMachine {
    pub fn new(settings: SessionSettings) -> Self {
        Self {
            state: ConnectionState::Disconnected,
            policy: ReconnectPolicy {
                enabled: settings.auto_reconnect,
                max_attempts: settings.max_attempts.max(1),
                delay: settings.reconnect_delay,
                ..ReconnectPolicy::default()
            },
            markup: settings.markup,
            auto_log: settings.auto_log,
            log_filename: settings.log_filename,
            announce_delay: settings.announce_delay,
            reconnect_due: None,
            announce_due: None,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn policy(&self) -> &ReconnectPolicy {
        &self.policy
    }

    /// Commands may be submitted only while connected
    pub fn can_submit(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    pub fn markup_enabled(&self) -> bool {
        self.markup
    }

    pub fn reconnect_running(&self) -> bool {
        self.reconnect_due.is_some()
    }

    pub fn announce_pending(&self) -> bool {
        self.announce_due.is_some()
    }

    /// Earliest pending timer deadline
    pub fn next_deadline(&self) -> Option<Instant> {
        match (self.reconnect_due, self.announce_due) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    // ── User intents ───────────────────────────────────────────────────

    /// Manual connect. Cancels any running reconnect first.
    pub fn connect(&mut self, host: &str, port: &str) -> Result<Vec<Effect>, SessionError> {
        let host = host.trim();
        let port = port.trim();
        if host.is_empty() || port.is_empty() {
            return Err(SessionError::MissingTarget);
        }
        let port: u16 = match port.parse() {
            Ok(p) if p != 0 => p,
            _ => return Err(SessionError::InvalidPort(port.to_string())),
        };

        match self.state {
            ConnectionState::Connected => return Err(SessionError::AlreadyConnected),
            ConnectionState::Connecting => return Err(SessionError::ConnectInProgress),
            ConnectionState::Disconnected => {}
        }

        self.cancel_reconnect();
        let target = Target::new(host, port);
        info!("Connecting to {}", target);
        self.policy.last_target = Some(target.clone());

        let mut effects = self.transition(ConnectionState::Connecting);
        effects.push(Effect::Send(self.connect_intent(&target)));
        Ok(effects)
    }

    /// Manual disconnect. Always stops auto-reconnect.
    pub fn disconnect(&mut self) -> Vec<Effect> {
        let was_reconnecting = self.reconnect_running();
        self.cancel_reconnect();
        if self.state == ConnectionState::Disconnected {
            if was_reconnecting {
                info!("Auto-reconnect cancelled by disconnect");
                return vec![system(NoticeLevel::Info, "Auto-reconnect cancelled")];
            }
            return Vec::new();
        }
        info!("Disconnect requested");
        vec![Effect::Send(OutboundIntent::DisconnectFromServer {})]
    }

    /// Send a command to the server
    pub fn submit(&mut self, command: &str) -> Result<Vec<Effect>, SessionError> {
        if !self.can_submit() {
            return Err(SessionError::NotConnected);
        }
        let command = command.trim();
        if command.is_empty() {
            return Err(SessionError::EmptyCommand);
        }
        Ok(self.send_command(command))
    }

    pub fn set_auto_reconnect(&mut self, enabled: bool) -> Vec<Effect> {
        self.policy.enabled = enabled;
        if enabled {
            vec![system(NoticeLevel::Info, "Auto-reconnect enabled")]
        } else {
            self.cancel_reconnect();
            vec![system(NoticeLevel::Info, "Auto-reconnect disabled")]
        }
    }

    /// Toggle markup support. Enabling while connected announces at once.
    pub fn set_markup(&mut self, enabled: bool) -> Vec<Effect> {
        self.markup = enabled;
        if !enabled {
            return vec![system(NoticeLevel::Info, "Pueblo support disabled")];
        }

        let mut effects = Vec::new();
        if self.state == ConnectionState::Connected {
            effects.extend(self.send_command(CAPABILITY_ANNOUNCEMENT));
        }
        effects.push(system(NoticeLevel::Info, "Pueblo support enabled"));
        effects
    }

    pub fn set_auto_log(&mut self, enabled: bool, log_filename: Option<String>) -> Vec<Effect> {
        self.auto_log = enabled;
        self.log_filename = log_filename.filter(|name| !name.trim().is_empty());
        let text = if enabled {
            "Auto-log at connect enabled"
        } else {
            "Auto-log at connect disabled"
        };
        vec![system(NoticeLevel::Info, text)]
    }

    /// Session teardown: cancel every timer
    pub fn shutdown(&mut self) {
        self.cancel_reconnect();
        self.announce_due = None;
    }

    // ── Inbound events ─────────────────────────────────────────────────

    /// Apply a lifecycle event. Stream and history events produce nothing.
    pub fn handle(&mut self, event: &InboundEvent, now: Instant) -> Vec<Effect> {
        match event {
            InboundEvent::ServerConnected { host, port } => self.on_connected(host, *port, now),
            InboundEvent::ServerDisconnected { message } => {
                self.on_disconnected(message.as_deref())
            }
            InboundEvent::ConnectionError { error } => self.on_error(error),
            InboundEvent::ConnectionLost { host, port } => {
                self.on_lost(host.as_deref(), *port, now)
            }
            InboundEvent::ServerMessage { .. } | InboundEvent::CommandHistory { .. } => Vec::new(),
        }
    }

    fn on_connected(&mut self, host: &str, port: u16, now: Instant) -> Vec<Effect> {
        let text = format!("Connected to {}:{}", host, port);
        if self.state == ConnectionState::Connected {
            debug!("server_connected while already connected");
            return vec![toast(NoticeLevel::Success, text)];
        }

        info!("Connected to {}:{}", host, port);
        self.policy.last_target = Some(Target::new(host, port));

        let mut effects = self.transition(ConnectionState::Connected);
        effects.push(toast(NoticeLevel::Success, text.clone()));
        effects.push(system(NoticeLevel::Info, text));

        if self.markup {
            self.announce_due = Some(now + self.announce_delay);
        }
        effects
    }

    fn on_disconnected(&mut self, message: Option<&str>) -> Vec<Effect> {
        let text = message.unwrap_or("Disconnected from server").to_string();
        info!("Disconnected: {}", text);

        let mut effects = self.transition(ConnectionState::Disconnected);
        effects.push(toast(NoticeLevel::Warning, text.clone()));
        effects.push(system(NoticeLevel::Info, text));
        effects
    }

    fn on_error(&mut self, error: &str) -> Vec<Effect> {
        warn!("Connection error: {}", error);

        let mut effects = self.transition(ConnectionState::Disconnected);
        effects.push(toast(NoticeLevel::Error, error));
        effects.push(system(NoticeLevel::Error, format!("Error: {}", error)));
        effects
    }

    fn on_lost(&mut self, host: Option<&str>, port: Option<u16>, now: Instant) -> Vec<Effect> {
        warn!("Connection to server lost");
        if let (Some(host), Some(port)) = (host, port) {
            self.policy.last_target = Some(Target::new(host, port));
        }

        let mut effects = self.transition(ConnectionState::Disconnected);
        effects.push(toast(NoticeLevel::Error, "Connection to server lost"));
        effects.push(system(NoticeLevel::Error, "Connection to server lost"));

        if self.policy.enabled && self.reconnect_due.is_none() {
            self.start_reconnect(now);
        }
        effects
    }

    // ── Timers ─────────────────────────────────────────────────────────

    /// Fire every timer that is due at `now`
    pub fn poll(&mut self, now: Instant) -> Vec<Effect> {
        let mut effects = Vec::new();

        if self.announce_due.map_or(false, |due| now >= due) {
            self.announce_due = None;
            effects.extend(self.announce());
        }

        if self.reconnect_due.map_or(false, |due| now >= due) {
            self.reconnect_due = Some(now + self.policy.delay);
            effects.extend(self.reconnect_tick());
        }
        effects
    }

    /// One reconnect timer tick. No-op when the timer is not running.
    pub fn reconnect_tick(&mut self) -> Vec<Effect> {
        if self.reconnect_due.is_none() {
            return Vec::new();
        }

        let target = match (&self.state, &self.policy.last_target) {
            (ConnectionState::Disconnected, Some(target)) => target.clone(),
            _ => {
                debug!("Reconnect timer stopped (state={:?})", self.state);
                self.cancel_reconnect();
                return Vec::new();
            }
        };

        self.policy.attempts_made += 1;
        let attempts = self.policy.attempts_made;
        let max = self.policy.max_attempts;
        info!("Reconnect attempt {}/{} to {}", attempts, max, target);

        let mut effects = vec![
            system(
                NoticeLevel::Info,
                format!("Reconnect attempt {}/{}...", attempts, max),
            ),
            Effect::Send(self.connect_intent(&target)),
        ];

        if attempts >= max {
            warn!("Giving up after {} reconnect attempts", attempts);
            self.reconnect_due = None;
            effects.push(system(
                NoticeLevel::Error,
                format!("Failed to reconnect after {} attempts", max),
            ));
            effects.push(Effect::ReconnectExhausted { attempts });
        }
        effects
    }

    fn start_reconnect(&mut self, now: Instant) {
        self.cancel_reconnect();
        info!("Auto-reconnect every {:?}", self.policy.delay);
        self.reconnect_due = Some(now + self.policy.delay);
    }

    fn cancel_reconnect(&mut self) {
        self.reconnect_due = None;
        self.policy.attempts_made = 0;
    }

    fn announce(&mut self) -> Vec<Effect> {
        if self.state != ConnectionState::Connected {
            debug!("Skipping Pueblo announcement: not connected");
            return Vec::new();
        }
        let mut effects = self.send_command(CAPABILITY_ANNOUNCEMENT);
        effects.push(system(NoticeLevel::Info, "Sent Pueblo identification"));
        effects
    }

    // ── Helpers ────────────────────────────────────────────────────────

    fn send_command(&self, command: &str) -> Vec<Effect> {
        vec![
            Effect::Send(OutboundIntent::SendCommand {
                command: command.to_string(),
            }),
            Effect::Echo(command.to_string()),
        ]
    }

    fn connect_intent(&self, target: &Target) -> OutboundIntent {
        OutboundIntent::ConnectToServer {
            host: target.host.clone(),
            port: target.port,
            auto_log: self.auto_log,
            log_filename: self.log_filename.clone(),
        }
    }

    /// Change state, emitting the status and input-enable effects
    fn transition(&mut self, next: ConnectionState) -> Vec<Effect> {
        if self.state == next {
            return Vec::new();
        }
        debug!("Session {:?} -> {:?}", self.state, next);
        let was_connected = self.state == ConnectionState::Connected;
        self.state = next;

        let mut effects = vec![Effect::StateChanged(next)];
        match next {
            ConnectionState::Connected => effects.push(Effect::InputEnabled(true)),
            _ if was_connected => effects.push(Effect::InputEnabled(false)),
            _ => {}
        }
        effects
    }
}

fn toast(level: NoticeLevel, text: impl Into<String>) -> Effect {
    Effect::Toast(Notice::new(level, text))
}

fn system(level: NoticeLevel, text: impl Into<String>) -> Effect {
    Effect::SystemLine(Notice::new(level, text))
}
