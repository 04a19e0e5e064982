//! mushterm - a terminal client for MUSH/MUD servers
//!
//! Connects to a MUSH over TCP and renders ANSI-styled output, with optional
//! Pueblo markup support, auto-reconnect and command history.
//!
//! # Quick Start
//!
//! ```text
//! mushterm                          # Defaults from ~/.mushterm/config.toml
//! mushterm mush.pennmush.org 4201   # Connect right away
//! mushterm --pueblo localhost 4201  # With Pueblo HTML support
//! ```
//!
//! # Keys
//!
//! | Key | Action |
//! |-----|--------|
//! | Enter | Send the input line |
//! | Up/Down | Command history |
//! | PageUp/PageDown | Scroll output |
//! | F2/F3/F4 | Toggle Pueblo / auto-reconnect / colors |
//! | Ctrl+L | Clear output |
//! | Ctrl+C | Quit |

use std::env;
use std::time::{Duration, Instant};

use crossterm::event::{self, Event, KeyEventKind};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use mushterm::config::Config;
use mushterm::core::client::{Client, LineClass, UiUpdate};
use mushterm::core::session::{Notice, NoticeLevel};
use mushterm::core::transport::{connect_timeout_for, TcpTransport};
use mushterm::history::Direction;
use mushterm::ui::commands::{self, LocalCommand, Parsed};
use mushterm::ui::{InputAction, KeyMapper, LineEditor, OutputView, Renderer, StatusInfo, ToastSlot};

/// Version string from Cargo.toml
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Longest wait for input before checking the transport again
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Entries listed by `/history` without a query
const HISTORY_LISTING: usize = 20;

/// Command line overrides
#[derive(Debug, Default)]
struct Args {
    host: Option<String>,
    port: Option<String>,
    pueblo: Option<bool>,
    reconnect: Option<bool>,
    colors: Option<bool>,
}

fn print_version() {
    eprintln!("mushterm {}", VERSION);
}

fn print_help() {
    eprintln!("mushterm {} - A terminal client for MUSH/MUD servers", VERSION);
    eprintln!();
    eprintln!("Usage: mushterm [OPTIONS] [HOST] [PORT]");
    eprintln!();
    eprintln!("  HOST PORT             Connect on startup");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --pueblo              Enable Pueblo HTML support");
    eprintln!("  --no-pueblo           Disable Pueblo HTML support");
    eprintln!("  --no-reconnect        Disable auto-reconnect");
    eprintln!("  --no-color            Disable ANSI colors");
    eprintln!("  -v, --version         Show version");
    eprintln!("  -h, --help            Show this help");
    eprintln!();
    for line in commands::HELP {
        eprintln!("{}", line);
    }
    eprintln!();
    eprintln!("Configuration: ~/.mushterm/config.toml");
    eprintln!("Log file:      ~/.mushterm/mushterm.log (level from RUST_LOG)");
}

fn parse_args() -> Result<Args, String> {
    let args: Vec<String> = env::args().collect();
    let mut parsed = Args::default();
    let mut positional = Vec::new();

    for arg in args.iter().skip(1) {
        match arg.as_str() {
            "-h" | "--help" => {
                print_help();
                std::process::exit(0);
            }
            "-v" | "--version" => {
                print_version();
                std::process::exit(0);
            }
            "--pueblo" => parsed.pueblo = Some(true),
            "--no-pueblo" => parsed.pueblo = Some(false),
            "--no-reconnect" => parsed.reconnect = Some(false),
            "--no-color" | "--no-colors" => parsed.colors = Some(false),
            flag if flag.starts_with('-') => {
                return Err(format!("Unknown argument: {}. Use -h for help.", flag));
            }
            value => positional.push(value.to_string()),
        }
    }

    let mut positional = positional.into_iter();
    parsed.host = positional.next();
    parsed.port = positional.next();
    if let Some(extra) = positional.next() {
        return Err(format!("Unexpected argument: {}", extra));
    }
    Ok(parsed)
}

fn init_logging() {
    let log_path = Config::config_dir()
        .map(|dir| dir.join("mushterm.log"))
        .unwrap_or_else(|| std::path::PathBuf::from("mushterm.log"));

    // Open log file (append mode)
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .ok();

    if let Some(file) = log_file {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(filter)
            .with_writer(std::sync::Mutex::new(file))
            .with_ansi(false)
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    }
}

fn main() -> anyhow::Result<()> {
    let args = match parse_args() {
        Ok(a) => a,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!("Use --help for usage information");
            std::process::exit(1);
        }
    };

    init_logging();
    info!("mushterm {} starting...", VERSION);

    // Command line overrides the config file
    let mut config = Config::load();
    if let Some(pueblo) = args.pueblo {
        config.pueblo.enabled = pueblo;
    }
    if let Some(reconnect) = args.reconnect {
        config.reconnect.enabled = reconnect;
    }
    if let Some(colors) = args.colors {
        config.display.ansi_colors = colors;
    }

    let mut app = App::new(config);
    app.renderer.init()?;

    let now = Instant::now();
    let welcome = app.client.welcome();
    app.apply(welcome, now);
    app.show_help_hint();

    if let Some(host) = args.host {
        let port = args
            .port
            .unwrap_or_else(|| app.config.server.port.to_string());
        let updates = app.client.connect(&host, &port);
        app.apply(updates, now);
    }

    let result = app.run();
    app.client.shutdown();
    app.renderer.cleanup()?;

    if let Err(e) = &result {
        error!("Exited with error: {}", e);
    }
    info!("mushterm exiting");
    result
}

/// Front end state
struct App {
    config: Config,
    client: Client,
    transport: TcpTransport,
    renderer: Renderer,
    view: OutputView,
    editor: LineEditor,
    toast: ToastSlot,
    input_enabled: bool,
    colors: bool,
    quit: bool,
}

impl App {
    fn new(config: Config) -> Self {
        let client = Client::new(config.client_options());
        let renderer = Renderer::new(config.theme.clone(), config.display.status_bar);
        let colors = config.display.ansi_colors;
        let connect_timeout =
            connect_timeout_for(Duration::from_millis(config.reconnect.delay_ms));
        Self {
            config,
            client,
            transport: TcpTransport::with_connect_timeout(connect_timeout),
            renderer,
            view: OutputView::default(),
            editor: LineEditor::new(),
            toast: ToastSlot::default(),
            input_enabled: false,
            colors,
            quit: false,
        }
    }

    fn run(&mut self) -> anyhow::Result<()> {
        let mut dirty = true;

        while !self.quit {
            let now = Instant::now();

            // Drain transport events
            while let Some(event) = self.transport.try_recv() {
                let updates = self.client.handle_event(event, now);
                self.apply(updates, now);
                dirty = true;
            }

            // Timers
            if self.client.next_deadline().is_some_and(|due| due <= now) {
                let updates = self.client.poll(now);
                self.apply(updates, now);
                dirty = true;
            }
            if self.toast.deadline().is_some_and(|due| due <= now) {
                dirty = true;
            }

            if dirty {
                self.draw(now)?;
                dirty = false;
            }

            if event::poll(self.poll_timeout(now))? {
                match event::read()? {
                    Event::Key(key_event) => {
                        // Only process key press events
                        if key_event.kind == KeyEventKind::Release {
                            continue;
                        }
                        if let Some(action) = KeyMapper::map(&key_event) {
                            self.handle_action(action, Instant::now());
                        }
                    }
                    Event::Mouse(mouse_event) => {
                        if let Some(action) = KeyMapper::map_mouse(&mouse_event) {
                            self.handle_action(action, Instant::now());
                        }
                    }
                    Event::Paste(text) => {
                        for ch in text.chars().filter(|c| !c.is_control()) {
                            self.editor.apply(InputAction::Insert(ch));
                        }
                    }
                    _ => {}
                }
                dirty = true;
            }
        }
        Ok(())
    }

    fn poll_timeout(&self, now: Instant) -> Duration {
        [self.client.next_deadline(), self.toast.deadline()]
            .into_iter()
            .flatten()
            .map(|due| due.saturating_duration_since(now))
            .fold(POLL_INTERVAL, Duration::min)
    }

    fn draw(&mut self, now: Instant) -> anyhow::Result<()> {
        let size = crossterm::terminal::size()?;
        let height = self.renderer.output_height(size.1) as usize;
        let rows = self.view.visible_rows(size.0 as usize, height);
        let status = self.status(now);
        self.renderer
            .render(size, &rows, &status, &self.editor, self.input_enabled)?;
        Ok(())
    }

    fn status(&mut self, now: Instant) -> StatusInfo {
        let session = self.client.session();
        let policy = session.policy();
        StatusInfo {
            state: session.state(),
            target: policy.last_target().map(ToString::to_string),
            markup: session.markup_enabled(),
            auto_reconnect: policy.enabled,
            reconnect_attempt: session
                .reconnect_running()
                .then(|| (policy.attempts_made(), policy.max_attempts)),
            scrolled: self.view.scroll() > 0,
            toast: self.toast.current(now).cloned(),
        }
    }

    /// Apply client updates to the screen and the transport
    fn apply(&mut self, updates: Vec<UiUpdate>, now: Instant) {
        for update in updates {
            match update {
                UiUpdate::Line(line) => self.view.push(line),
                UiUpdate::Toast(notice) => self.toast.show(notice, now),
                UiUpdate::Status(state) => {
                    info!("Connection state: {}", state.label());
                }
                UiUpdate::InputEnabled(enabled) => self.input_enabled = enabled,
                UiUpdate::SetInput(text) => self.editor.set_text(&text),
                UiUpdate::Cleared => self.view.clear(),
                UiUpdate::Send(intent) => self.transport.deliver(&intent),
            }
        }
    }

    fn handle_action(&mut self, action: InputAction, now: Instant) {
        if self.editor.apply(action) {
            return;
        }

        match action {
            InputAction::Submit => self.submit(now),
            InputAction::HistoryOlder => {
                let updates = self.client.navigate(Direction::Older, &self.editor.text());
                self.apply(updates, now);
            }
            InputAction::HistoryNewer => {
                let updates = self.client.navigate(Direction::Newer, &self.editor.text());
                self.apply(updates, now);
            }
            InputAction::ScrollUp(rows) => self.view.scroll_up(rows as usize),
            InputAction::ScrollDown(rows) => self.view.scroll_down(rows as usize),
            InputAction::ScrollToBottom => self.view.scroll_to_bottom(),
            InputAction::ClearOutput => self.run_local(LocalCommand::Clear, now),
            InputAction::TogglePueblo => self.run_local(LocalCommand::Pueblo(None), now),
            InputAction::ToggleReconnect => self.run_local(LocalCommand::Reconnect(None), now),
            InputAction::ToggleColors => self.run_local(LocalCommand::Colors(None), now),
            InputAction::Quit => self.quit = true,
            _ => {}
        }
    }

    fn submit(&mut self, now: Instant) {
        let input = self.editor.text();
        match commands::parse(&input) {
            Parsed::Command(command) => {
                let updates = self.client.submit(&command);
                self.apply(updates, now);
                self.view.scroll_to_bottom();
            }
            Parsed::Local(command) => {
                self.editor.clear();
                self.run_local(command, now);
            }
            Parsed::Unknown(text) => {
                let message = format!("Unknown command: {} (try /help)", text);
                self.toast
                    .show(Notice::new(NoticeLevel::Warning, message), now);
            }
        }
    }

    fn run_local(&mut self, command: LocalCommand, now: Instant) {
        let updates = match command {
            LocalCommand::Connect { host, port } => {
                let host = host.unwrap_or_else(|| self.config.server.host.clone());
                let port = port.unwrap_or_else(|| self.config.server.port.to_string());
                self.client.connect(&host, &port)
            }
            LocalCommand::Disconnect => self.client.disconnect(),
            LocalCommand::Pueblo(value) => {
                let enabled = value.unwrap_or(!self.client.session().markup_enabled());
                self.client.set_markup(enabled)
            }
            LocalCommand::Reconnect(value) => {
                let enabled = value.unwrap_or(!self.client.session().policy().enabled);
                self.client.set_auto_reconnect(enabled)
            }
            LocalCommand::Colors(value) => {
                self.colors = value.unwrap_or(!self.colors);
                self.client.set_colors(self.colors);
                let text = if self.colors {
                    "ANSI colors enabled"
                } else {
                    "ANSI colors disabled"
                };
                vec![self.client.local_line(LineClass::System, text)]
            }
            LocalCommand::Log { enabled, filename } => self.client.set_auto_log(enabled, filename),
            LocalCommand::History(query) => self.history_listing(query.as_deref()),
            LocalCommand::Clear => self.client.clear(),
            LocalCommand::Help => commands::HELP
                .iter()
                .map(|line| self.client.local_line(LineClass::System, line))
                .collect(),
            LocalCommand::Quit => {
                self.quit = true;
                Vec::new()
            }
        };
        self.apply(updates, now);
    }

    fn history_listing(&self, query: Option<&str>) -> Vec<UiUpdate> {
        let history = self.client.history().history();
        let entries = match query {
            Some(q) => history.search(q),
            None => history.recent(HISTORY_LISTING),
        };

        if entries.is_empty() {
            return vec![self.client.local_line(LineClass::System, "No matching history")];
        }
        entries
            .iter()
            .enumerate()
            .map(|(i, entry)| {
                self.client
                    .local_line(LineClass::System, &format!("{:>3}  {}", i + 1, entry))
            })
            .collect()
    }

    fn show_help_hint(&mut self) {
        let hint = format!(
            "Type /connect to reach {}:{}, or /help for commands.",
            self.config.server.host, self.config.server.port
        );
        let line = self.client.local_line(LineClass::System, &hint);
        self.apply(vec![line], Instant::now());
    }
}
