//! mushterm - a terminal client for MUSH/MUD servers
//!
//! The crate is split into a pure client core and a crossterm front end:
//!
//! - [`core`]: escape-sequence formatting, Pueblo markup routing, the
//!   connection state machine and the TCP transport
//! - [`history`]: command history with up/down navigation
//! - [`config`]: `~/.mushterm/config.toml` loading
//! - [`ui`]: keyboard mapping, the input line editor and the renderer
//!
//! The core never performs I/O on its own. Inbound events and user intents go
//! in, and [`core::client::UiUpdate`]s come out; the front end applies them.

pub mod config;
pub mod core;
pub mod history;
pub mod ui;
