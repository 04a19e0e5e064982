//! Core client components.
//!
//! This module contains the protocol-independent client logic:
//!
//! - **format**: ANSI SGR formatter and Pueblo markup detector
//! - **events**: Inbound events and outbound intents at the session boundary
//! - **session**: Connection state machine with reconnect and announce timers
//! - **client**: Orchestrator combining session, formatter and history
//! - **transport**: Direct TCP transport that carries out intents
//!
//! # Architecture
//!
//! ```text
//! Client
//! ├── SessionMachine (connection state + ReconnectPolicy + timers)
//! ├── OutputPipeline
//! │   ├── MarkupDetector (Pueblo marker routing)
//! │   └── EscapeFormatter (SGR runs + carried StyleState)
//! └── HistoryNavigator (command history + draft)
//!
//! TcpTransport ── OutboundIntent ──▶ server
//!              ◀── InboundEvent ───
//! ```

pub mod client;
pub mod events;
pub mod format;
pub mod session;
pub mod transport;
