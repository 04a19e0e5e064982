//! User interface rendering and input handling.
//!
//! This module provides the crossterm front end:
//!
//! - **keymapper**: Keyboard and mouse input to [`InputAction`] mapping
//! - **input**: Single-line input editor
//! - **commands**: Local `/` commands
//! - **view**: Output buffer, line wrapping and status information
//! - **renderer**: Draws rows, the status bar and the input line

pub mod commands;
pub mod input;
pub mod keymapper;
pub mod renderer;
pub mod view;

pub use commands::{LocalCommand, Parsed};
pub use input::LineEditor;
pub use keymapper::*;
pub use renderer::Renderer;
pub use view::{OutputView, Row, StatusInfo, ToastSlot};
