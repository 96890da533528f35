//! Chessroom Client - local mirror of a shared session
//!
//! The server is authoritative; this crate only reconciles what it hears:
//! - `ClientMirror`: role, board, selection, history, captures, clock
//! - Advisory move targets for highlighting
//! - Board orientation and text rendering for either side

pub mod advisory;
pub mod mirror;
pub mod view;

pub use advisory::advisory_targets;
pub use mirror::{Captured, ClientMirror, Role};
pub use view::{history_lines, render_board, view_rows};
