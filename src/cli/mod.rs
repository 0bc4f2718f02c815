//! CLI command handlers
//!
//! Bridges the clap argument parsing with the history read surface.

pub mod history;

pub use history::{handle_history_command, HistoryCommands};
