//! Command Log Module
//!
//! Append-only record of cache mutations, replayed on startup to rebuild the
//! in-memory map.

mod command;
mod command_log;
mod writer;

pub use command::{Command, ParseError};
pub use command_log::CommandLog;
pub use writer::LogFile;
