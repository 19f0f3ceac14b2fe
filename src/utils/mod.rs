//! Generic utility primitives with zero domain knowledge.
//!
//! - `command` - Command execution with live output and capture
//! - `shell` - Shell escaping and quoting

pub mod command;
pub mod shell;
