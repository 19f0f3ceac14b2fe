// Public modules
pub mod build;
pub mod config;
pub mod deploy;
pub mod error;
pub mod git;
pub mod pipeline;
pub mod release;
pub mod ssh;

// Re-export common types for convenience
pub use error::{Error, ErrorCode, Result};
