// Public modules
pub mod config;
pub mod deploy;
pub mod error;
pub mod git;
pub mod guard;
pub mod interrupt;
pub mod status;
pub mod supervisor;
pub mod target;

// Re-export common types for convenience
pub use error::{Error, ErrorCode, Result};
