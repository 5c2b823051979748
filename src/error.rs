//! Structured error types for the seed server.

use std::fmt;
use std::io;

/// Main error type for server setup and operation
#[derive(Debug)]
pub enum SeedError {
    /// IO error (socket, file operations)
    Io(io::Error),
    /// Configuration error
    Config(String),
}

impl fmt::Display for SeedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SeedError::Io(e) => write!(f, "IO error: {}", e),
            SeedError::Config(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl std::error::Error for SeedError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SeedError::Io(e) => Some(e),
            SeedError::Config(_) => None,
        }
    }
}

impl From<io::Error> for SeedError {
    fn from(err: io::Error) -> Self {
        SeedError::Io(err)
    }
}

/// Convenience type alias for Results using SeedError
pub type Result<T> = std::result::Result<T, SeedError>;
