//! Error types for the client.

use thiserror::Error;

/// Client-wide error type.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A coordinate had a non-finite component
    #[error("Malformed coordinate: ({x}, {y}, {z})")]
    MalformedCoordinate { x: f32, y: f32, z: f32 },

    /// Out of bounds access
    #[error("Out of bounds: {0}")]
    OutOfBounds(String),

    /// Block id that is not present in the registry
    #[error("Unknown block index: {0}")]
    UnknownBlock(u16),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Payload did not have the expected shape
    #[error("Deserialization error: {0}")]
    Deserialization(String),

    /// Invalid data error
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// The other end of a channel went away
    #[error("Channel disconnected: {0}")]
    Disconnected(&'static str),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
