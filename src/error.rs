//! Error types for the exception dump decoder

use thiserror::Error;

/// Main error type for decoding and reporting
#[derive(Error, Debug)]
pub enum DumpError {
    #[error("Invalid file format: {0}")]
    InvalidFormat(String),

    #[error(
        "Incompatible format version 0x{found:08x} (minimum 0x{minimum:08x}), \
         please use the appropriate parser (--layout legacy)"
    )]
    UnsupportedVersion { found: u32, minimum: u32 },

    #[error("Truncated dump: need {length} bytes at offset {offset}, have {available}")]
    OutOfBounds {
        offset: usize,
        length: usize,
        available: usize,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, DumpError>;
