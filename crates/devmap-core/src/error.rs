//! Error types for loading and normalizing device descriptions.

use std::path::PathBuf;

/// Errors that can occur while reading a device description.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// JSON deserialization error.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML deserialization error.
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// I/O error reading description files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Description file not found.
    #[error("device file not found: {}", path.display())]
    NotFound {
        /// The path that was not found.
        path: PathBuf,
    },

    /// The file extension does not name a supported record format.
    #[error("unsupported device file format: {}", path.display())]
    UnsupportedFormat {
        /// The offending path.
        path: PathBuf,
    },

    /// A referenced address space does not exist in the description.
    #[error("address space '{id}' not found in device {device}")]
    UnknownAddressSpace {
        /// Device name.
        device: String,
        /// The missing address space id.
        id: String,
    },
}

/// Result type for device description operations.
pub type Result<T> = std::result::Result<T, CoreError>;
