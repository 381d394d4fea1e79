//! Error types for memory-map resolution.

/// Errors that make a device's memory map unusable.
#[derive(Debug, thiserror::Error)]
pub enum MemMapError {
    /// A mandatory memory category could not be identified.
    #[error("device {device}: no {category} region found")]
    MissingRegion {
        /// Device name.
        device: String,
        /// Category that was looked for ("ram", "flash").
        category: String,
    },

    /// Two address spaces share an id, so region lookups would be ambiguous.
    #[error("device {device}: duplicate address space '{id}'")]
    DuplicateSpace {
        /// Device name.
        device: String,
        /// The repeated id.
        id: String,
    },
}

/// Result type for memory-map operations.
pub type Result<T> = std::result::Result<T, MemMapError>;
