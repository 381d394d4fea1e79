//! Error types for linker planning.

/// Errors that leave a device without a usable linker plan.
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    /// The memory map has no region for a mandatory category.
    #[error("device {device}: no {category} region to link into")]
    MissingRegion { device: String, category: String },

    /// Stack, heap and mode stacks do not fit in RAM.
    #[error("device {device}: reservations need 0x{required:X} bytes but {region} has 0x{available:X}")]
    LayoutOverflow {
        device: String,
        region: String,
        required: u64,
        available: u64,
    },

    /// Reservation alignment must be a nonzero power of two.
    #[error("reservation alignment {0} is not a power of two")]
    InvalidAlignment(u64),
}

/// Result type for linker planning.
pub type Result<T> = std::result::Result<T, LinkError>;
