//! Error types for the device pipeline.

use std::path::PathBuf;

use devmap_core::CoreError;
use devmap_link::LinkError;
use devmap_memmap::MemMapError;

/// Conditions that leave a device (or the whole run) without output.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// The device description could not be read.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// The memory map could not be resolved.
    #[error(transparent)]
    MemMap(#[from] MemMapError),

    /// No usable linker plan.
    #[error(transparent)]
    Link(#[from] LinkError),

    /// `devmap.toml` is malformed.
    #[error("invalid config {}: {source}", path.display())]
    Config {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;
