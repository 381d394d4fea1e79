//! End-to-end processing of device descriptions.
//!
//! Loads descriptions, applies `devmap.toml`, runs memory-map resolution,
//! register layout and linker planning per device, and fans a set of devices
//! out over a worker pool.

pub mod batch;
pub mod config;
pub mod error;
pub mod loader;
pub mod process;
pub mod report;

pub use batch::{process_batch, process_files, BatchItem, BatchSummary};
pub use config::{BatchConfig, DeviceClass, DevmapConfig, CONFIG_FILE};
pub use error::{PipelineError, Result};
pub use loader::{discover_devices, load_device, parse_device, Format};
pub use process::{process_device, resolve_device, DeviceOutput};
