//! Reading device descriptions from `.json` and `.toml` files.

use std::path::{Path, PathBuf};

use devmap_core::{CoreError, DeviceDescription};

/// Record format of a description file, chosen by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Json,
    Toml,
}

impl Format {
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Some(Format::Json),
            Some(ext) if ext.eq_ignore_ascii_case("toml") => Some(Format::Toml),
            _ => None,
        }
    }
}

/// Parse a description from a string and normalize it.
pub fn parse_device(content: &str, format: Format) -> Result<DeviceDescription, CoreError> {
    let device: DeviceDescription = match format {
        Format::Json => serde_json::from_str(content)?,
        Format::Toml => toml::from_str(content)?,
    };
    Ok(device.normalized())
}

/// Load and normalize one description file.
pub fn load_device(path: &Path) -> Result<DeviceDescription, CoreError> {
    if !path.is_file() {
        return Err(CoreError::NotFound {
            path: path.to_path_buf(),
        });
    }
    let format = Format::from_path(path).ok_or_else(|| CoreError::UnsupportedFormat {
        path: path.to_path_buf(),
    })?;
    let content = std::fs::read_to_string(path)?;
    parse_device(&content, format)
}

/// Every description file directly inside `dir`, sorted by path.
pub fn discover_devices(dir: &Path) -> Result<Vec<PathBuf>, CoreError> {
    if !dir.is_dir() {
        return Err(CoreError::NotFound {
            path: dir.to_path_buf(),
        });
    }
    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && Format::from_path(&path).is_some() {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}
