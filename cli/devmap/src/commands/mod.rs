//! CLI command implementations.

pub mod check;
pub mod layout;
pub mod memmap;
pub mod plan;

use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::Serialize;

/// How command output is printed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Render `value` as pretty JSON, or as `text` for people.
pub fn render<T: Serialize>(value: &T, text: impl std::fmt::Display, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Text => Ok(text.to_string()),
        OutputFormat::Json => serde_json::to_string_pretty(value).context("serializing output"),
    }
}
