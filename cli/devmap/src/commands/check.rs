//! `devmap check`: run the whole pipeline over many device files.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use devmap_pipeline::report::DeviceSummary;
use devmap_pipeline::{discover_devices, process_files, BatchItem, BatchSummary, DevmapConfig};

use super::OutputFormat;

/// Expand directories into the description files they contain.
pub fn collect_inputs(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_dir() {
            let found = discover_devices(path).with_context(|| format!("scanning {}", path.display()))?;
            if found.is_empty() {
                log::warn!("no device files in {}", path.display());
            }
            files.extend(found);
        } else {
            files.push(path.clone());
        }
    }
    Ok(files)
}

pub fn run(paths: &[PathBuf], config: &DevmapConfig, format: OutputFormat) -> Result<()> {
    let files = collect_inputs(paths)?;
    if files.is_empty() {
        bail!("no device files given");
    }
    let items = process_files(&files, config);
    let summary = BatchSummary::of(&items);
    println!("{}", output(&items, &summary, format)?);
    if !summary.is_clean() {
        bail!("{summary}");
    }
    Ok(())
}

pub fn output(items: &[BatchItem], summary: &BatchSummary, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Text => {
            let mut text = String::new();
            for item in items {
                match &item.result {
                    Ok(out) => text.push_str(&DeviceSummary(out).to_string()),
                    Err(e) => text.push_str(&format!("{}: FAILED: {e}\n", item.name)),
                }
            }
            text.push_str(&summary.to_string());
            Ok(text)
        }
        OutputFormat::Json => {
            let entries: Vec<serde_json::Value> = items.iter().map(json_entry).collect();
            serde_json::to_string_pretty(&entries).context("serializing output")
        }
    }
}

fn json_entry(item: &BatchItem) -> serde_json::Value {
    match &item.result {
        Ok(out) => serde_json::json!({
            "device": item.name,
            "ok": !out.has_errors(),
            "diagnostics": out.diagnostics,
        }),
        Err(e) => serde_json::json!({
            "device": item.name,
            "ok": false,
            "error": e.to_string(),
        }),
    }
}
