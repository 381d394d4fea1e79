//! Running the pipeline over many devices on a fixed worker pool.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::thread;

use devmap_core::DeviceDescription;

use crate::config::DevmapConfig;
use crate::error::Result;
use crate::loader::load_device;
use crate::process::{process_device, DeviceOutput};

/// Outcome for one input, tagged with its name.
#[derive(Debug)]
pub struct BatchItem {
    /// Device name, or the file path when the file could not be read.
    pub name: String,
    pub result: Result<DeviceOutput>,
}

/// Totals over a finished batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub devices: usize,
    /// Devices that produced no output.
    pub failed: usize,
    /// Devices with at least one peripheral left without layouts.
    pub with_errors: usize,
    pub warnings: usize,
}

impl BatchSummary {
    pub fn of(items: &[BatchItem]) -> Self {
        let mut summary = BatchSummary {
            devices: items.len(),
            ..Default::default()
        };
        for item in items {
            match &item.result {
                Ok(out) => {
                    summary.warnings += out.warnings().count();
                    if out.has_errors() {
                        summary.with_errors += 1;
                    }
                }
                Err(_) => summary.failed += 1,
            }
        }
        summary
    }

    pub fn is_clean(&self) -> bool {
        self.failed == 0 && self.with_errors == 0
    }
}

/// Apply `work` to every input on `jobs` threads, returning results in input order.
fn run_pool<T, R, F>(inputs: &[T], jobs: usize, work: F) -> Vec<R>
where
    T: Sync,
    R: Send,
    F: Fn(&T) -> R + Sync,
{
    let jobs = jobs.clamp(1, inputs.len().max(1));
    let next = AtomicUsize::new(0);
    let (tx, rx) = mpsc::channel();

    thread::scope(|scope| {
        for _ in 0..jobs {
            let tx = tx.clone();
            let next = &next;
            let work = &work;
            scope.spawn(move || loop {
                let index = next.fetch_add(1, Ordering::Relaxed);
                let Some(input) = inputs.get(index) else {
                    break;
                };
                if tx.send((index, work(input))).is_err() {
                    break;
                }
            });
        }
    });
    drop(tx);

    let mut slots: Vec<Option<R>> = inputs.iter().map(|_| None).collect();
    for (index, result) in rx {
        slots[index] = Some(result);
    }
    slots.into_iter().flatten().collect()
}

/// Process already-loaded descriptions.
pub fn process_batch(devices: &[DeviceDescription], config: &DevmapConfig) -> Vec<BatchItem> {
    let jobs = config.batch.jobs();
    log::info!("processing {} device(s) on {jobs} worker(s)", devices.len());
    run_pool(devices, jobs, |device| {
        let result = process_device(device, config);
        if let Err(e) = &result {
            log::error!("{}: {e}", device.name);
        }
        BatchItem {
            name: device.name.trim().to_string(),
            result,
        }
    })
}

/// Load and process description files; unreadable files fail only themselves.
pub fn process_files(paths: &[PathBuf], config: &DevmapConfig) -> Vec<BatchItem> {
    let jobs = config.batch.jobs();
    log::info!("processing {} file(s) on {jobs} worker(s)", paths.len());
    run_pool(paths, jobs, |path| process_file(path, config))
}

fn process_file(path: &Path, config: &DevmapConfig) -> BatchItem {
    match load_device(path) {
        Ok(device) => {
            let result = process_device(&device, config);
            if let Err(e) = &result {
                log::error!("{}: {e}", device.name);
            }
            BatchItem {
                name: device.name,
                result,
            }
        }
        Err(e) => {
            log::error!("{}: {e}", path.display());
            BatchItem {
                name: path.display().to_string(),
                result: Err(e.into()),
            }
        }
    }
}
