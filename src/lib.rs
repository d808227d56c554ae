// src/lib.rs

//! Mines temporal dependency rules between dated changes.
//!
//! For every pair of changes, the sweep builds a histogram of how many days
//! after the antecedent the consequent recurred, keeping only pairs that meet
//! the support and confidence thresholds.

pub mod config;
pub mod dispatch;
pub mod emit;
pub mod error;
pub mod histogram;
pub mod model;
pub mod partition;
pub mod sweep;
pub mod synth;
pub mod timeline;

pub use config::{MiningConfig, SweepParams};
pub use dispatch::mine;
pub use emit::{read_rules, MemorySink, RuleSink, WriterSink};
pub use error::{MineError, Result};
pub use histogram::Histogram;
pub use model::*;
pub use sweep::SweepEngine;
pub use timeline::{ChangePool, SupportBounds, Timeline};

use std::io::Write;
use std::path::Path;

/// Reads a JSON object mapping change ids to their occurrence days.
pub fn load_changes(path: &Path) -> Result<ChangeMap> {
    let file = std::fs::File::open(path).map_err(|e| MineError::io(path, e))?;
    serde_json::from_reader(std::io::BufReader::new(file)).map_err(|e| MineError::json(path, e))
}

/// Reads a JSON array of days and checks that it is strictly ascending.
pub fn load_timeline(path: &Path) -> Result<Timeline> {
    let file = std::fs::File::open(path).map_err(|e| MineError::io(path, e))?;
    let days: Vec<Day> =
        serde_json::from_reader(std::io::BufReader::new(file)).map_err(|e| MineError::json(path, e))?;
    Timeline::new(days)
}

/// Writes the days found in a change directory as a JSON array.
pub fn write_timepoints(change_dir: &Path, output: &Path) -> Result<usize> {
    let days = timeline::days_from_change_dir(change_dir)?;
    write_json(output, &days)?;
    Ok(days.len())
}

pub(crate) fn write_json<T: serde::Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let file = std::fs::File::create(path).map_err(|e| MineError::io(path, e))?;
    let mut writer = std::io::BufWriter::new(file);
    serde_json::to_writer(&mut writer, value).map_err(|e| MineError::json(path, e))?;
    writer.flush().map_err(|e| MineError::io(path, e))
}
