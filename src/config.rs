// src/config.rs

use crate::error::{MineError, Result};
use crate::timeline::SupportBounds;
use std::path::PathBuf;

pub const DEFAULT_MIN_SUPPORT: f64 = 0.1;
pub const DEFAULT_MAX_SUPPORT: f64 = 0.5;
pub const DEFAULT_MIN_CONFIDENCE: f64 = 0.7;
pub const DEFAULT_NUM_BINS: usize = 11;
pub const DEFAULT_PARTITION_SIZE: usize = 1000;
pub const DEFAULT_THREADS: usize = 10;

/// Everything a mining run needs besides its input data.
#[derive(Debug, Clone)]
pub struct MiningConfig {
    /// Minimal support as a fraction of the timeline length
    pub min_support: f64,
    /// Maximal support as a fraction of the timeline length
    pub max_support: f64,
    pub min_confidence: f64,
    /// Histogram bin count, i.e. the largest lag considered plus one
    pub num_bins: usize,
    /// Largest number of changes per partition
    pub partition_size: usize,
    pub threads: usize,
    /// Shuffle the candidate list with this seed before partitioning
    pub shuffle_seed: Option<u64>,
    /// Parent directory of the scratch directory; the system temp dir when unset
    pub work_dir: Option<PathBuf>,
}

impl Default for MiningConfig {
    fn default() -> Self {
        Self {
            min_support: DEFAULT_MIN_SUPPORT,
            max_support: DEFAULT_MAX_SUPPORT,
            min_confidence: DEFAULT_MIN_CONFIDENCE,
            num_bins: DEFAULT_NUM_BINS,
            partition_size: DEFAULT_PARTITION_SIZE,
            threads: DEFAULT_THREADS,
            shuffle_seed: None,
            work_dir: None,
        }
    }
}

impl MiningConfig {
    /// Rejects settings no sweep could run with. Called before any input is touched.
    pub fn validate(&self) -> Result<()> {
        check_fraction("min_support", self.min_support)?;
        check_fraction("max_support", self.max_support)?;
        check_fraction("min_confidence", self.min_confidence)?;
        if self.min_support > self.max_support {
            return Err(MineError::Configuration(format!(
                "min_support ({}) exceeds max_support ({})",
                self.min_support, self.max_support
            )));
        }
        check_positive("num_bins", self.num_bins)?;
        check_positive("partition_size", self.partition_size)?;
        check_positive("threads", self.threads)?;
        Ok(())
    }

    /// Absolute thresholds for one sweep over a timeline whose support bounds are known.
    pub fn sweep_params(&self, bounds: &SupportBounds) -> SweepParams {
        SweepParams {
            num_bins: self.num_bins,
            min_support_count: bounds.min_count,
            min_confidence: self.min_confidence,
        }
    }
}

/// Thresholds used inside a single sweep, in absolute counts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SweepParams {
    pub num_bins: usize,
    pub min_support_count: usize,
    pub min_confidence: f64,
}

fn check_fraction(name: &str, value: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&value) {
        return Err(MineError::Configuration(format!(
            "{name} must be within [0, 1], got {value}"
        )));
    }
    Ok(())
}

fn check_positive(name: &str, value: usize) -> Result<()> {
    if value == 0 {
        return Err(MineError::Configuration(format!("{name} must be positive")));
    }
    Ok(())
}
