// src/cli.rs

use change_histograms::config::{
    MiningConfig, DEFAULT_MAX_SUPPORT, DEFAULT_MIN_CONFIDENCE, DEFAULT_MIN_SUPPORT, DEFAULT_NUM_BINS,
    DEFAULT_PARTITION_SIZE, DEFAULT_THREADS,
};
use change_histograms::synth::SynthParams;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about = "Mines time-lagged dependencies between dated changes", long_about = None)]
pub struct Args {
    /// Log level (trace, debug, info, warn, error). RUST_LOG takes precedence
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Mine rule histograms from per-change occurrence lists
    Mine(MineArgs),

    /// Collect the timeline from the file names of a change directory
    Timepoints {
        /// Directory of per-day change files
        change_dir: PathBuf,

        /// Where to write the JSON array of days
        output: PathBuf,
    },

    /// Generate a synthetic dataset with injected dependencies
    Synth(SynthArgs),
}

#[derive(clap::Args, Debug)]
pub struct MineArgs {
    /// JSON object mapping each change to its ascending list of days
    pub change_file: PathBuf,

    /// JSON array of all days, ascending
    pub timepoint_file: PathBuf,

    /// Rule file; lines are appended
    pub output: PathBuf,

    /// Number of worker threads
    #[arg(long, default_value_t = DEFAULT_THREADS)]
    pub threads: usize,

    /// Minimal support, as a fraction of the timeline length
    #[arg(long, default_value_t = DEFAULT_MIN_SUPPORT)]
    pub min_sup: f64,

    /// Maximal support, as a fraction of the timeline length
    #[arg(long, default_value_t = DEFAULT_MAX_SUPPORT)]
    pub max_sup: f64,

    /// Minimal confidence
    #[arg(long, default_value_t = DEFAULT_MIN_CONFIDENCE)]
    pub min_conf: f64,

    /// Histogram bin count; lags up to num_bins - 1 days are considered
    #[arg(long, default_value_t = DEFAULT_NUM_BINS)]
    pub num_bins: usize,

    /// Maximal number of changes per partition
    #[arg(long, default_value_t = DEFAULT_PARTITION_SIZE)]
    pub partition_size: usize,

    /// Directory in which the scratch partition directory is created
    #[arg(long)]
    pub work_dir: Option<PathBuf>,

    /// Shuffle changes with this seed before partitioning
    #[arg(long)]
    pub shuffle_seed: Option<u64>,

    /// Empty the output file before writing instead of appending
    #[arg(long)]
    pub truncate: bool,
}

impl MineArgs {
    pub fn config(&self) -> MiningConfig {
        MiningConfig {
            min_support: self.min_sup,
            max_support: self.max_sup,
            min_confidence: self.min_conf,
            num_bins: self.num_bins,
            partition_size: self.partition_size,
            threads: self.threads,
            shuffle_seed: self.shuffle_seed,
            work_dir: self.work_dir.clone(),
        }
    }
}

#[derive(clap::Args, Debug)]
pub struct SynthArgs {
    /// Directory for the generated JSON files
    pub output_dir: PathBuf,

    #[arg(long, default_value_t = 500)]
    pub timepoints: usize,

    #[arg(long, default_value_t = 1000)]
    pub changes: usize,

    #[arg(long, default_value_t = 0.05)]
    pub min_sup: f64,

    #[arg(long, default_value_t = 0.4)]
    pub max_sup: f64,

    /// Fraction of changes that form injected dependency pairs
    #[arg(long, default_value_t = 0.01)]
    pub injection_ratio: f64,

    #[arg(long, default_value_t = 7)]
    pub window_size: usize,

    /// Seed for the random generator
    #[arg(long, default_value_t = 42)]
    pub seed: u64,
}

impl SynthArgs {
    pub fn params(&self) -> SynthParams {
        SynthParams {
            num_timepoints: self.timepoints,
            num_changes: self.changes,
            min_support: self.min_sup,
            max_support: self.max_sup,
            injection_ratio: self.injection_ratio,
            window_size: self.window_size,
        }
    }
}
