// src/synth.rs

use crate::error::{MineError, Result};
use crate::write_json;
use crate::model::{ChangeId, ChangeMap, Day};
use rand::seq::index;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Shape of a generated dataset.
#[derive(Debug, Clone)]
pub struct SynthParams {
    pub num_timepoints: usize,
    pub num_changes: usize,
    pub min_support: f64,
    pub max_support: f64,
    /// Fraction of `num_changes` spent on injected antecedent/consequent pairs
    pub injection_ratio: f64,
    pub window_size: usize,
}

impl Default for SynthParams {
    fn default() -> Self {
        Self {
            num_timepoints: 500,
            num_changes: 1000,
            min_support: 0.05,
            max_support: 0.4,
            injection_ratio: 0.01,
            window_size: 7,
        }
    }
}

/// A dependency planted in the data, with the histogram a correct miner
/// must reproduce.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InjectedDependency {
    pub antecedent: ChangeId,
    pub consequent: ChangeId,
    pub support: usize,
    pub confidence: f64,
    pub bins: Vec<u32>,
}

#[derive(Debug, Clone)]
pub struct SyntheticDataset {
    pub changes: ChangeMap,
    pub timeline: Vec<Day>,
    pub injected: Vec<InjectedDependency>,
}

/// Builds random noise changes plus injected pairs whose consequent follows
/// the antecedent at one or two fixed lags.
///
/// Antecedent occurrences are spaced further apart than the largest lag, so
/// every planted consequent occurrence is attributable to exactly one
/// antecedent occurrence.
pub fn generate<R: Rng>(params: &SynthParams, rng: &mut R) -> Result<SyntheticDataset> {
    let n = params.num_timepoints;
    if params.window_size < 3 {
        return Err(MineError::Configuration(
            "synthetic datasets need a window of at least 3".into(),
        ));
    }
    let min_count = ((params.min_support * n as f64).ceil() as usize).max(1);
    let max_count = (params.max_support * n as f64).floor() as usize;
    if min_count > max_count || max_count > n {
        return Err(MineError::Configuration(format!(
            "support range [{min_count}, {max_count}] does not fit {n} timepoints"
        )));
    }

    let width = n.saturating_sub(1).to_string().len();
    let day = |d: usize| format!("{d:0width$}");
    let timeline: Vec<Day> = (0..n).map(day).collect();

    let num_injected = (params.num_changes as f64 * params.injection_ratio).round() as usize;
    let num_noise = params.num_changes.saturating_sub(num_injected);

    let mut changes = ChangeMap::new();
    for i in 0..num_noise {
        let count = rng.gen_range(min_count..=max_count);
        let mut occurrences = index::sample(rng, n, count).into_vec();
        occurrences.sort_unstable();
        changes.insert(format!("noise_{i}"), occurrences.into_iter().map(day).collect());
    }

    let mut injected = Vec::new();
    for i in (0..num_injected).step_by(2) {
        let antecedent = format!("inject_{i}");
        let consequent = format!("inject_{}", i + 1);

        // 1. One or two lag peaks strictly inside the window
        let candidates: Vec<usize> = (1..params.window_size - 1).collect();
        let num_peaks = rng.gen_range(1..=2usize).min(candidates.len());
        let mut peaks: Vec<usize> = index::sample(rng, candidates.len(), num_peaks)
            .into_iter()
            .map(|k| candidates[k])
            .collect();
        peaks.sort_unstable();
        let max_peak = peaks[peaks.len() - 1];

        // 2. Antecedent occurrences, spaced by more than the largest lag
        let start = rng.gen_range(0..params.window_size);
        let slots: Vec<usize> = (start..n.saturating_sub(max_peak)).step_by(max_peak + 1).collect();
        if slots.len() < min_count {
            return Err(MineError::Configuration(format!(
                "{n} timepoints leave room for only {} occurrences of '{antecedent}', need {min_count}",
                slots.len()
            )));
        }
        let count = rng.gen_range(min_count..=max_count.min(slots.len()));
        let mut antecedent_days: Vec<usize> = index::sample(rng, slots.len(), count)
            .into_iter()
            .map(|k| slots[k])
            .collect();
        antecedent_days.sort_unstable();

        // 3. The first `support` antecedent occurrences are followed by the consequent
        let planned_confidence: f64 = rng.gen_range(0.9..1.0);
        let support = ((planned_confidence * count as f64).round() as usize).clamp(min_count, max_count);
        let mut bins = vec![0u32; params.window_size];
        let consequent_days: Vec<usize> = antecedent_days[..support]
            .iter()
            .map(|&t| {
                let lag = peaks[rng.gen_range(0..peaks.len())];
                bins[lag] += 1;
                t + lag
            })
            .collect();

        changes.insert(antecedent.clone(), antecedent_days.into_iter().map(day).collect());
        changes.insert(consequent.clone(), consequent_days.into_iter().map(day).collect());
        injected.push(InjectedDependency {
            antecedent,
            consequent,
            support,
            confidence: support as f64 / count as f64,
            bins,
        });
    }

    Ok(SyntheticDataset {
        changes,
        timeline,
        injected,
    })
}

impl SyntheticDataset {
    /// Writes `synthetic_changes.json`, `synthetic_timepoints.json` and
    /// `injected_dependencies.json` into `dir`.
    pub fn write_to(&self, dir: &Path) -> Result<()> {
        std::fs::create_dir_all(dir).map_err(|e| MineError::io(dir, e))?;
        write_json(&dir.join("synthetic_changes.json"), &self.changes)?;
        write_json(&dir.join("synthetic_timepoints.json"), &self.timeline)?;
        write_json(&dir.join("injected_dependencies.json"), &self.injected)
    }
}
