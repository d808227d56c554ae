// src/model.rs

use std::collections::BTreeMap;

/// Uniquely identifies a change pattern, e.g. `table_column_row_changetype`
pub type ChangeId = String;

/// A point on the timeline: an ISO date or date+hour string
pub type Day = String;

/// Position of a day within the global timeline
pub type DayIndex = usize;

/// Days on which a single change occurred, ascending and without duplicates
pub type OccurrenceList = Vec<Day>;

/// Maps every change to its occurrences.
///
/// A `BTreeMap` so that candidate order, partition contents and emission order
/// are the same on every run.
pub type ChangeMap = BTreeMap<ChangeId, OccurrenceList>;

/// A mined temporal dependency: `consequent` tends to follow `antecedent`
/// within the histogram's window.
#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    pub antecedent: ChangeId,
    pub consequent: ChangeId,
    /// Number of antecedent occurrences followed by the consequent within the window
    pub support: usize,
    /// `support` divided by the antecedent's total occurrence count
    pub confidence: f64,
    /// `support / (antecedent occurrences * consequent occurrences)`
    pub lift: f64,
    /// `bins[k]` counts consequent occurrences seen `k` days after the antecedent
    pub bins: Vec<u32>,
}

impl Rule {
    /// Sum of all bins; equals `support` for every rule the miner produces.
    pub fn bin_total(&self) -> usize {
        self.bins.iter().map(|&b| b as usize).sum()
    }
}

/// Counts reported after a run over all jobs.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub changes_considered: usize,
    pub changes_dropped: usize,
    pub partitions: usize,
    pub jobs: usize,
    pub rules_emitted: usize,
    pub failed_jobs: Vec<JobFailure>,
}

/// A job whose results are missing from the output.
#[derive(Debug, Clone)]
pub struct JobFailure {
    pub antecedents: usize,
    pub consequents: usize,
    pub reason: String,
}
