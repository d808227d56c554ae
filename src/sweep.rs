// src/sweep.rs

use crate::config::SweepParams;
use crate::histogram::Histogram;
use crate::model::{DayIndex, Rule};
use crate::timeline::ChangePool;
use indicatif::ProgressBar;
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, trace};

/// Counters describing how much work a sweep did and avoided.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepStats {
    pub histograms_created: usize,
    pub pairs_pruned: usize,
    pub observations: usize,
    pub peak_histograms: usize,
}

/// State of one pass over the timeline for one antecedent pool and one
/// consequent pool. Owned by a single job and dropped when it finishes.
pub struct SweepEngine<'a> {
    params: SweepParams,
    antecedents: &'a ChangePool,
    consequents: &'a ChangePool,
    num_days: usize,
    /// antecedent -> days since its last occurrence, always below `num_bins`
    active: BTreeMap<u32, usize>,
    /// antecedent -> consequent -> histogram
    histograms: Vec<BTreeMap<u32, Histogram>>,
    live_histograms: usize,
    /// consequent -> antecedents that can no longer reach the thresholds
    pruned: Vec<HashSet<u32>>,
    /// consequent -> occurrences already swept past
    consequent_seen: Vec<usize>,
    stats: SweepStats,
}

impl<'a> SweepEngine<'a> {
    pub fn new(antecedents: &'a ChangePool, consequents: &'a ChangePool, params: SweepParams) -> Self {
        assert_eq!(
            antecedents.num_days(),
            consequents.num_days(),
            "both pools must be resolved against the same timeline"
        );

        // A change is never its own antecedent
        let pruned = (0..consequents.len() as u32)
            .map(|cons| {
                let mut set = HashSet::new();
                if let Some(same) = antecedents.find(consequents.id(cons)) {
                    set.insert(same);
                }
                set
            })
            .collect();

        Self {
            params,
            antecedents,
            consequents,
            num_days: antecedents.num_days(),
            active: BTreeMap::new(),
            histograms: vec![BTreeMap::new(); antecedents.len()],
            live_histograms: 0,
            pruned,
            consequent_seen: vec![0; consequents.len()],
            stats: SweepStats::default(),
        }
    }

    /// Sweeps the whole timeline and returns the rules that met both thresholds.
    pub fn run(self) -> (Vec<Rule>, SweepStats) {
        self.run_with_progress(&ProgressBar::hidden())
    }

    /// Like [`run`](Self::run), advancing `bar` by one per day swept.
    pub fn run_with_progress(mut self, bar: &ProgressBar) -> (Vec<Rule>, SweepStats) {
        bar.set_length(self.num_days as u64);
        for day in 0..self.num_days {
            self.step(day);
            trace!(
                day,
                active = self.active.len(),
                histograms = self.live_histograms,
                "day processed"
            );
            bar.inc(1);
        }
        bar.finish();
        let stats = self.stats;
        let rules = self.finish();
        debug!(
            rules = rules.len(),
            created = stats.histograms_created,
            pruned = stats.pairs_pruned,
            peak = stats.peak_histograms,
            "sweep finished"
        );
        (rules, stats)
    }

    /// Processes a single day. Days must be fed in timeline order.
    pub fn step(&mut self, day: DayIndex) {
        let antecedents = self.antecedents;
        let consequents = self.consequents;
        let SweepParams {
            num_bins,
            min_support_count,
            min_confidence,
        } = self.params;

        // 1. Today's antecedent occurrences count against their open histograms
        let today = antecedents.active_on(day);
        for &ant in today {
            for hist in self.histograms[ant as usize].values_mut() {
                hist.note_antecedent_occurrence();
            }
        }

        // 2. Age the window; whatever reaches num_bins can no longer land in a bin
        self.active.retain(|_, age| {
            *age += 1;
            *age < num_bins
        });

        // 3. Today's antecedents (re)enter at age 0
        for &ant in today {
            self.active.insert(ant, 0);
        }

        // 4. Too few days left for a new histogram to collect min support
        let can_shortcut_support = self.num_days - day < num_bins;

        // 5. Credit every consequent occurring today to the active antecedents
        for &cons in consequents.active_on(day) {
            let occurrences = consequents.occurrences(cons);
            let seen = self.consequent_seen[cons as usize];
            self.consequent_seen[cons as usize] += 1;

            let days_since_last_consequent = match seen {
                0 => num_bins,
                _ => day - occurrences[seen - 1],
            };
            let remaining_consequent = occurrences.len() - seen;
            let pruned = &mut self.pruned[cons as usize];

            for (&ant, &lag) in &self.active {
                // The consequent recurred after this antecedent; that lag belongs
                // to a later firing
                if lag >= days_since_last_consequent || pruned.contains(&ant) {
                    continue;
                }

                let antecedent_total = antecedents.occurrences(ant).len();
                let row = &mut self.histograms[ant as usize];
                let hist = match row.entry(cons) {
                    Entry::Occupied(entry) => entry.into_mut(),
                    Entry::Vacant(entry) => {
                        let maximal_confidence = occurrences.len() as f64 / antecedent_total as f64;
                        if can_shortcut_support || maximal_confidence < min_confidence {
                            pruned.insert(ant);
                            self.stats.pairs_pruned += 1;
                            continue;
                        }
                        self.stats.histograms_created += 1;
                        self.live_histograms += 1;
                        entry.insert(Histogram::new(num_bins, antecedent_total))
                    }
                };

                let possible = remaining_consequent.min(hist.remaining_antecedent_occurrences());
                if hist.can_reach(possible, min_support_count, min_confidence) {
                    hist.record(lag);
                    self.stats.observations += 1;
                } else {
                    row.remove(&cons);
                    pruned.insert(ant);
                    self.live_histograms -= 1;
                    self.stats.pairs_pruned += 1;
                }
            }
        }

        self.stats.peak_histograms = self.stats.peak_histograms.max(self.live_histograms);
    }

    /// Drops pairs that were never pruned but still missed a threshold, and
    /// turns the rest into rules.
    pub fn finish(self) -> Vec<Rule> {
        let SweepParams {
            min_support_count,
            min_confidence,
            ..
        } = self.params;
        let antecedents = self.antecedents;
        let consequents = self.consequents;

        let mut rules = Vec::new();
        for (ant, row) in self.histograms.into_iter().enumerate() {
            for (cons, hist) in row {
                if !hist.meets(min_support_count, min_confidence) {
                    continue;
                }
                rules.push(hist.finalize(
                    antecedents.id(ant as u32).clone(),
                    consequents.id(cons).clone(),
                    consequents.occurrences(cons).len(),
                ));
            }
        }
        rules
    }
}

/// Runs a full sweep of `antecedents` against `consequents`.
pub fn mine(antecedents: &ChangePool, consequents: &ChangePool, params: SweepParams) -> Vec<Rule> {
    SweepEngine::new(antecedents, consequents, params).run().0
}
