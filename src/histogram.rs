// src/histogram.rs

use crate::model::{ChangeId, Rule};

/// Lag distribution of one antecedent -> consequent pair.
///
/// A pair has no histogram until the sweep first decides it is worth
/// tracking, and constructing one is the only way to set it up. Pruning drops
/// the value; `finalize` consumes it into a [`Rule`]. Recording into a pair
/// that was never set up, or setting one up twice, cannot be expressed.
#[derive(Debug, Clone)]
pub struct Histogram {
    bins: Vec<u32>,
    support: usize,
    /// Total occurrences of the antecedent; the confidence denominator
    antecedent_total: usize,
    /// Antecedent occurrences seen since this histogram was set up
    antecedent_seen: usize,
}

impl Histogram {
    pub fn new(num_bins: usize, antecedent_total: usize) -> Self {
        Self {
            bins: vec![0; num_bins],
            support: 0,
            antecedent_total,
            antecedent_seen: 0,
        }
    }

    /// Counts one consequent occurrence `lag` days after the antecedent.
    pub fn record(&mut self, lag: usize) {
        assert!(
            lag < self.bins.len(),
            "lag {lag} outside histogram of {} bins",
            self.bins.len()
        );
        self.bins[lag] += 1;
        self.support += 1;
        debug_assert!(self.support <= self.antecedent_total);
    }

    pub fn note_antecedent_occurrence(&mut self) {
        self.antecedent_seen += 1;
    }

    pub fn antecedent_occurrences(&self) -> usize {
        self.antecedent_seen
    }

    /// Antecedent occurrences that could still be credited, counting the one
    /// that is currently in the window.
    pub fn remaining_antecedent_occurrences(&self) -> usize {
        (self.antecedent_total + 1).saturating_sub(self.antecedent_seen)
    }

    pub fn support(&self) -> usize {
        self.support
    }

    pub fn bins(&self) -> &[u32] {
        &self.bins
    }

    pub fn confidence(&self) -> f64 {
        self.support as f64 / self.antecedent_total as f64
    }

    /// Whether crediting up to `possible` more occurrences could still lift
    /// this pair over both thresholds.
    pub fn can_reach(&self, possible: usize, min_support_count: usize, min_confidence: f64) -> bool {
        let best = self.support + possible;
        best >= min_support_count && best as f64 / self.antecedent_total as f64 >= min_confidence
    }

    /// Whether the pair met both thresholds by the end of the sweep.
    pub fn meets(&self, min_support_count: usize, min_confidence: f64) -> bool {
        self.support >= min_support_count && self.confidence() >= min_confidence
    }

    pub fn finalize(self, antecedent: ChangeId, consequent: ChangeId, consequent_total: usize) -> Rule {
        let confidence = self.confidence();
        let lift = self.support as f64 / (self.antecedent_total as f64 * consequent_total as f64);
        Rule {
            antecedent,
            consequent,
            support: self.support,
            confidence,
            lift,
            bins: self.bins,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_tracks_support() {
        let mut hist = Histogram::new(3, 3);
        hist.record(1);
        hist.record(1);
        hist.record(2);
        assert_eq!(hist.bins(), &[0, 2, 1]);
        assert_eq!(hist.support(), 3);
        assert!((hist.confidence() - 1.0).abs() < 1e-12);
    }

    #[test]
    #[should_panic]
    fn test_record_outside_window_panics() {
        let mut hist = Histogram::new(3, 3);
        hist.record(3);
    }

    #[test]
    fn test_remaining_antecedent_occurrences() {
        let mut hist = Histogram::new(3, 4);
        assert_eq!(hist.remaining_antecedent_occurrences(), 5);
        for _ in 0..4 {
            hist.note_antecedent_occurrence();
        }
        assert_eq!(hist.antecedent_occurrences(), 4);
        assert_eq!(hist.remaining_antecedent_occurrences(), 1);
    }

    #[test]
    fn test_can_reach() {
        let mut hist = Histogram::new(5, 10);
        hist.record(0);
        // 1 + 5 = 6 of 10 occurrences
        assert!(hist.can_reach(5, 6, 0.6));
        assert!(!hist.can_reach(5, 7, 0.6));
        assert!(!hist.can_reach(5, 6, 0.61));
    }

    #[test]
    fn test_finalize_computes_lift() {
        let mut hist = Histogram::new(2, 4);
        hist.record(0);
        hist.record(1);
        let rule = hist.finalize("a".into(), "b".into(), 5);
        assert_eq!(rule.support, 2);
        assert!((rule.confidence - 0.5).abs() < 1e-12);
        assert!((rule.lift - 0.1).abs() < 1e-12);
        assert_eq!(rule.bin_total(), rule.support);
    }
}
