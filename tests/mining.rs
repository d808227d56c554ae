//! End-to-end tests: partitioned mining against the direct sweep, file I/O,
//! and recovery of injected dependencies.

use std::collections::BTreeMap;

use change_histograms::config::SweepParams;
use change_histograms::synth::{self, SynthParams};
use change_histograms::timeline::filter_by_support;
use change_histograms::*;
use rand::rngs::StdRng;
use rand::SeedableRng;

// ─────────────────────── helpers ───────────────────────

fn timeline(n: usize) -> Timeline {
    Timeline::new((0..n).map(|d| format!("{d:03}")).collect()).unwrap()
}

fn changes(entries: &[(&str, Vec<usize>)]) -> ChangeMap {
    entries
        .iter()
        .map(|(id, days)| (id.to_string(), days.iter().map(|d| format!("{d:03}")).collect()))
        .collect()
}

/// A small universe with a few real dependencies and some noise.
fn universe() -> ChangeMap {
    let every = |step: usize, offset: usize| (0..60).filter(|d| d % step == offset).collect::<Vec<_>>();
    changes(&[
        ("orders_status_update", every(5, 0)),
        ("orders_shipped_update", every(5, 2)),
        ("invoice_total_update", every(5, 3)),
        ("users_email_update", every(7, 1)),
        ("users_name_update", every(7, 2)),
        ("stock_count_update", every(4, 1)),
        ("stock_price_update", every(6, 4)),
        ("daily_batch", every(1, 0)),
    ])
}

fn config(partition_size: usize, threads: usize) -> MiningConfig {
    MiningConfig {
        min_support: 0.1,
        max_support: 0.5,
        min_confidence: 0.5,
        num_bins: 5,
        partition_size,
        threads,
        shuffle_seed: None,
        work_dir: None,
    }
}

fn keyed(rules: Vec<Rule>) -> BTreeMap<(String, String), Rule> {
    rules
        .into_iter()
        .map(|r| ((r.antecedent.clone(), r.consequent.clone()), r))
        .collect()
}

fn mine_in_memory(input: ChangeMap, t: &Timeline, config: &MiningConfig) -> Vec<Rule> {
    let sink = MemorySink::new();
    let summary = mine(input, t, config, &sink).unwrap();
    assert!(summary.failed_jobs.is_empty());
    let rules = sink.into_rules();
    assert_eq!(rules.len(), summary.rules_emitted);
    rules
}

// ─────────────────────── partitioning ───────────────────────

#[test]
fn partitioned_run_matches_direct_sweep() {
    let t = timeline(60);
    let cfg = config(3, 4);

    // Direct sweep over the whole universe as both antecedents and consequents
    let bounds = t.support_bounds(cfg.min_support, cfg.max_support);
    let (filtered, _) = filter_by_support(universe(), &bounds);
    let pool = ChangePool::build(&filtered, &t).unwrap();
    let direct = keyed(change_histograms::sweep::mine(&pool, &pool, cfg.sweep_params(&bounds)));
    assert!(!direct.is_empty());

    let partitioned = mine_in_memory(universe(), &t, &cfg);
    let count = partitioned.len();
    let partitioned = keyed(partitioned);
    assert_eq!(count, partitioned.len(), "no pair may be emitted twice");
    assert_eq!(direct, partitioned);
}

#[test]
fn single_partition_matches_many_partitions() {
    let t = timeline(60);
    let one = keyed(mine_in_memory(universe(), &t, &config(usize::MAX, 1)));
    let many = keyed(mine_in_memory(universe(), &t, &config(1, 3)));
    let shuffled = keyed(mine_in_memory(
        universe(),
        &t,
        &MiningConfig {
            shuffle_seed: Some(9),
            ..config(2, 2)
        },
    ));
    assert_eq!(one, many);
    assert_eq!(one, shuffled);
}

#[test]
fn repeated_runs_are_identical() {
    let t = timeline(60);
    let first = mine_in_memory(universe(), &t, &config(2, 1));
    let second = mine_in_memory(universe(), &t, &config(2, 1));
    assert_eq!(first, second);
}

#[test]
fn mined_rules_respect_thresholds() {
    let t = timeline(60);
    let cfg = config(3, 2);
    let bounds = t.support_bounds(cfg.min_support, cfg.max_support);
    let input = universe();
    let rules = mine_in_memory(input.clone(), &t, &cfg);

    for rule in &rules {
        let a = input[&rule.antecedent].len();
        let c = input[&rule.consequent].len();
        assert_ne!(rule.antecedent, rule.consequent);
        assert!(rule.support <= a.min(c));
        assert!(rule.support >= bounds.min_count);
        assert!(rule.confidence >= cfg.min_confidence);
        assert_eq!(rule.bin_total(), rule.support);
        assert_eq!(rule.bins.len(), cfg.num_bins);
        assert!(rule.antecedent != "daily_batch" && rule.consequent != "daily_batch");
    }

    let shipped = rules
        .iter()
        .find(|r| r.antecedent == "orders_status_update" && r.consequent == "orders_shipped_update")
        .expect("status -> shipped should be mined");
    assert_eq!(shipped.bins, vec![0, 0, 12, 0, 0]);
}

// ─────────────────────── scenarios ───────────────────────

#[test]
fn too_frequent_change_never_appears() {
    let t = timeline(10);
    let input = changes(&[
        ("A", vec![0, 3, 6]),
        ("B", vec![1, 4, 8]),
        ("always", (0..10).collect()),
    ]);
    let cfg = MiningConfig {
        min_support: 0.2,
        max_support: 0.5,
        min_confidence: 0.5,
        num_bins: 3,
        ..config(10, 1)
    };
    let rules = mine_in_memory(input, &t, &cfg);
    assert!(rules.iter().all(|r| r.antecedent != "always" && r.consequent != "always"));
    let rule = rules
        .iter()
        .find(|r| r.antecedent == "A" && r.consequent == "B")
        .unwrap();
    assert_eq!(rule.bins, vec![0, 2, 1]);
    assert_eq!(rule.support, 3);
}

#[test]
fn engine_can_be_stepped_day_by_day() {
    let t = timeline(10);
    let pool = ChangePool::build(&changes(&[("A", vec![0, 3, 6]), ("B", vec![1, 4, 8])]), &t).unwrap();
    let params = SweepParams {
        num_bins: 3,
        min_support_count: 2,
        min_confidence: 0.5,
    };
    let mut engine = SweepEngine::new(&pool, &pool, params);
    for day in 0..t.len() {
        engine.step(day);
    }
    let rules = engine.finish();
    let rule = rules.iter().find(|r| r.antecedent == "A").unwrap();
    assert_eq!(rule.consequent, "B");
    assert_eq!(rule.bins, vec![0, 2, 1]);
}

// ─────────────────────── files ───────────────────────

#[test]
fn mining_from_files_appends_readable_rules() {
    let dir = tempfile::tempdir().unwrap();
    let change_file = dir.path().join("changes.json");
    let timepoint_file = dir.path().join("timepoints.json");
    let output = dir.path().join("rules.csv");

    std::fs::write(&change_file, serde_json::to_string(&universe()).unwrap()).unwrap();
    std::fs::write(&timepoint_file, serde_json::to_string(timeline(60).days()).unwrap()).unwrap();

    let t = load_timeline(&timepoint_file).unwrap();
    let cfg = MiningConfig {
        work_dir: Some(dir.path().join("scratch")),
        ..config(3, 2)
    };

    let sink = emit::open_output(&output, true).unwrap();
    let summary = mine(load_changes(&change_file).unwrap(), &t, &cfg, &sink).unwrap();
    drop(sink);

    let written = read_rules(&output).unwrap();
    assert_eq!(written.len(), summary.rules_emitted);
    assert_eq!(keyed(written), keyed(mine_in_memory(universe(), &t, &config(3, 2))));

    // Scratch partitions are gone once the run is over
    let leftovers = std::fs::read_dir(dir.path().join("scratch")).unwrap().count();
    assert_eq!(leftovers, 0);
}

#[test]
fn unknown_day_is_rejected_before_output() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("rules.csv");
    let t = timeline(10);
    let input = changes(&[("A", vec![0, 3, 6]), ("B", vec![1, 4, 20])]);

    let sink = emit::open_output(&output, true).unwrap();
    let result = mine(input, &t, &config(10, 1), &sink);
    assert!(matches!(result, Err(MineError::MalformedInput { ref change, .. }) if change == "B"));
    drop(sink);
    assert_eq!(std::fs::read_to_string(&output).unwrap(), "");
}

// ─────────────────────── synthetic data ───────────────────────

#[test]
fn injected_dependencies_are_recovered() {
    let params = SynthParams {
        num_timepoints: 300,
        num_changes: 60,
        min_support: 0.05,
        max_support: 0.3,
        injection_ratio: 0.2,
        window_size: 7,
    };
    let data = synth::generate(&params, &mut StdRng::seed_from_u64(2024)).unwrap();
    let t = Timeline::new(data.timeline.clone()).unwrap();
    let cfg = MiningConfig {
        min_support: params.min_support,
        max_support: params.max_support,
        min_confidence: 0.7,
        num_bins: params.window_size,
        partition_size: 16,
        threads: 4,
        shuffle_seed: None,
        work_dir: None,
    };

    let rules = keyed(mine_in_memory(data.changes.clone(), &t, &cfg));
    assert_eq!(data.injected.len(), 6);
    for dep in &data.injected {
        let rule = rules
            .get(&(dep.antecedent.clone(), dep.consequent.clone()))
            .unwrap_or_else(|| panic!("{} -> {} not mined", dep.antecedent, dep.consequent));
        assert_eq!(rule.bins, dep.bins);
        assert_eq!(rule.support, dep.support);
        assert!((rule.confidence - dep.confidence).abs() < 1e-12);
    }
}
