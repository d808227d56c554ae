// src/dispatch.rs

use crate::config::{MiningConfig, SweepParams};
use crate::emit::RuleSink;
use crate::error::{MineError, Result};
use crate::model::{ChangeMap, JobFailure, RunSummary};
use crate::partition::{self, Job, ScratchSpace};
use crate::sweep::SweepEngine;
use crate::timeline::{filter_by_support, ChangePool, Timeline};
use indicatif::{ParallelProgressIterator, ProgressBar, ProgressStyle};
use rayon::prelude::*;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;
use tracing::{debug, error, info};

/// Mines every change in `changes` against every other one and writes the
/// surviving rules to `sink`.
///
/// Configuration and input problems abort before anything is written. A job
/// that fails mid-run loses its own rules only and is listed in the summary.
pub fn mine(
    changes: ChangeMap,
    timeline: &Timeline,
    config: &MiningConfig,
    sink: &dyn RuleSink,
) -> Result<RunSummary> {
    config.validate()?;
    timeline.validate(&changes)?;

    // 1. Drop changes that are too rare or too frequent
    let bounds = timeline.support_bounds(config.min_support, config.max_support);
    let (candidates, dropped) = filter_by_support(changes, &bounds);
    info!(
        kept = candidates.len(),
        dropped,
        min_count = bounds.min_count,
        max_count = bounds.max_count,
        "filtered changes by support"
    );

    // 2. Persist the partitions for the workers
    let chunks = partition::split(&candidates, config.partition_size, config.shuffle_seed);
    drop(candidates);
    let mut scratch = ScratchSpace::create(config.work_dir.as_deref())?;
    scratch.write_partitions(&chunks)?;
    let considered = chunks.iter().map(|c| c.len()).sum();
    drop(chunks);
    debug!(dir = %scratch.path().display(), partitions = scratch.partitions().len(), "partitions written");

    // 3. Work through the Cartesian product of partitions
    let jobs = scratch.jobs();
    let job_count = jobs.len();
    let params = config.sweep_params(&bounds);
    let (rules_emitted, failed_jobs) = run_jobs(jobs, timeline, params, config.threads, sink)?;

    let partitions = scratch.partitions().len();
    scratch.close()?;

    Ok(RunSummary {
        changes_considered: considered,
        changes_dropped: dropped,
        partitions,
        jobs: job_count,
        rules_emitted,
        failed_jobs,
    })
}

/// Runs `jobs` on a pool of `threads` workers. Idle workers take the next
/// pending job until none are left. Returns the number of rules written and
/// the jobs that failed, in job order.
pub fn run_jobs(
    jobs: Vec<Job>,
    timeline: &Timeline,
    params: SweepParams,
    threads: usize,
    sink: &dyn RuleSink,
) -> Result<(usize, Vec<JobFailure>)> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .thread_name(|i| format!("miner-{i:02}"))
        .build()
        .map_err(|e| MineError::Configuration(format!("cannot start {threads} workers: {e}")))?;

    // A lone job reports its days instead of a 0/1 job count
    let (bar, days) = if jobs.len() == 1 {
        (ProgressBar::hidden(), styled_bar(timeline.len(), "days", "Sweeping timeline"))
    } else {
        (styled_bar(jobs.len(), "jobs", "Mining histograms"), ProgressBar::hidden())
    };
    let rules = AtomicUsize::new(0);

    let failures: Vec<JobFailure> = pool.install(|| {
        jobs.into_par_iter()
            .progress_with(bar.clone())
            .filter_map(|job| {
                let worker = rayon::current_thread_index();
                let started = Instant::now();
                debug!(
                    ?worker,
                    antecedents = job.antecedents.index,
                    consequents = job.consequents.index,
                    "job started"
                );

                let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                    run_job_with_progress(&job, timeline, params, sink, &days)
                }));
                let reason = match outcome {
                    Ok(Ok(written)) => {
                        rules.fetch_add(written, Ordering::Relaxed);
                        debug!(
                            ?worker,
                            antecedents = job.antecedents.index,
                            consequents = job.consequents.index,
                            rules = written,
                            elapsed = ?started.elapsed(),
                            "job finished"
                        );
                        return None;
                    }
                    Ok(Err(e)) => e.to_string(),
                    Err(payload) => panic_message(payload.as_ref()),
                };

                error!(
                    ?worker,
                    antecedents = job.antecedents.index,
                    consequents = job.consequents.index,
                    %reason,
                    "job failed, its rules are missing from the output"
                );
                Some(JobFailure {
                    antecedents: job.antecedents.index,
                    consequents: job.consequents.index,
                    reason,
                })
            })
            .collect()
    });
    bar.finish_with_message("Mining complete");
    info!(
        workers = pool.current_num_threads(),
        failed = failures.len(),
        "all jobs done"
    );

    Ok((rules.into_inner(), failures))
}

fn styled_bar(len: usize, unit: &str, message: &'static str) -> ProgressBar {
    let bar = ProgressBar::new(len as u64);
    bar.set_style(
        ProgressStyle::with_template(&format!("{{msg}} [{{bar:40}}] {{pos}}/{{len}} {unit} ({{elapsed}})"))
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    bar.set_message(message);
    bar
}

/// Loads both partitions, sweeps the global timeline and hands the rules to
/// the sink. Returns the number of rules written.
pub fn run_job(job: &Job, timeline: &Timeline, params: SweepParams, sink: &dyn RuleSink) -> Result<usize> {
    run_job_with_progress(job, timeline, params, sink, &ProgressBar::hidden())
}

fn run_job_with_progress(
    job: &Job,
    timeline: &Timeline,
    params: SweepParams,
    sink: &dyn RuleSink,
    days: &ProgressBar,
) -> Result<usize> {
    let antecedents = ChangePool::build(&partition::load_partition(&job.antecedents.path)?, timeline)?;
    let loaded;
    let consequents = if job.consequents.index == job.antecedents.index {
        &antecedents
    } else {
        loaded = ChangePool::build(&partition::load_partition(&job.consequents.path)?, timeline)?;
        &loaded
    };

    let (rules, _) = SweepEngine::new(&antecedents, consequents, params).run_with_progress(days);

    if !rules.is_empty() {
        sink.write_rules(&rules)?;
    }
    Ok(rules.len())
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("worker panicked: {message}")
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("worker panicked: {message}")
    } else {
        "worker panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emit::MemorySink;

    fn timeline(n: usize) -> Timeline {
        Timeline::new((0..n).map(|d| format!("{d:02}")).collect()).unwrap()
    }

    fn changes(entries: &[(&str, &[usize])]) -> ChangeMap {
        entries
            .iter()
            .map(|(id, days)| (id.to_string(), days.iter().map(|d| format!("{d:02}")).collect()))
            .collect()
    }

    fn config(partition_size: usize, threads: usize) -> MiningConfig {
        MiningConfig {
            min_support: 0.2,
            max_support: 0.5,
            min_confidence: 0.5,
            num_bins: 3,
            partition_size,
            threads,
            shuffle_seed: None,
            work_dir: None,
        }
    }

    #[test]
    fn test_mine_writes_rules_and_summary() {
        let t = timeline(10);
        let all: Vec<usize> = (0..10).collect();
        let input = changes(&[("A", &[0, 3, 6]), ("B", &[1, 4, 8]), ("Z", &all)]);

        let sink = MemorySink::new();
        let summary = mine(input, &t, &config(1, 2), &sink).unwrap();
        assert_eq!(summary.changes_dropped, 1);
        assert_eq!(summary.partitions, 2);
        assert_eq!(summary.jobs, 4);
        assert!(summary.failed_jobs.is_empty());

        let rules = sink.into_rules();
        assert_eq!(rules.len(), summary.rules_emitted);
        let rule = rules
            .iter()
            .find(|r| r.antecedent == "A" && r.consequent == "B")
            .unwrap();
        assert_eq!(rule.bins, vec![0, 2, 1]);
        assert!(rules.iter().all(|r| r.antecedent != "Z" && r.consequent != "Z"));
    }

    #[test]
    fn test_every_job_runs_once_with_fewer_workers_than_jobs() {
        let t = timeline(10);
        let input = changes(&[("A", &[0, 3, 6]), ("B", &[1, 4, 8]), ("C", &[2, 5, 9]), ("D", &[0, 4, 7])]);

        let sink = MemorySink::new();
        let summary = mine(input.clone(), &t, &config(1, 2), &sink).unwrap();
        assert_eq!(summary.jobs, 16);
        assert!(summary.failed_jobs.is_empty());
        let mut pooled = sink.into_rules();

        let sink = MemorySink::new();
        mine(input, &t, &config(4, 1), &sink).unwrap();
        let mut single = sink.into_rules();

        let key = |r: &crate::model::Rule| (r.antecedent.clone(), r.consequent.clone());
        pooled.sort_by_key(key);
        single.sort_by_key(key);
        assert_eq!(pooled.len(), summary.rules_emitted);
        assert_eq!(pooled, single);
    }

    #[test]
    fn test_invalid_config_aborts_before_work() {
        let t = timeline(10);
        let sink = MemorySink::new();
        let result = mine(changes(&[("A", &[0, 3, 6])]), &t, &config(0, 2), &sink);
        assert!(matches!(result, Err(MineError::Configuration(_))));
        assert!(sink.into_rules().is_empty());
    }

    #[test]
    fn test_malformed_input_names_change() {
        let t = timeline(10);
        let sink = MemorySink::new();
        let result = mine(changes(&[("A", &[6, 3, 0])]), &t, &config(5, 1), &sink);
        match result {
            Err(MineError::MalformedInput { change, .. }) => assert_eq!(change, "A"),
            other => panic!("expected malformed input, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_partition_fails_only_its_job() {
        let t = timeline(10);
        let scratch_parent = tempfile::tempdir().unwrap();
        let mut scratch = ScratchSpace::create(Some(scratch_parent.path())).unwrap();
        let input = changes(&[("A", &[0, 3, 6]), ("B", &[1, 4, 8])]);
        scratch.write_partitions(&partition::split(&input, 1, None)).unwrap();

        let mut jobs = scratch.jobs();
        let mut broken = jobs[0].clone();
        broken.antecedents.path = scratch_parent.path().join("missing.json");
        broken.antecedents.index = 99;
        jobs.push(broken);

        let params = SweepParams {
            num_bins: 3,
            min_support_count: 2,
            min_confidence: 0.5,
        };
        let sink = MemorySink::new();
        let (written, failures) = run_jobs(jobs, &t, params, 2, &sink).unwrap();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].antecedents, 99);
        assert_eq!(written, sink.into_rules().len());
        assert!(written >= 1);
    }
}
