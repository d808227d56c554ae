// src/main.rs

mod cli;

use change_histograms::{emit, load_changes, load_timeline, synth, write_timepoints, Result, RunSummary};
use clap::Parser;
use cli::{Args, Command, MineArgs, SynthArgs};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::process::ExitCode;
use std::time::Instant;
use tracing::info;

fn main() -> ExitCode {
    let args = Args::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&args.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let start_time = Instant::now();
    println!("Start: {}", chrono::Local::now().to_rfc2822());

    let outcome = match &args.command {
        Command::Mine(mine_args) => run_mine(mine_args),
        Command::Timepoints { change_dir, output } => write_timepoints(change_dir, output).map(|days| {
            println!("Wrote {} days to {}.", days, output.display());
        }),
        Command::Synth(synth_args) => run_synth(synth_args),
    };

    println!("End: {}", chrono::Local::now().to_rfc2822());
    println!("Total time: {:.2?}", start_time.elapsed());

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run_mine(args: &MineArgs) -> Result<()> {
    let config = args.config();
    config.validate()?;

    let timeline = load_timeline(&args.timepoint_file)?;
    let changes = load_changes(&args.change_file)?;
    info!(
        days = timeline.len(),
        changes = changes.len(),
        min_sup = config.min_support,
        max_sup = config.max_support,
        min_conf = config.min_confidence,
        num_bins = config.num_bins,
        partition_size = config.partition_size,
        threads = config.threads,
        "input loaded"
    );

    let sink = emit::open_output(&args.output, args.truncate)?;
    let summary = change_histograms::mine(changes, &timeline, &config, &sink)?;
    report(&summary);
    Ok(())
}

fn report(summary: &RunSummary) {
    println!(
        "Mined {} changes ({} dropped by support) in {} partitions, {} jobs.",
        summary.changes_considered, summary.changes_dropped, summary.partitions, summary.jobs
    );
    println!("Rules emitted: {}", summary.rules_emitted);
    if !summary.failed_jobs.is_empty() {
        eprintln!(
            "{} of {} jobs failed; their rules are missing from the output:",
            summary.failed_jobs.len(),
            summary.jobs
        );
        for failure in &summary.failed_jobs {
            eprintln!(
                "  partition {} -> partition {}: {}",
                failure.antecedents, failure.consequents, failure.reason
            );
        }
    }
}

fn run_synth(args: &SynthArgs) -> Result<()> {
    let mut rng = StdRng::seed_from_u64(args.seed);
    let dataset = synth::generate(&args.params(), &mut rng)?;
    dataset.write_to(&args.output_dir)?;
    println!(
        "Wrote {} changes over {} timepoints with {} injected dependencies to {}.",
        dataset.changes.len(),
        dataset.timeline.len(),
        dataset.injected.len(),
        args.output_dir.display()
    );
    Ok(())
}
