use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;

use jstall::analysis::{self, verdict::Verdict};
use jstall::cli::Args;
use jstall::context::{AnalysisContext, AnalysisOptions, AnalysisOptionsOverrides};
use jstall::live::{ProcessDumpCapture, SamplerConfig, SamplerOutcome};
use jstall::model::ThreadDump;

fn main() -> Result<()> {
    env_logger::init();

    let args = Args::parse();

    let options = AnalysisOptions::new(
        &args.ignore,
        &args.focus,
        AnalysisOptionsOverrides {
            include_daemon: Some(args.include_daemon),
            include_gc: Some(args.include_gc),
            include_vm: Some(args.include_vm),
            ..Default::default()
        },
    )
    .context("invalid analysis options")?;

    let analysis = if let Some(pid) = args.pid {
        run_live(pid, &args, options)?
    } else {
        run_static(&args, options)?
    };

    match analysis {
        Outcome::Analysis(full) => {
            if args.json {
                println!("{}", serde_json::to_string_pretty(&full)?);
            } else {
                print_summary(&full);
            }
            std::process::exit(full.verdict.verdict.exit_code());
        }
        Outcome::Error(message) => {
            eprintln!("error: {message}");
            std::process::exit(Verdict::Error.exit_code());
        }
    }
}

enum Outcome {
    Analysis(analysis::FullAnalysis),
    Error(String),
}

fn run_static(args: &Args, options: AnalysisOptions) -> Result<Outcome> {
    if args.dump.is_empty() {
        anyhow::bail!("at least one --dump <FILE> is required in static mode (or pass --pid for live mode)");
    }

    let mut dumps = Vec::with_capacity(args.dump.len());
    for path in &args.dump {
        let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        let dump: ThreadDump = jstall::parser::parse(&text).with_context(|| format!("parsing {}", path.display()))?;
        dumps.push(dump);
    }

    let ctx = AnalysisContext::new(dumps, options).context("building analysis context")?;
    Ok(Outcome::Analysis(analysis::run_all(&ctx)))
}

fn run_live(pid: u32, args: &Args, options: AnalysisOptions) -> Result<Outcome> {
    info!("attaching to pid {pid}, sampling every {}s", args.interval);
    let capture = ProcessDumpCapture { use_jcmd: args.use_jcmd };
    let config = SamplerConfig {
        pid,
        interval: Duration::from_secs(args.interval),
        overall_timeout: Duration::from_secs(args.timeout),
        per_capture_timeout: Duration::from_secs(30),
    };

    match jstall::live::sampler::run(&config, &capture, options) {
        SamplerOutcome::Analysis(full) => Ok(Outcome::Analysis(full)),
        SamplerOutcome::Error(err) => Ok(Outcome::Error(err.to_string())),
    }
}

fn print_summary(full: &analysis::FullAnalysis) {
    println!("verdict: {:?} (confidence {:?})", full.verdict.verdict, full.verdict.confidence);
    for reason in &full.verdict.reasons {
        println!("  - {reason}");
    }
    if !full.deadlock.deadlocks.is_empty() {
        println!("deadlocks: {}", full.deadlock.deadlocks.len());
    }
    println!(
        "progress: {} active, {} no-progress, {} blocked, {} stuck, {} ignored (of {})",
        full.progress.summary.active,
        full.progress.summary.no_progress,
        full.progress.summary.blocked,
        full.progress.summary.stuck,
        full.progress.summary.ignored,
        full.progress.summary.total,
    );
    if full.churn.total_created + full.churn.total_destroyed > 0 {
        println!(
            "churn: +{} -{} (net {})",
            full.churn.total_created, full.churn.total_destroyed, full.churn.net_growth
        );
    }
}
