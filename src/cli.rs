//! CLI argument definitions.

use clap::Parser;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "jstall",
    about = "Diagnose stalled Java applications from one or more thread dumps",
    after_help = "\
EXAMPLES:
    jstall --dump thread-dump.txt                   Analyze a single static dump
    jstall --dump before.txt --dump after.txt       Compare two dumps for progress/churn
    jstall --pid 1234 --interval 5 --timeout 60     Attach live and sample every 5s
    jstall --dump dump.txt --json                   Print the loss-free JSON projection"
)]
pub struct Args {
    /// Thread dump file to analyze (repeatable; order matters, oldest first)
    #[arg(long, value_name = "FILE")]
    pub dump: Vec<PathBuf>,

    /// Attach to a running JVM by pid instead of reading files
    #[arg(long)]
    pub pid: Option<u32>,

    /// Seconds between live captures
    #[arg(long, default_value = "5")]
    pub interval: u64,

    /// Overall live-mode timeout in seconds
    #[arg(long, default_value = "30")]
    pub timeout: u64,

    /// Use `jcmd Thread.print` instead of `jstack` for live captures
    #[arg(long)]
    pub use_jcmd: bool,

    /// Include daemon threads in filtered views
    #[arg(long)]
    pub include_daemon: bool,

    /// Include threads matching GC/VM name patterns
    #[arg(long)]
    pub include_gc: bool,

    /// Include VM-internal background threads
    #[arg(long)]
    pub include_vm: bool,

    /// Regex; threads matching any ignore pattern are dropped (repeatable)
    #[arg(long, value_name = "REGEX")]
    pub ignore: Vec<String>,

    /// Regex; if set, only matching threads are kept (repeatable)
    #[arg(long, value_name = "REGEX")]
    pub focus: Vec<String>,

    /// Print the loss-free JSON projection instead of a human summary
    #[arg(long)]
    pub json: bool,
}
