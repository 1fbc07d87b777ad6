use crate::build_info;
use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    about = "Polls live dispatch tables and maintains the hot-calls table",
    version = build_info::VERSION_WITH_COMMIT,
    long_version = build_info::VERSION_WITH_COMMIT
)]
pub struct Cli {
    #[arg(long, default_value_t = false)]
    /// Run a single cycle immediately and exit
    pub once: bool,

    #[arg(long, default_value_t = false)]
    /// Do not apply pending migrations at startup
    pub skip_migrations: bool,

    #[arg(long)]
    /// Override POLL_INTERVAL_SECS
    pub interval_secs: Option<u64>,
}

pub fn parse_args() -> Cli {
    Cli::parse()
}
