//! softlock - advisory file locks for git
//!
//! Takes, releases, and lists locks held by the lock authority, and checks
//! commits and merge requests against them.

use clap::Parser;
use softlock::cli::Cli;
use softlock::output::{emit_error, Console};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn main() {
    // Tracing is opt-in via RUST_LOG; invalid or huge filters are ignored.
    let filter = std::env::var("RUST_LOG")
        .ok()
        .and_then(|raw| {
            let raw = raw.trim();
            if raw.is_empty() || raw.len() > 4096 {
                return None;
            }
            EnvFilter::try_new(raw).ok()
        })
        .unwrap_or_else(|| EnvFilter::new("off"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let cli = Cli::parse();
    let console = Console::stdio(cli.verbose);
    if let Err(err) = cli.run(&console) {
        emit_error(&console, &err);
        std::process::exit(err.exit_code());
    }
}
