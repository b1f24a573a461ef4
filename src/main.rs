mod cmd;

use clap::Parser;
use cmd::Cli;
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = cmd::run(cli) {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

/// Diagnostics go to stderr; stdout may be carrying SQL.
fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
