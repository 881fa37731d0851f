//! yam: yet another make command.

use clap::Parser;
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = yamk::cli::Cli::parse();

    let level = match cli.verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = yamk::cli::run(cli) {
        if !matches!(e, yamk::core::error::Error::CommandFailed { .. }) {
            eprintln!("error: {}", e);
        }
        std::process::exit(e.exit_code());
    }
}
