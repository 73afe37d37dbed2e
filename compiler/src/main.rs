use clap::Parser;
use gravel_lang::cli::{Cli, CliHandler};
use std::process;
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = Cli::parse();

    // RUST_LOG wins over -v
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cli.log_level()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let handler = CliHandler::new(cli.trace);

    if let Err(e) = handler.handle(cli) {
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}
