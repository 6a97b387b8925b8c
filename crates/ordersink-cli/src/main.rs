use clap::Parser;
use ordersink_core::logging;

mod cli;
mod server;

use crate::cli::Cli;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize logging as early as possible; fall back to stderr if the
    // state dir is not writable.
    if cli.log_stderr || logging::init_logging().is_err() {
        logging::init_logging_stderr();
    }

    if let Err(err) = cli.run().await {
        eprintln!("ordersink error: {:#}", err);
        std::process::exit(1);
    }
}
