mod cli;
mod commands;
mod logging;
mod render;
mod settings;

use clap::Parser;

use crate::cli::Cli;
use crate::logging::LogDestination;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::initialize(
        LogDestination::from_option(cli.log_file.as_deref()),
        scrape_logging::level_for_verbosity(cli.verbose),
    );
    commands::execute(cli).await
}
