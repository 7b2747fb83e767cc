mod commands;
mod settings;
mod terminal;

use std::process::ExitCode;

use commands::{CommandLine, Commands, hosts, images};
use terminal::logging;

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let commands = CommandLine::parse_args();

    logging::init(commands.verbose);

    match commands.command {
        Commands::Images(args) => {
            let settings = settings::load(commands.config.as_deref())?;
            images::images(args, settings).await
        }
        Commands::Hosts { tokens } => hosts::hosts(&tokens),
    }
}
