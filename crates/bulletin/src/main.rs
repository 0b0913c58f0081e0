mod chat;
mod cli;
mod config;
mod logging;
mod summarize;

use anyhow::Result;
use clap::Parser;

use crate::cli::{Cli, Command};

fn main() -> Result<()> {
    let cli = Cli::parse();
    let verbose = if cli.verbose {
        true
    } else {
        logging::env_flag()
    };
    logging::init(verbose);
    match cli.command {
        Command::Summarize {
            input,
            instructions,
        } => summarize::run(input, instructions),
        Command::Chat { attach } => chat::run(attach),
    }
}
