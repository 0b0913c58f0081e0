use clap::{ArgAction, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "bulletin", about = "Token-bounded map-reduce document summarizer")]
pub struct Cli {
    #[arg(long, global = true, action = ArgAction::SetTrue)]
    pub verbose: bool,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Summarize a plain-text document in one shot.
    Summarize {
        input: String,
        /// Path to a guided-instructions file; a built-in template is used
        /// when omitted.
        #[arg(long)]
        instructions: Option<String>,
    },
    /// Interactive chat over an optional attached document.
    Chat {
        /// Plain-text file whose content grounds every turn.
        #[arg(long)]
        attach: Option<String>,
    },
}
