use clap::{ArgAction, Parser};

/// Abacus: a chat calculator.
/// Starts an MCP tool server, then answers questions interactively through an
/// OpenAI-style chat completions API.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Increase message verbosity.
    ///
    /// Specify multiple times for more verbose output:
    ///  -v:  INFO level
    ///  -vv: DEBUG level
    ///  -vvv: TRACE level (most verbose)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}
