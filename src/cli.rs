use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Konnect search client
#[derive(Debug, Parser)]
#[command(name = "konnect-search")]
#[command(version)]
#[command(about = "Ask the Konnect search endpoint and watch the answer stream in", long_about = None)]
pub struct Args {
    /// Search endpoint URL (default: $KONNECT_SEARCH_ENDPOINT or config endpoint)
    #[arg(long = "endpoint", value_name = "URL")]
    pub endpoint: Option<String>,

    /// Backend: "http" or "stub" (default: config backend or "http")
    #[arg(long = "backend")]
    pub backend: Option<String>,

    /// Cancel the search after this many seconds
    #[arg(long = "timeout", value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Print the final result as JSON instead of text
    #[arg(long = "json")]
    pub json: bool,

    #[command(subcommand)]
    pub cmd: Option<Command>,

    /// Query text (positional) (used when no subcommand is given)
    #[arg(value_name = "QUERY")]
    pub query: Vec<String>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Feed a captured response body through the assembler
    Replay {
        /// File holding the raw body
        path: PathBuf,
        /// Bytes per simulated read
        #[arg(long = "slice", default_value_t = 64)]
        slice: usize,
    },
}
