use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "kvlog",
    about = "kvlog: a key-value store that remembers every value",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Storage directory [default: .kvlog]
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// TOML configuration file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Set the current value of a key
    Set(SetArgs),
    /// Print the current value of a key, or its value at a past instant
    Get(GetArgs),
    /// Show every version of a key, newest first
    History(HistoryArgs),
}

#[derive(Args)]
pub struct SetArgs {
    pub key: String,
    pub value: String,
}

#[derive(Args)]
pub struct GetArgs {
    pub key: String,
    /// Nanoseconds since the UNIX epoch or an RFC 3339 date-time
    #[arg(long)]
    pub at: Option<String>,
}

#[derive(Args)]
pub struct HistoryArgs {
    pub key: String,
    #[arg(short = 'n', long)]
    pub limit: Option<usize>,
    #[arg(long)]
    pub oneline: bool,
}
