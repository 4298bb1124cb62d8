mod cmd_config;
mod cmd_record;
mod cmd_session;
mod workspace;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "tempo", version, about = "Record coding sessions as local JSONL timelines")]
struct Cli {
    /// Workspace root (defaults to the current directory)
    #[arg(long, global = true)]
    workspace: Option<PathBuf>,
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start a new session and record until stdin closes
    Record,
    /// Continue the paused session of this workspace
    Resume,
    /// End the paused session of this workspace
    Stop,
    /// Show the session state of this workspace
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Manage workspace recorder settings
    Config {
        #[command(subcommand)]
        cmd: cmd_config::ConfigCmd,
    },
}

fn init_logging() {
    let filter = EnvFilter::try_from_env("TEMPO_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> anyhow::Result<()> {
    init_logging();
    let cli = Cli::parse();
    let root = workspace::resolve_root(cli.workspace)?;

    match cli.cmd {
        Command::Record => cmd_record::record(&root),
        Command::Resume => cmd_record::resume(&root),
        Command::Stop => cmd_session::stop(&root),
        Command::Status { json } => cmd_session::status(&root, json),
        Command::Config { cmd } => cmd_config::run(cmd, &root),
    }
}
