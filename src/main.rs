use clap::{Parser, Subcommand};
use state_debugger::anchor::{AnchorOutcome, AnchorProtocol};
use state_debugger::decoration::DecorationStore;
use state_debugger::protocol::Server;
use state_debugger::{Result, Settings};
use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::{error, info};
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "state-debugger", version, about = "Verification state visualization service")]
struct Cli {
    /// JSON settings file, overridden by the editor's initialize request
    #[arg(long)]
    config: Option<PathBuf>,

    /// Default log filter when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Also append logs to this file
    #[arg(long)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Serve an editor over stdin/stdout (the default)
    Serve,
    /// Remove anchor glyphs from files that are not open in an editor
    StripMarkers {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli)?;

    let settings = match &cli.config {
        Some(path) => Settings::load(path)?,
        None => Settings::default(),
    };

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            info!("state debugger starting in stdio mode");
            let stdin = io::stdin();
            let stdout = io::stdout();
            let mut server = Server::new(stdin.lock(), stdout.lock(), settings);
            server.run()?;
            info!("state debugger exiting");
        }
        Command::StripMarkers { files } => strip_markers(&files),
    }
    Ok(())
}

fn strip_markers(files: &[PathBuf]) {
    let mut anchors = AnchorProtocol::new();
    let mut store = DecorationStore::new();
    for path in files {
        match anchors.remove_markers_from_closed_document(&mut store, path) {
            Ok(AnchorOutcome::Applied { edits }) => println!("{}: removed {} anchors", path.display(), edits),
            Ok(_) => println!("{}: no anchors", path.display()),
            Err(e) => error!(path = %path.display(), "{}", e),
        }
    }
}

/// Logs go to stderr since stdout carries the protocol.
fn init_tracing(cli: &Cli) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    match &cli.log_file {
        Some(path) => {
            let file = fs::OpenOptions::new().create(true).append(true).open(path)?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(io::stderr.and(Mutex::new(file)))
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_target(false)
                .with_writer(io::stderr)
                .init();
        }
    }
    Ok(())
}
