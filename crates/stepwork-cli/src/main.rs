mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use cmd::{script::ScriptSubcommand, session::SessionSubcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "stepwork",
    about = "Guided step-work sessions: question script, answer walker and HTTP API",
    version,
    propagate_version = true
)]
struct Cli {
    /// Data root (default: auto-detect from .stepwork/)
    #[arg(long, global = true, env = "STEPWORK_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create .stepwork/ with a default config and an editable copy of the question script
    Init,

    /// Run the HTTP API
    Serve {
        /// Port to listen on (default: server.port from config)
        #[arg(long)]
        port: Option<u16>,
    },

    /// Inspect and validate the question script
    Script {
        #[command(subcommand)]
        subcommand: ScriptSubcommand,
    },

    /// Inspect stored sessions
    Session {
        #[command(subcommand)]
        subcommand: SessionSubcommand,
    },

    /// Issue a bearer token for a user id (signed with the configured secret)
    Token {
        user_id: String,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Serve { .. } => tracing::Level::INFO,
        _ => tracing::Level::WARN,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .init();

    let root = root::resolve_root(cli.root.as_deref());

    let result = match cli.command {
        Commands::Init => cmd::init::run(&root),
        Commands::Serve { port } => cmd::serve::run(&root, port),
        Commands::Script { subcommand } => cmd::script::run(&root, subcommand, cli.json),
        Commands::Session { subcommand } => cmd::session::run(&root, subcommand, cli.json),
        Commands::Token { user_id } => cmd::token::run(&root, &user_id),
    };

    if let Err(e) = result {
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
