//! tracksync CLI
//!
//! Command-line client for the tracksync engine.
//!
//! # Commands
//!
//! - `load` - Print a collection (local first, remote on miss)
//! - `save` - Save a collection from a JSON file
//! - `approve` - Save approved tracks and promote them into `tracks`
//! - `sync` - Reconcile all collections with the remote document
//! - `validate` - Check a token's validity and scope
//! - `credential` - Set, show, or clear the stored remote credential
//! - `status` - Show local collections and remote health

mod commands;

use clap::{Parser, Subcommand};
use commands::{Context, Format};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// tracksync command-line client.
#[derive(Parser)]
#[command(name = "tracksync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the local store directory
    #[arg(global = true, short, long, default_value = ".tracksync")]
    path: PathBuf,

    /// Base URL of the remote document API
    #[arg(global = true, long)]
    api_url: Option<String>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    /// Output format
    #[arg(global = true, short, long, value_enum, default_value_t = Format::Text)]
    format: Format,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print a collection
    Load {
        /// Collection key (tracks, playlist, approvedTracks)
        key: String,
    },

    /// Save a collection from a JSON file (`-` reads stdin)
    Save {
        /// Collection key
        key: String,
        /// JSON array of records
        file: PathBuf,
    },

    /// Save approved tracks and promote them into the catalog
    Approve {
        /// JSON array of approved records (`-` reads stdin)
        file: PathBuf,
    },

    /// Reconcile all collections with the remote document
    Sync,

    /// Check a token without storing it
    Validate {
        /// Token to check; defaults to the stored token
        #[arg(short, long)]
        token: Option<String>,
    },

    /// Manage the stored remote credential
    Credential {
        #[command(subcommand)]
        action: CredentialAction,
    },

    /// Show local collections and remote health
    Status,
}

#[derive(Subcommand)]
enum CredentialAction {
    /// Store a document id and optional token
    Set {
        /// Remote document id
        document_id: String,

        /// Bearer token
        #[arg(short, long)]
        token: Option<String>,

        /// Store the token without validating it first
        #[arg(long)]
        skip_validation: bool,
    },

    /// Show the stored credential (the token is never printed)
    Show,

    /// Remove the stored credential
    Clear,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> commands::CliResult<()> {
    let ctx = Context::open(&cli.path, cli.api_url, cli.format)?;

    match cli.command {
        Commands::Load { key } => commands::data::load(&ctx, &key).await,
        Commands::Save { key, file } => commands::data::save(&ctx, &key, &file).await,
        Commands::Approve { file } => commands::data::approve(&ctx, &file).await,
        Commands::Sync => commands::sync::run(&ctx).await,
        Commands::Validate { token } => commands::credential::validate(&ctx, token).await,
        Commands::Credential { action } => match action {
            CredentialAction::Set {
                document_id,
                token,
                skip_validation,
            } => commands::credential::set(&ctx, &document_id, token, skip_validation).await,
            CredentialAction::Show => commands::credential::show(&ctx),
            CredentialAction::Clear => commands::credential::clear(&ctx),
        },
        Commands::Status => commands::status::run(&ctx).await,
    }
}
