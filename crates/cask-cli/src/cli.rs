use std::path::PathBuf;

use cask_types::{MediaType, OwnerId, ReferenceId};
use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "cask",
    about = "cask: content-addressed file storage with deduplication",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// Configuration file (TOML)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Store root, overriding the configuration
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,

    /// Act as this owner
    #[arg(long, global = true, conflicts_with = "token")]
    pub owner: Option<OwnerId>,

    /// Bearer token, resolved through the configured principals
    #[arg(long, global = true)]
    pub token: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Upload files, storing each distinct content once
    Upload(UploadArgs),
    /// List your references, newest first
    List,
    /// Delete one of your references
    Delete(DeleteArgs),
    /// Show storage usage and deduplication savings
    Stats,
    /// Repair counts and remove leftovers
    Sweep,
    /// Print the effective configuration
    Config,
}

#[derive(Args)]
pub struct UploadArgs {
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,
    /// Declared media type, checked against the content
    #[arg(long = "type")]
    pub media_type: Option<MediaType>,
    /// Make the references readable by everyone
    #[arg(long)]
    pub public: bool,
}

#[derive(Args)]
pub struct DeleteArgs {
    pub id: ReferenceId,
}
