use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "sfpr",
    about = "SFP module registry: intake, review, and publishing of EEPROM profiles",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Configuration file (default: ./sfpr.toml if present)
    #[arg(short, long, global = true)]
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
    /// Create a registry and write its configuration file
    Init(InitArgs),
    /// Submit a metadata file and an EEPROM image
    Submit(SubmitArgs),
    /// List staged submissions
    List(ListArgs),
    /// Show one staged submission
    Show(ShowArgs),
    /// Approve a new submission for publishing
    Approve(DecisionArgs),
    /// Reject a submission that is not yet approved
    Reject(RejectArgs),
    /// Settle a metadata conflict
    Adjudicate(AdjudicateArgs),
    /// List device keys with conflicting images
    Conflicts,
    /// Publish all approved submissions as a new index version
    Publish,
    /// Print the published index
    Index(IndexArgs),
    /// Check the content store and the published index
    Fsck,
    /// Run the HTTP server
    Serve(ServeArgs),
}

#[derive(Args)]
pub struct InitArgs {
    /// Data directory for blobs, staging and the index
    #[arg(long, default_value = "registry")]
    pub data_dir: PathBuf,
    /// Approve new submissions without review
    #[arg(long)]
    pub auto_approve: bool,
    /// Overwrite an existing configuration file
    #[arg(long)]
    pub force: bool,
}

#[derive(Args)]
pub struct SubmitArgs {
    /// JSON metadata document
    pub metadata: PathBuf,
    /// Raw EEPROM image
    pub blob: PathBuf,
    /// Submitter label
    #[arg(long = "by")]
    pub submitted_by: Option<String>,
}

#[derive(Args)]
pub struct ListArgs {
    /// Include rejected submissions
    #[arg(short, long)]
    pub all: bool,
}

#[derive(Args)]
pub struct ShowArgs {
    pub id: String,
}

#[derive(Args)]
pub struct DecisionArgs {
    pub id: String,
    #[arg(long, default_value = "cli")]
    pub actor: String,
}

#[derive(Args)]
pub struct RejectArgs {
    pub id: String,
    #[arg(long)]
    pub reason: String,
    #[arg(long, default_value = "cli")]
    pub actor: String,
}

#[derive(Args)]
pub struct AdjudicateArgs {
    pub id: String,
    /// supersede | reject
    pub ruling: sfpr_staging::Adjudication,
    #[arg(long)]
    pub reason: Option<String>,
    #[arg(long, default_value = "cli")]
    pub actor: String,
}

#[derive(Args)]
pub struct IndexArgs {
    /// An archived version instead of the current one
    #[arg(long)]
    pub version: Option<u64>,
}

#[derive(Args)]
pub struct ServeArgs {
    /// Override the configured bind address
    #[arg(long)]
    pub bind: Option<SocketAddr>,
}
