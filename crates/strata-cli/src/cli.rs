use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use strata_types::Address;

#[derive(Parser)]
#[command(
    name = "strata",
    about = "Strata: a container registry backed by an append-only ledger",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// TOML configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Wallet key file, overriding the configured one
    #[arg(short, long, global = true)]
    pub wallet: Option<PathBuf>,

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
    /// Generate a new wallet key file
    Keygen(KeygenArgs),
    /// Print the wallet's ledger address
    Address,
    /// Inspect or update an organization
    Org(OrgArgs),
    /// Tag lookups
    Tag(TagArgs),
    /// Blob lookups
    Blob(BlobArgs),
    /// Start the registry server
    Serve,
}

#[derive(Args)]
pub struct KeygenArgs {
    /// Where to write the key file
    #[arg(short, long, default_value = "wallet.json")]
    pub out: PathBuf,
}

#[derive(Args)]
pub struct OrgArgs {
    #[command(subcommand)]
    pub action: OrgAction,
}

#[derive(Subcommand)]
pub enum OrgAction {
    /// Show an organization's current state
    Show { org: String },
    /// Create an organization or replace its authorized users
    Set {
        org: String,
        /// Authorized user address (repeatable)
        #[arg(short, long = "user", value_parser = parse_address)]
        users: Vec<Address>,
        /// New homepage; the current one is kept when omitted
        #[arg(long)]
        homepage: Option<String>,
    },
}

#[derive(Args)]
pub struct TagArgs {
    #[command(subcommand)]
    pub action: TagAction,
}

#[derive(Subcommand)]
pub enum TagAction {
    /// Print the digest a tag points at
    Resolve {
        org: String,
        artifact: String,
        tag: String,
    },
}

#[derive(Args)]
pub struct BlobArgs {
    #[command(subcommand)]
    pub action: BlobAction,
}

#[derive(Subcommand)]
pub enum BlobAction {
    /// Print where a blob's body can be fetched
    Locate {
        org: String,
        artifact: String,
        digest: String,
    },
}

fn parse_address(value: &str) -> Result<Address, String> {
    Address::new(value).map_err(|e| e.to_string())
}
