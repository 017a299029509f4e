use clap::{Args, Parser, Subcommand, ValueEnum};
use intake_core::HashAlgo;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "intake",
    version,
    about = "Manifest-first archive intake: declare, stream, verify, promote"
)]
pub struct Cli {
    /// Log output format (logs go to stderr)
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Describe an existing zip as the manifest a client would register
    Manifest(ManifestArgs),
    /// Validate a manifest without registering it
    Check(CheckArgs),
    /// Register a manifest, stream its archive and promote it to the store
    Push(PushArgs),
}

#[derive(Debug, Args, Clone)]
pub struct ManifestArgs {
    /// Zip archive to describe
    #[arg(long, value_name = "ZIP")]
    pub archive: PathBuf,

    /// Transaction id to put in the manifest
    #[arg(long)]
    pub txn_id: String,

    /// Whole-archive digest algorithm
    #[arg(long, default_value = "SHA-256")]
    pub archive_algo: HashAlgo,

    /// Per-entry digest algorithm
    #[arg(long, default_value = "SHA-1")]
    pub entry_algo: HashAlgo,

    /// Write the manifest here instead of stdout
    #[arg(long)]
    pub out: Option<PathBuf>,
}

#[derive(Debug, Args, Clone)]
pub struct CheckArgs {
    /// Manifest JSON file
    #[arg(long, value_name = "JSON")]
    pub manifest: PathBuf,
}

#[derive(Debug, Args, Clone)]
pub struct PushArgs {
    /// Manifest JSON file
    #[arg(long, value_name = "JSON")]
    pub manifest: PathBuf,

    /// Zip archive to stream
    #[arg(long, value_name = "ZIP")]
    pub archive: PathBuf,

    /// Store URL (memory://, file:///path, s3://bucket/prefix, filer+http://host:port)
    #[arg(long, env = "INTAKE_STORE_URL")]
    pub store: Option<String>,

    /// Bucket reported in the receipt
    #[arg(long, env = "INTAKE_BUCKET")]
    pub bucket: Option<String>,

    /// YAML config file; flags and INTAKE_* variables take precedence
    #[arg(long, env = "INTAKE_CONFIG")]
    pub config: Option<PathBuf>,
}
