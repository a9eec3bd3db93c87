//! CLI argument parsing with clap

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand, ValueEnum};
use vault_init_core::config::SaveMethodKind;

/// vault-init - Bootstrap a Vault-compatible server and keep its keys safe
#[derive(Parser, Debug)]
#[command(name = "vault-init")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    pub log_format: LogFormat,

    /// Path to vault-init.yaml config file
    #[arg(short, long, global = true)]
    pub config: Option<Utf8PathBuf>,

    #[command(flatten)]
    pub connection: ConnectionArgs,

    #[command(flatten)]
    pub save: SaveArgs,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show version information
    Version(VersionArgs),

    /// Initialize the server and save the generated keys
    Init(InitArgs),

    /// Replace the saved unseal or recovery shares
    Rekey(RekeyArgs),

    /// Generate a new root token and revoke the old one
    RotateRoot,

    /// Rekey, then rotate the root token with the new shares
    Rotate(RekeyArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

/// Server being bootstrapped
#[derive(Args, Debug, Default)]
pub struct ConnectionArgs {
    /// Server address
    #[arg(long, env = "VAULT_ADDR", global = true)]
    pub address: Option<String>,

    /// Token revoked after a root rotation (defaults to the previous root token)
    #[arg(long, env = "VAULT_TOKEN", global = true, hide_env_values = true)]
    pub token: Option<String>,

    /// Enterprise namespace
    #[arg(long, env = "VAULT_NAMESPACE", global = true)]
    pub namespace: Option<String>,
}

/// Where the bootstrap result is saved
#[derive(Args, Debug, Default)]
pub struct SaveArgs {
    /// Save backend: file, kube-secret or vault-kv
    #[arg(long = "save", global = true)]
    pub method: Option<SaveMethodKind>,

    /// Replace an existing, different result when initializing
    #[arg(long, global = true)]
    pub overwrite: bool,

    /// File written when the save backend fails
    #[arg(long, global = true)]
    pub fallback_path: Option<Utf8PathBuf>,

    /// Output file of the file backend
    #[arg(long, global = true)]
    pub file_path: Option<Utf8PathBuf>,

    /// Name of the Kubernetes secret
    #[arg(long, global = true)]
    pub kube_secret_name: Option<String>,

    /// Namespace of the Kubernetes secret
    #[arg(long, global = true)]
    pub kube_secret_namespace: Option<String>,

    /// Kubeconfig used instead of in-cluster config or KUBECONFIG
    #[arg(long, global = true)]
    pub kubeconfig: Option<Utf8PathBuf>,

    /// Address of the server holding the KV backup
    #[arg(long, env = "VAULT_KV_ADDR", global = true)]
    pub vault_kv_addr: Option<String>,

    /// Token for the KV backup server
    #[arg(long, env = "VAULT_KV_TOKEN", global = true, hide_env_values = true)]
    pub vault_kv_token: Option<String>,

    /// KV v2 mount on the backup server
    #[arg(long, global = true)]
    pub vault_kv_mount: Option<String>,

    /// Secret path under the KV mount
    #[arg(long, global = true)]
    pub vault_kv_path: Option<String>,
}

// Version command
#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug, Default)]
pub struct InitArgs {
    /// Number of unseal shares
    #[arg(long)]
    pub secret_shares: Option<u8>,

    /// Unseal shares required to reconstruct the key
    #[arg(long)]
    pub secret_threshold: Option<u8>,

    /// Number of recovery shares (auto-unseal servers)
    #[arg(long)]
    pub recovery_shares: Option<u8>,

    /// Recovery shares required to authorize an operation
    #[arg(long)]
    pub recovery_threshold: Option<u8>,

    /// Give up waiting for the server after this many seconds
    #[arg(long)]
    pub timeout: Option<u64>,
}

#[derive(Args, Debug, Default)]
pub struct RekeyArgs {
    /// Rotate the recovery shares instead of the unseal shares
    #[arg(long)]
    pub recovery: bool,

    /// Submit the new shares back before they take effect
    #[arg(long)]
    pub verify: bool,

    /// Ask the server to keep a backup of PGP-encrypted shares
    #[arg(long)]
    pub backup: bool,
}
