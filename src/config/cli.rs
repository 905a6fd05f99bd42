use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueHint, builder::BoolishValueParser};

/// Command-line arguments for the catalog-cache binary.
#[derive(Debug, Parser)]
#[command(
    name = "catalog-cache",
    version,
    about = "Inspect and maintain the catalog response cache"
)]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(
        long = "config-file",
        env = "CATALOG_CACHE_CONFIG_FILE",
        value_name = "PATH",
        value_hint = ValueHint::FilePath,
        global = true
    )]
    pub config_file: Option<PathBuf>,

    #[command(flatten)]
    pub overrides: GlobalOverrides,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Args, Default, Clone)]
pub struct GlobalOverrides {
    /// Override the remote cache connection URL.
    #[arg(long = "redis-url", value_name = "URL", global = true)]
    pub redis_url: Option<String>,

    /// Run against the local tier only.
    #[arg(long = "no-remote", action = clap::ArgAction::SetTrue, global = true)]
    pub no_remote: bool,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new(),
        global = true
    )]
    pub log_json: Option<bool>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Print hit/miss statistics and tier availability.
    Stats,
    /// Print the value stored under a key.
    Get(KeyArgs),
    /// Store a value under a key.
    Set(SetArgs),
    /// Remove a key from both tiers.
    Delete(KeyArgs),
    /// Remove every key starting with a prefix.
    Invalidate(InvalidateArgs),
    /// Remove every cached entry.
    Clear,
    /// Print the content fingerprint of a JSON document.
    Fingerprint(FingerprintArgs),
}

#[derive(Debug, Args, Clone)]
pub struct KeyArgs {
    /// Cache key, e.g. `cover:123:L`.
    #[arg(value_name = "KEY")]
    pub key: String,
}

#[derive(Debug, Args, Clone)]
pub struct SetArgs {
    #[arg(value_name = "KEY")]
    pub key: String,

    /// Value to store; parsed as JSON when possible, stored as text otherwise.
    #[arg(value_name = "VALUE")]
    pub value: String,

    /// Time to live; defaults to `cache.default_ttl_seconds`.
    #[arg(long = "ttl", value_name = "SECONDS")]
    pub ttl_seconds: Option<u64>,
}

#[derive(Debug, Args, Clone)]
pub struct InvalidateArgs {
    /// Key prefix; a trailing `*` is accepted and ignored.
    #[arg(value_name = "PREFIX")]
    pub prefix: String,
}

#[derive(Debug, Args, Clone)]
pub struct FingerprintArgs {
    /// JSON file to fingerprint; reads stdin when omitted.
    #[arg(value_name = "FILE", value_hint = ValueHint::FilePath)]
    pub file: Option<PathBuf>,
}
