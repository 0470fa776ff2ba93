//! CLI command definitions and handlers

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

pub mod args;
pub mod cache;
pub mod context;
pub mod get;

pub use args::{GlobalOptions, OutputFormat};
pub use context::CommandContext;

/// campusfetch - cached, deduplicated access to the campus platform API
#[derive(Parser, Debug)]
#[command(name = "campusfetch")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Output format (pretty, json)
    #[arg(
        long,
        global = true,
        env = "CAMPUSFETCH_FORMAT",
        default_value = "pretty",
        hide_env = true,
        hide_possible_values = true
    )]
    pub format: OutputFormat,

    /// Override config file location
    #[arg(long, global = true, env = "CAMPUSFETCH_CONFIG", hide_env = true)]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true, env = "CAMPUSFETCH_DEBUG", hide_env = true)]
    pub debug: bool,

    /// Bypass the persistent cache entirely
    #[arg(long, global = true, env = "CAMPUSFETCH_NO_CACHE", hide_env = true)]
    pub no_cache: bool,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fetch a resource through the cache
    #[command(after_help = "EXAMPLES:\n  \
            campusfetch get /courses                     # Cached for the default TTL\n  \
            campusfetch get /courses -p dept=MATH        # With query parameters\n  \
            campusfetch get /exams/42 --refresh          # Skip the cache read\n  \
            campusfetch get /market --ttl 60 --timeout 5")]
    Get(GetArgs),

    /// Manage local response cache
    #[command(subcommand)]
    Cache(CacheCommands),

    /// Display version information
    Version,
}

/// Arguments for `campusfetch get`
#[derive(Args, Debug, Clone)]
pub struct GetArgs {
    /// API path, joined onto the configured base URL
    pub path: String,

    /// Query parameter as key=value (repeatable)
    #[arg(long = "param", short = 'p', value_parser = args::parse_param)]
    pub params: Vec<(String, String)>,

    /// Cache entry lifetime in seconds
    #[arg(long)]
    pub ttl: Option<u64>,

    /// Request timeout in seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Fetch from the network even if a fresh entry is cached
    #[arg(long)]
    pub refresh: bool,
}

/// Cache management subcommands
#[derive(Subcommand, Debug)]
pub enum CacheCommands {
    /// Show cache statistics
    Status,
    /// Clear all cached data
    Clear,
    /// Print cache directory path
    Path,
    /// Remove every entry whose key contains the pattern
    Evict {
        /// Substring to match against cache keys
        pattern: String,
    },
}
