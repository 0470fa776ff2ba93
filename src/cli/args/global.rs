//! Global CLI options shared across all commands

use std::path::{Path, PathBuf};

use crate::cli::{Cli, OutputFormat};

/// Global flags, captured once after parsing.
///
/// Precedence is CLI flag > environment variable > config file > default.
/// This struct holds the first two layers; config defaults are resolved in
/// `CommandContext`.
#[derive(Debug, Clone, Default)]
pub struct GlobalOptions {
    /// Output format (pretty, json)
    pub format: OutputFormat,

    /// Custom config file path (defaults to ~/.campusfetch/config.yaml)
    pub config: Option<PathBuf>,

    /// Neither read nor write the persistent cache
    pub no_cache: bool,
}

impl GlobalOptions {
    pub fn from_cli(cli: &Cli) -> Self {
        Self {
            format: cli.format,
            config: cli.config.clone(),
            no_cache: cli.no_cache,
        }
    }

    pub fn config_ref(&self) -> Option<&Path> {
        self.config.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_from_cli_flags() {
        let cli = Cli::try_parse_from([
            "campusfetch",
            "--format",
            "json",
            "--config",
            "/custom/config.yaml",
            "--no-cache",
            "version",
        ])
        .unwrap();

        let opts = GlobalOptions::from_cli(&cli);
        assert_eq!(opts.format, OutputFormat::Json);
        assert_eq!(opts.config_ref(), Some(Path::new("/custom/config.yaml")));
        assert!(opts.no_cache);
    }

    #[test]
    fn test_defaults() {
        let opts = GlobalOptions::default();
        assert_eq!(opts.format, OutputFormat::Pretty);
        assert_eq!(opts.config_ref(), None);
        assert!(!opts.no_cache);
    }
}
