//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use clap::Parser;
use std::path::PathBuf;

/// critsync - push Egerie business-impact scores to Cyberwatch criticalities
///
/// Fetches supporting assets and their sigma scores from Egerie risk
/// analyses, maps each score to a criticality through threshold bands,
/// and applies it to every server of the Cyberwatch group bearing the
/// same name.
///
/// Examples:
///   critsync --analyses 1042,1043
///   critsync --config prod.toml --dry-run
///   critsync --format json --output summary.json
///   critsync --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Path to configuration file
    ///
    /// If not specified, looks for .critsync.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Egerie analysis ids to fetch (comma-separated)
    ///
    /// Overrides `sync.analyses` from the config file.
    #[arg(
        short,
        long,
        value_name = "IDS",
        value_delimiter = ',',
        env = "CRITSYNC_ANALYSES"
    )]
    pub analyses: Option<Vec<String>>,

    /// Egerie base URL
    #[arg(long, value_name = "URL", env = "EGERIE_URL")]
    pub egerie_url: Option<String>,

    /// Egerie API username
    #[arg(long, value_name = "USER", env = "EGERIE_USERNAME")]
    pub egerie_username: Option<String>,

    /// Egerie API password
    #[arg(long, value_name = "PASSWORD", env = "EGERIE_PASSWORD", hide_env_values = true)]
    pub egerie_password: Option<String>,

    /// Cyberwatch base URL
    #[arg(long, value_name = "URL", env = "CYBERWATCH_URL")]
    pub cyberwatch_url: Option<String>,

    /// Cyberwatch API access key
    #[arg(long, value_name = "KEY", env = "CYBERWATCH_API_KEY")]
    pub cyberwatch_api_key: Option<String>,

    /// Cyberwatch API secret key
    #[arg(
        long,
        value_name = "KEY",
        env = "CYBERWATCH_SECRET_KEY",
        hide_env_values = true
    )]
    pub cyberwatch_secret_key: Option<String>,

    /// Request timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Resolve and match everything, list planned updates, change nothing
    #[arg(long)]
    pub dry_run: bool,

    /// Skip the Cyberwatch connectivity check
    #[arg(long)]
    pub skip_ping: bool,

    /// Exit with code 2 if any server update or group listing failed
    ///
    /// Useful for scheduled runs that should alert on partial failures.
    #[arg(long)]
    pub fail_on_error: bool,

    /// Summary format (text, json)
    #[arg(long, default_value = "text", value_name = "FORMAT")]
    pub format: OutputFormat,

    /// Also write the JSON summary to this file
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Generate a default .critsync.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for the run summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text (default)
    #[default]
    Text,
    /// JSON format
    Json,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        for (flag, url) in [
            ("--egerie-url", &self.egerie_url),
            ("--cyberwatch-url", &self.cyberwatch_url),
        ] {
            if let Some(url) = url {
                if !url.starts_with("http://") && !url.starts_with("https://") {
                    return Err(format!("{} must start with 'http://' or 'https://'", flag));
                }
            }
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Some(timeout) = self.timeout {
            if timeout == 0 {
                return Err("Timeout must be at least 1 second".to_string());
            }
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}
