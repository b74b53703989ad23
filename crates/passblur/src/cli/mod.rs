//! Command-line interface for passblur.
//!
//! This module provides the CLI structure and the scan report used by the
//! `passblur` binary.

mod commands;
mod report;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use commands::{CategoryArg, ConfigCommand, OutputFormat, PatternsCommand, ScanCommand};
pub use report::{read_input, scan_text, MaskedValue, ScanReport};

/// passblur - Mask secrets and personal data in page content
///
/// Detects API keys, tokens, emails, phone numbers, payment card numbers and
/// SSNs, and shows what the masking engine would hide.
#[derive(Debug, Parser)]
#[command(name = "passblur")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Mask sensitive values in a text file
    Scan(ScanCommand),

    /// List the built-in detection rules
    Patterns(PatternsCommand),

    /// View or validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> crate::logging::Verbosity {
        crate::logging::Verbosity::from_flags(self.quiet, self.verbose)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::Category;
    use crate::logging::Verbosity;
    use clap::CommandFactory;

    fn cli(verbose: u8, quiet: bool) -> Cli {
        Cli {
            config: None,
            verbose,
            quiet,
            command: Command::Patterns(PatternsCommand { json: false }),
        }
    }

    #[test]
    fn test_cli_name() {
        let cli = Cli::command();
        assert_eq!(cli.get_name(), "passblur");
    }

    #[test]
    fn test_cli_verify() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_verbosity() {
        assert_eq!(cli(0, true).verbosity(), Verbosity::Quiet);
        assert_eq!(cli(2, true).verbosity(), Verbosity::Quiet);
        assert_eq!(cli(0, false).verbosity(), Verbosity::Normal);
        assert_eq!(cli(1, false).verbosity(), Verbosity::Verbose);
        assert_eq!(cli(3, false).verbosity(), Verbosity::Trace);
    }

    #[test]
    fn test_parse_scan_with_only() {
        let args = vec!["passblur", "scan", "page.txt", "--only", "emails,api-keys"];
        let cli = Cli::try_parse_from(args).unwrap();
        let Command::Scan(scan) = cli.command else {
            panic!("expected scan command");
        };
        assert_eq!(scan.file, Some(PathBuf::from("page.txt")));
        assert_eq!(scan.categories(), Some(vec![Category::Emails, Category::ApiKeys]));
        assert_eq!(scan.format, OutputFormat::Plain);
    }

    #[test]
    fn test_parse_scan_stdin_json() {
        let args = vec!["passblur", "scan", "--format", "json"];
        let cli = Cli::try_parse_from(args).unwrap();
        let Command::Scan(scan) = cli.command else {
            panic!("expected scan command");
        };
        assert_eq!(scan.file, None);
        assert_eq!(scan.categories(), None);
        assert_eq!(scan.format, OutputFormat::Json);
    }

    #[test]
    fn test_parse_unknown_category_fails() {
        let args = vec!["passblur", "scan", "--only", "passwords"];
        assert!(Cli::try_parse_from(args).is_err());
    }

    #[test]
    fn test_parse_patterns() {
        let args = vec!["passblur", "patterns", "--json"];
        let cli = Cli::try_parse_from(args).unwrap();
        assert!(matches!(
            cli.command,
            Command::Patterns(PatternsCommand { json: true })
        ));
    }

    #[test]
    fn test_parse_config_validate() {
        let args = vec!["passblur", "config", "validate", "--file", "/tmp/x.toml"];
        let cli = Cli::try_parse_from(args).unwrap();
        assert!(matches!(
            cli.command,
            Command::Config(ConfigCommand::Validate { file: Some(_) })
        ));
    }

    #[test]
    fn test_parse_global_flags() {
        let args = vec!["passblur", "-c", "/custom/config.toml", "-vv", "patterns"];
        let cli = Cli::try_parse_from(args).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/custom/config.toml")));
        assert_eq!(cli.verbose, 2);
    }
}
