//! CLI command definitions.
//!
//! This module defines the structure of all CLI subcommands.

use std::path::PathBuf;

use clap::{Args, Subcommand, ValueEnum};

use crate::detection::Category;

/// Scan command arguments.
#[derive(Debug, Args)]
pub struct ScanCommand {
    /// File to scan (reads stdin when omitted)
    pub file: Option<PathBuf>,

    /// Only detect these categories
    #[arg(long, value_enum, value_delimiter = ',')]
    pub only: Vec<CategoryArg>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "plain")]
    pub format: OutputFormat,
}

impl ScanCommand {
    /// The requested categories, or `None` to use the configured filters.
    #[must_use]
    pub fn categories(&self) -> Option<Vec<Category>> {
        if self.only.is_empty() {
            None
        } else {
            Some(self.only.iter().copied().map(Category::from).collect())
        }
    }
}

/// Patterns command arguments.
#[derive(Debug, Args)]
pub struct PatternsCommand {
    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the configuration file path
    Path,

    /// Validate configuration
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

/// Detection category argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CategoryArg {
    /// Vendor API keys
    ApiKeys,
    /// Session and bearer tokens
    Tokens,
    /// Email addresses
    Emails,
    /// Phone numbers
    Phones,
    /// Payment card numbers
    Cards,
    /// US Social Security Numbers
    Ssn,
}

impl From<CategoryArg> for Category {
    fn from(arg: CategoryArg) -> Self {
        match arg {
            CategoryArg::ApiKeys => Self::ApiKeys,
            CategoryArg::Tokens => Self::Tokens,
            CategoryArg::Emails => Self::Emails,
            CategoryArg::Phones => Self::Phones,
            CategoryArg::Cards => Self::Cards,
            CategoryArg::Ssn => Self::Ssn,
        }
    }
}

/// Output format for commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Masked text with `[Label]` placeholders
    #[default]
    Plain,
    /// JSON report
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_arg_conversion() {
        assert_eq!(Category::from(CategoryArg::ApiKeys), Category::ApiKeys);
        assert_eq!(Category::from(CategoryArg::Tokens), Category::Tokens);
        assert_eq!(Category::from(CategoryArg::Emails), Category::Emails);
        assert_eq!(Category::from(CategoryArg::Phones), Category::Phones);
        assert_eq!(Category::from(CategoryArg::Cards), Category::Cards);
        assert_eq!(Category::from(CategoryArg::Ssn), Category::Ssn);
    }

    #[test]
    fn test_category_arg_names_cover_all_categories() {
        let names: Vec<String> = CategoryArg::value_variants()
            .iter()
            .filter_map(|v| v.to_possible_value())
            .map(|v| v.get_name().replace('-', "_"))
            .collect();
        let expected: Vec<&str> = Category::ALL.iter().map(|c| c.as_str()).collect();
        assert_eq!(names, expected);
    }

    #[test]
    fn test_output_format_default() {
        assert_eq!(OutputFormat::default(), OutputFormat::Plain);
    }

    #[test]
    fn test_categories_none_when_empty() {
        let cmd = ScanCommand {
            file: None,
            only: Vec::new(),
            format: OutputFormat::Plain,
        };
        assert_eq!(cmd.categories(), None);
    }
}
