//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use clap::Parser;
use std::path::PathBuf;

/// EMR Insight - survey statistics for healthcare record-keeping
///
/// Load survey responses or facility registry records from JSON/JSONL
/// files, cross-tabulate them, and write a Markdown or JSON report with
/// chart-ready series and key insights.
///
/// Examples:
///   emr-insight --input responses.json
///   emr-insight --input exports/ --kind facilities --format json
///   emr-insight --input data.jsonl --kind generic --config survey.toml
///   emr-insight --input exports/ --dry-run
///   emr-insight --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Record file or directory of record files
    ///
    /// Directories are searched recursively for .json and .jsonl files.
    #[arg(
        short,
        long,
        value_name = "PATH",
        required_unless_present = "init_config",
        env = "EMR_INSIGHT_INPUT"
    )]
    pub input: Option<PathBuf>,

    /// Schema the records are read as
    #[arg(short, long, default_value = "insight", value_name = "KIND")]
    pub kind: RecordKind,

    /// Output file path for the report
    ///
    /// Defaults to the config file setting (emr_insight_report.md).
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .emr-insight.toml in the current directory,
    /// then in the input directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Output format (markdown, json)
    #[arg(long, default_value = "markdown", value_name = "FORMAT")]
    pub format: OutputFormat,

    /// Delimiter for composite-key tables (overrides every configured table)
    #[arg(long, value_name = "TEXT")]
    pub delimiter: Option<String>,

    /// Maximum rows per flat table in Markdown output (0 = all)
    #[arg(long, value_name = "COUNT")]
    pub max_rows: Option<usize>,

    /// Skip key insight narratives
    #[arg(long)]
    pub no_insights: bool,

    /// Exit with code 2 when no records were loaded
    #[arg(long)]
    pub fail_on_empty: bool,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Dry run: list the record files that would be read and exit
    #[arg(long)]
    pub dry_run: bool,

    /// Generate a default .emr-insight.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
}

/// Record schema of the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum RecordKind {
    /// Customer insight survey responses
    #[default]
    Insight,
    /// Health facility registry entries
    Facilities,
    /// Schema-less records; field names come from the config file
    Generic,
}

impl RecordKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::Insight => "insight",
            RecordKind::Facilities => "facilities",
            RecordKind::Generic => "generic",
        }
    }
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

        // Validate input path
        match self.input {
            Some(ref input) if !input.exists() => {
                return Err(format!("Input does not exist: {}", input.display()));
            }
            None => return Err("An --input path is required".to_string()),
            _ => {}
        }

        if let Some(ref delimiter) = self.delimiter {
            if delimiter.is_empty() {
                return Err("Delimiter must not be empty".to_string());
            }
        }

        // Check for conflicting options
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
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
