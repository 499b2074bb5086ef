//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.emr-insight.toml` files.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::analysis::{validate_pairs, PairSpec, DEFAULT_DELIMITER};
use crate::models::FacilityField;

/// Name of the configuration file looked up by default.
pub const CONFIG_FILE_NAME: &str = ".emr-insight.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Record file discovery.
    #[serde(default)]
    pub source: SourceSettings,

    /// Survey cross-tabulations.
    #[serde(default)]
    pub insight: InsightConfig,

    /// Facility registry tables.
    #[serde(default)]
    pub facilities: FacilitiesConfig,

    /// Report settings.
    #[serde(default)]
    pub report: ReportConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Default output file path.
    #[serde(default = "default_output")]
    pub output: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            output: default_output(),
        }
    }
}

fn default_output() -> String {
    "emr_insight_report.md".to_string()
}

/// Record file discovery settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceSettings {
    /// File extensions to read.
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    /// File or directory names to skip.
    #[serde(default = "default_excludes")]
    pub excludes: Vec<String>,

    /// Maximum record file size in bytes.
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            extensions: default_extensions(),
            excludes: default_excludes(),
            max_file_size: default_max_file_size(),
        }
    }
}

fn default_extensions() -> Vec<String> {
    vec!["json".to_string(), "jsonl".to_string()]
}

fn default_excludes() -> Vec<String> {
    vec!["target", "node_modules", "_generated"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_max_file_size() -> u64 {
    64 * 1024 * 1024 // 64MB
}

/// Survey cross-tabulation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsightConfig {
    /// Pairs to cross-tabulate, in report order.
    #[serde(default = "PairSpec::survey_defaults")]
    pub pairs: Vec<PairSpec>,
}

impl Default for InsightConfig {
    fn default() -> Self {
        Self {
            pairs: PairSpec::survey_defaults(),
        }
    }
}

/// A flat frequency table over one field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSpec {
    pub label: String,
    pub field: String,
}

/// A composite-key table over two fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompositeSpec {
    pub label: String,
    pub first: String,
    pub second: String,
    #[serde(default = "default_delimiter")]
    pub delimiter: String,
}

fn default_delimiter() -> String {
    DEFAULT_DELIMITER.to_string()
}

/// Facility registry settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FacilitiesConfig {
    /// Single-field tables.
    #[serde(default = "default_tables")]
    pub tables: Vec<TableSpec>,

    /// Composite-key tables.
    #[serde(default = "default_composites")]
    pub composites: Vec<CompositeSpec>,
}

impl Default for FacilitiesConfig {
    fn default() -> Self {
        Self {
            tables: default_tables(),
            composites: default_composites(),
        }
    }
}

fn default_tables() -> Vec<TableSpec> {
    [
        ("Facilities by County", FacilityField::County),
        ("Facilities by Level", FacilityField::Level),
        ("Facilities by Type", FacilityField::FacilityType),
        ("Facilities by Status", FacilityField::Status),
    ]
    .into_iter()
    .map(|(label, field)| TableSpec {
        label: label.to_string(),
        field: field.name().to_string(),
    })
    .collect()
}

fn default_composites() -> Vec<CompositeSpec> {
    vec![CompositeSpec {
        label: "Facilities by County and Level".to_string(),
        first: FacilityField::County.name().to_string(),
        second: FacilityField::Level.name().to_string(),
        delimiter: default_delimiter(),
    }]
}

/// Report generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Include per-group chart rows for every cross table.
    #[serde(default = "default_true")]
    pub include_cross_tables: bool,

    /// Include the key insight narratives.
    #[serde(default = "default_true")]
    pub include_insights: bool,

    /// Maximum rows per flat table in Markdown output (0 = all).
    #[serde(default)]
    pub max_rows: usize,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            include_cross_tables: true,
            include_insights: true,
            max_rows: 0,
        }
    }
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        config
            .validate()
            .with_context(|| format!("Invalid config file: {}", path.display()))?;

        Ok(config)
    }

    /// Check settings the engine would otherwise reject mid-run.
    pub fn validate(&self) -> Result<()> {
        validate_pairs(&self.insight.pairs)?;

        for composite in &self.facilities.composites {
            if composite.delimiter.is_empty() {
                bail!("composite table '{}' has an empty delimiter", composite.label);
            }
        }

        Ok(())
    }

    /// Try to load configuration from a directory (e.g. the input directory).
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_from_dir(dir: &Path) -> Result<Option<Self>> {
        let config_path = dir.join(CONFIG_FILE_NAME);

        if config_path.exists() {
            Ok(Some(Self::load(&config_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings.
    /// This method only overrides config when CLI provides explicit values.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref output) = args.output {
            self.general.output = output.display().to_string();
        }

        // A CLI delimiter applies to every composite table
        if let Some(ref delimiter) = args.delimiter {
            for composite in &mut self.facilities.composites {
                composite.delimiter = delimiter.clone();
            }
        }

        if let Some(max_rows) = args.max_rows {
            self.report.max_rows = max_rows;
        }

        if args.no_insights {
            self.report.include_insights = false;
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::GroupMode;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.general.output, "emr_insight_report.md");
        assert_eq!(config.insight.pairs.len(), 5);
        assert_eq!(config.facilities.tables.len(), 4);
        assert_eq!(config.facilities.composites[0].delimiter, " - ");
        assert!(config.source.extensions.contains(&"jsonl".to_string()));
    }

    #[test]
    fn test_parse_config() {
        let toml_content = r#"
[general]
output = "custom_report.md"

[[insight.pairs]]
name = "budget-by-solution"
group = "currentSolutions"
measured = "futureBudgetConsiderations"

[[insight.pairs]]
name = "gaps-by-efficiency"
group = "desiredEfficiencies"
measured = "existingGaps"
group_mode = "each_element"

[[facilities.tables]]
label = "By agent"
field = "FacilityAgent"

[[facilities.composites]]
label = "County / Status"
first = "County"
second = "Status"
delimiter = " | "

[report]
max_rows = 10
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert_eq!(config.general.output, "custom_report.md");
        assert_eq!(config.insight.pairs.len(), 2);
        assert_eq!(config.insight.pairs[0].group_mode, GroupMode::Scalar);
        assert_eq!(config.insight.pairs[1].group_mode, GroupMode::EachElement);
        assert_eq!(config.facilities.tables[0].field, "FacilityAgent");
        assert_eq!(config.facilities.composites[0].delimiter, " | ");
        assert_eq!(config.report.max_rows, 10);
        assert!(config.report.include_insights);
        // Untouched sections keep their defaults.
        assert_eq!(config.source.max_file_size, 64 * 1024 * 1024);
    }

    #[test]
    fn test_default_toml_generation() {
        let toml_str = Config::default_toml();
        assert!(!toml_str.is_empty());
        assert!(toml_str.contains("[general]"));
        assert!(toml_str.contains("[source]"));
        assert!(toml_str.contains("solutions-by-security"));

        let reparsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(reparsed.insight.pairs, PairSpec::survey_defaults());
    }

    #[test]
    fn test_load_rejects_empty_composite_delimiter() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(
            &path,
            r#"
[[facilities.composites]]
label = "County / Level"
first = "County"
second = "Level"
delimiter = ""
"#,
        )
        .unwrap();

        let err = Config::load(&path).unwrap_err();
        assert!(format!("{:#}", err).contains("empty delimiter"));
    }

    #[test]
    fn test_load_rejects_duplicate_pair_names() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(
            &path,
            r#"
[[insight.pairs]]
name = "twice"
group = "currentSolutions"
measured = "existingGaps"

[[insight.pairs]]
name = "twice"
group = "currentSolutions"
measured = "dataSecurityConcerns"
"#,
        )
        .unwrap();

        let err = Config::load(&path).unwrap_err();
        assert!(format!("{:#}", err).contains("'twice'"));
    }
}
