//! Record sources.
//!
//! A record source hands the engine "all records of a type" as one
//! in-memory collection. Files are read as JSON (an array of objects or a
//! single object) or JSON Lines (one object per line).

use anyhow::{anyhow, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use serde::de::DeserializeOwned;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::{DirEntry, WalkDir};

/// Anything that can produce every stored record of a type.
pub trait RecordSource {
    /// Load and deserialize all records.
    fn collect<T: DeserializeOwned>(&self) -> Result<Vec<T>>;
}

/// Configuration for discovering record files.
#[derive(Debug, Clone)]
pub struct SourceConfig {
    /// File extensions to read (`json`, `jsonl`).
    pub extensions: Vec<String>,
    /// File or directory names to skip.
    pub excludes: Vec<String>,
    /// Files larger than this many bytes are skipped.
    pub max_file_size: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            extensions: vec!["json".to_string(), "jsonl".to_string()],
            excludes: vec!["target".to_string(), "node_modules".to_string()],
            max_file_size: 64 * 1024 * 1024,
        }
    }
}

impl From<&crate::config::SourceSettings> for SourceConfig {
    fn from(settings: &crate::config::SourceSettings) -> Self {
        Self {
            extensions: settings.extensions.clone(),
            excludes: settings.excludes.clone(),
            max_file_size: settings.max_file_size,
        }
    }
}

/// Reads records from a file or a directory tree of files.
pub struct FileRecordSource {
    root: PathBuf,
    config: SourceConfig,
    show_progress: bool,
}

impl FileRecordSource {
    pub fn new(root: PathBuf, config: SourceConfig) -> Self {
        Self {
            root,
            config,
            show_progress: false,
        }
    }

    /// Show a progress bar while reading files.
    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// List the record files that would be read, in sorted path order.
    ///
    /// A root that is a file is returned as-is, whatever its extension.
    pub fn scan(&self) -> Result<Vec<PathBuf>> {
        if !self.root.exists() {
            return Err(anyhow!("Input not found: {}", self.root.display()));
        }

        if self.root.is_file() {
            return Ok(vec![self.root.clone()]);
        }

        let mut files = Vec::new();
        let walker = WalkDir::new(&self.root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || !self.is_excluded(entry));

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    debug!("Skipping unreadable entry: {}", e);
                    continue;
                }
            };

            if entry.file_type().is_file() && self.matches(entry.path()) {
                files.push(entry.into_path());
            }
        }

        Ok(files)
    }

    /// Check extension and size limits.
    fn matches(&self, path: &Path) -> bool {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        if !self.config.extensions.iter().any(|allowed| allowed == ext) {
            return false;
        }

        match fs::metadata(path) {
            Ok(metadata) if metadata.len() > self.config.max_file_size => {
                warn!(
                    "Skipping {} ({} bytes exceeds limit of {})",
                    path.display(),
                    metadata.len(),
                    self.config.max_file_size
                );
                false
            }
            Ok(_) => true,
            Err(_) => false,
        }
    }

    fn is_excluded(&self, entry: &DirEntry) -> bool {
        let name = entry.file_name().to_string_lossy();

        // Hidden files and directories
        if name.starts_with('.') {
            return true;
        }

        self.config.excludes.iter().any(|pattern| name == pattern.as_str())
    }

    fn progress_bar(&self, len: usize) -> Option<ProgressBar> {
        if !self.show_progress || len < 2 {
            return None;
        }

        let pb = ProgressBar::new(len as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        Some(pb)
    }
}

impl RecordSource for FileRecordSource {
    fn collect<T: DeserializeOwned>(&self) -> Result<Vec<T>> {
        let files = self.scan()?;
        debug!("Found {} record files under {}", files.len(), self.root.display());

        let pb = self.progress_bar(files.len());
        let mut records = Vec::new();

        for path in &files {
            if let Some(ref pb) = pb {
                pb.set_message(path.display().to_string());
            }

            let mut batch = read_records(path)?;
            debug!("Read {} records from {}", batch.len(), path.display());
            records.append(&mut batch);

            if let Some(ref pb) = pb {
                pb.inc(1);
            }
        }

        if let Some(pb) = pb {
            pb.finish_and_clear();
        }

        info!("Loaded {} records from {} files", records.len(), files.len());
        Ok(records)
    }
}

/// Read one JSON or JSON Lines file.
pub fn read_records<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read record file: {}", path.display()))?;

    let is_jsonl = path.extension().and_then(|e| e.to_str()) == Some("jsonl");
    if is_jsonl {
        parse_json_lines(&content).with_context(|| format!("Invalid JSON Lines in {}", path.display()))
    } else {
        parse_json(&content).with_context(|| format!("Invalid JSON in {}", path.display()))
    }
}

/// Parse a JSON document holding either an array of records or one record.
pub fn parse_json<T: DeserializeOwned>(content: &str) -> Result<Vec<T>> {
    let value: serde_json::Value = serde_json::from_str(content)?;

    match value {
        serde_json::Value::Array(items) => items
            .into_iter()
            .enumerate()
            .map(|(i, item)| {
                serde_json::from_value(item).with_context(|| format!("Record {} is malformed", i))
            })
            .collect(),
        value @ serde_json::Value::Object(_) => Ok(vec![serde_json::from_value(value)?]),
        other => Err(anyhow!(
            "Expected an array of records or a single record object, found {}",
            json_kind(&other)
        )),
    }
}

/// Parse JSON Lines, skipping blank lines.
pub fn parse_json_lines<T: DeserializeOwned>(content: &str) -> Result<Vec<T>> {
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            serde_json::from_str(line).with_context(|| format!("Line {} is malformed", i + 1))
        })
        .collect()
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

/// Records held in memory as raw JSON values.
#[derive(Debug, Clone, Default)]
pub struct InMemorySource {
    rows: Vec<serde_json::Value>,
}

impl InMemorySource {
    pub fn new(rows: Vec<serde_json::Value>) -> Self {
        Self { rows }
    }
}

impl RecordSource for InMemorySource {
    fn collect<T: DeserializeOwned>(&self) -> Result<Vec<T>> {
        self.rows
            .iter()
            .enumerate()
            .map(|(i, row)| {
                T::deserialize(row).with_context(|| format!("Record {} is malformed", i))
            })
            .collect()
    }
}
