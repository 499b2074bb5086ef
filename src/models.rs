//! Data models for survey records and aggregation results.
//!
//! This module contains the record shapes the engine reads (dynamic
//! records plus the typed survey and facility schemas), the tables the
//! engine produces, and the report document built from them.

use chrono::{DateTime, Utc};
use serde::ser::{SerializeMap, SerializeStruct, Serializer};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::errors::ValueShape;

// ---------------------------------------------------------------------------
// Field values and records
// ---------------------------------------------------------------------------

/// A field value borrowed from a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldValue<'a> {
    /// Single-select answer.
    Scalar(&'a str),
    /// Multi-select answer; may be empty.
    Multi(&'a [String]),
}

impl<'a> FieldValue<'a> {
    /// Returns the shape tag of this value.
    pub fn shape(&self) -> ValueShape {
        match self {
            FieldValue::Scalar(_) => ValueShape::Scalar,
            FieldValue::Multi(_) => ValueShape::Multi,
        }
    }
}

/// Anything the tabulators can read named fields from.
pub trait FieldSource {
    /// Look up a field by name. `None` means the field is absent.
    fn field(&self, name: &str) -> Option<FieldValue<'_>>;
}

/// An owned answer stored in a dynamic [`Record`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Answer {
    Scalar(String),
    Multi(Vec<String>),
}

impl Answer {
    pub fn as_field(&self) -> FieldValue<'_> {
        match self {
            Answer::Scalar(s) => FieldValue::Scalar(s),
            Answer::Multi(items) => FieldValue::Multi(items),
        }
    }
}

impl From<&str> for Answer {
    fn from(s: &str) -> Self {
        Answer::Scalar(s.to_string())
    }
}

impl From<Vec<&str>> for Answer {
    fn from(items: Vec<&str>) -> Self {
        Answer::Multi(items.into_iter().map(String::from).collect())
    }
}

/// Raw JSON shapes accepted for a record field.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawAnswer {
    Text(String),
    Number(serde_json::Number),
    Flag(bool),
    List(Vec<String>),
    Null,
}

impl RawAnswer {
    fn into_answer(self) -> Option<Answer> {
        match self {
            RawAnswer::Text(s) => Some(Answer::Scalar(s)),
            RawAnswer::Number(n) => Some(Answer::Scalar(n.to_string())),
            RawAnswer::Flag(b) => Some(Answer::Scalar(b.to_string())),
            RawAnswer::List(items) => Some(Answer::Multi(items)),
            RawAnswer::Null => None,
        }
    }
}

/// A schema-less record: field name to answer.
///
/// Numbers and booleans are kept as their text form; `null` fields are
/// treated as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Record {
    fields: HashMap<String, Answer>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, name: &str, answer: impl Into<Answer>) -> Self {
        self.fields.insert(name.to_string(), answer.into());
        self
    }
}

impl FieldSource for Record {
    fn field(&self, name: &str) -> Option<FieldValue<'_>> {
        self.fields.get(name).map(Answer::as_field)
    }
}

impl<'de> Deserialize<'de> for Record {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw: HashMap<String, RawAnswer> = HashMap::deserialize(deserializer)?;
        let fields = raw
            .into_iter()
            .filter_map(|(name, value)| value.into_answer().map(|answer| (name, answer)))
            .collect();
        Ok(Record { fields })
    }
}

/// Fields of the customer insight survey.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InsightField {
    CurrentSolutions,
    ExistingGaps,
    DesiredEfficiencies,
    FutureBudgetConsiderations,
    WillingnessToPayNow,
    DataSecurityConcerns,
}

impl InsightField {
    pub const ALL: [InsightField; 6] = [
        InsightField::CurrentSolutions,
        InsightField::ExistingGaps,
        InsightField::DesiredEfficiencies,
        InsightField::FutureBudgetConsiderations,
        InsightField::WillingnessToPayNow,
        InsightField::DataSecurityConcerns,
    ];

    /// The stored field name.
    pub fn name(&self) -> &'static str {
        match self {
            InsightField::CurrentSolutions => "currentSolutions",
            InsightField::ExistingGaps => "existingGaps",
            InsightField::DesiredEfficiencies => "desiredEfficiencies",
            InsightField::FutureBudgetConsiderations => "futureBudgetConsiderations",
            InsightField::WillingnessToPayNow => "willingnessToPayNow",
            InsightField::DataSecurityConcerns => "dataSecurityConcerns",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.name() == name)
    }
}

impl fmt::Display for InsightField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// One response to the customer insight survey.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerInsight {
    pub current_solutions: String,
    pub existing_gaps: Vec<String>,
    pub desired_efficiencies: Vec<String>,
    pub future_budget_considerations: String,
    pub willingness_to_pay_now: String,
    pub data_security_concerns: Vec<String>,
}

impl CustomerInsight {
    /// Typed field access.
    pub fn value(&self, field: InsightField) -> FieldValue<'_> {
        match field {
            InsightField::CurrentSolutions => FieldValue::Scalar(&self.current_solutions),
            InsightField::ExistingGaps => FieldValue::Multi(&self.existing_gaps),
            InsightField::DesiredEfficiencies => FieldValue::Multi(&self.desired_efficiencies),
            InsightField::FutureBudgetConsiderations => {
                FieldValue::Scalar(&self.future_budget_considerations)
            }
            InsightField::WillingnessToPayNow => FieldValue::Scalar(&self.willingness_to_pay_now),
            InsightField::DataSecurityConcerns => FieldValue::Multi(&self.data_security_concerns),
        }
    }
}

impl FieldSource for CustomerInsight {
    fn field(&self, name: &str) -> Option<FieldValue<'_>> {
        InsightField::from_name(name).map(|f| self.value(f))
    }
}

/// Fields of the health facility registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FacilityField {
    RegNo,
    FacilityName,
    FacilityType,
    FacilityAgent,
    Level,
    County,
    Status,
}

impl FacilityField {
    pub const ALL: [FacilityField; 7] = [
        FacilityField::RegNo,
        FacilityField::FacilityName,
        FacilityField::FacilityType,
        FacilityField::FacilityAgent,
        FacilityField::Level,
        FacilityField::County,
        FacilityField::Status,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            FacilityField::RegNo => "RegNo",
            FacilityField::FacilityName => "FacilityName",
            FacilityField::FacilityType => "FacilityType",
            FacilityField::FacilityAgent => "FacilityAgent",
            FacilityField::Level => "Level",
            FacilityField::County => "County",
            FacilityField::Status => "Status",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.name() == name)
    }
}

impl fmt::Display for FacilityField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A registered health facility.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Facility {
    /// Registration numbers come as either text or a bare number.
    #[serde(deserialize_with = "text_or_number")]
    pub reg_no: String,
    pub facility_name: String,
    pub facility_type: String,
    pub facility_agent: String,
    pub level: String,
    pub county: String,
    pub status: String,
}

impl Facility {
    pub fn value(&self, field: FacilityField) -> FieldValue<'_> {
        let text = match field {
            FacilityField::RegNo => &self.reg_no,
            FacilityField::FacilityName => &self.facility_name,
            FacilityField::FacilityType => &self.facility_type,
            FacilityField::FacilityAgent => &self.facility_agent,
            FacilityField::Level => &self.level,
            FacilityField::County => &self.county,
            FacilityField::Status => &self.status,
        };
        FieldValue::Scalar(text)
    }
}

impl FieldSource for Facility {
    fn field(&self, name: &str) -> Option<FieldValue<'_>> {
        FacilityField::from_name(name).map(|f| self.value(f))
    }
}

fn text_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum TextOrNumber {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(match TextOrNumber::deserialize(deserializer)? {
        TextOrNumber::Text(s) => s,
        TextOrNumber::Number(n) => n.to_string(),
    })
}

// ---------------------------------------------------------------------------
// Aggregation results
// ---------------------------------------------------------------------------

/// One `{name, value}` point of a chart series.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesEntry {
    pub name: String,
    pub value: usize,
}

impl SeriesEntry {
    pub fn new(name: impl Into<String>, value: usize) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

/// Value to occurrence count, in first-seen order.
///
/// Equality ignores order: two tables are equal when they hold the same
/// keys with the same counts.
#[derive(Debug, Clone, Default)]
pub struct FrequencyTable {
    entries: Vec<(String, usize)>,
    index: HashMap<String, usize>,
}

impl FrequencyTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one occurrence of `key`.
    pub fn increment(&mut self, key: &str) {
        self.add(key, 1);
    }

    /// Add `n` occurrences of `key`, creating the entry on first sight.
    pub fn add(&mut self, key: &str, n: usize) {
        match self.index.get(key) {
            Some(&pos) => self.entries[pos].1 += n,
            None => {
                self.index.insert(key.to_string(), self.entries.len());
                self.entries.push((key.to_string(), n));
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<usize> {
        self.index.get(key).map(|&pos| self.entries[pos].1)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sum of all counts.
    pub fn total(&self) -> usize {
        self.entries.iter().map(|(_, count)| count).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> + '_ {
        self.entries.iter().map(|(key, count)| (key.as_str(), *count))
    }

    /// Chart series in first-seen order.
    pub fn to_series(&self) -> Vec<SeriesEntry> {
        self.iter()
            .map(|(name, value)| SeriesEntry::new(name, value))
            .collect()
    }
}

impl PartialEq for FrequencyTable {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().all(|(key, count)| other.get(key) == Some(count))
    }
}

impl Eq for FrequencyTable {}

impl<'a> FromIterator<(&'a str, usize)> for FrequencyTable {
    fn from_iter<I: IntoIterator<Item = (&'a str, usize)>>(iter: I) -> Self {
        let mut table = FrequencyTable::new();
        for (key, count) in iter {
            table.add(key, count);
        }
        table
    }
}

impl Serialize for FrequencyTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (key, count) in self.iter() {
            map.serialize_entry(key, &count)?;
        }
        map.end()
    }
}

/// One chart row: a group plus its per-value counts.
///
/// Serializes as `{"group": ..., "counts": {"<value>": <count>, ...}}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupRow {
    pub group: String,
    pub counts: Vec<SeriesEntry>,
}

impl GroupRow {
    pub fn count(&self, name: &str) -> Option<usize> {
        self.counts.iter().find(|e| e.name == name).map(|e| e.value)
    }
}

impl Serialize for GroupRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("GroupRow", 2)?;
        state.serialize_field("group", &self.group)?;
        state.serialize_field("counts", &CountsMap(&self.counts))?;
        state.end()
    }
}

struct CountsMap<'a>(&'a [SeriesEntry]);

impl Serialize for CountsMap<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.0.iter().map(|entry| (&entry.name, entry.value)))
    }
}

/// Group value to inner frequency table, in first-seen order.
#[derive(Debug, Clone, Default)]
pub struct CrossTable {
    groups: Vec<(String, FrequencyTable)>,
    index: HashMap<String, usize>,
}

impl CrossTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get-or-create the inner table for `group`.
    pub fn group_mut(&mut self, group: &str) -> &mut FrequencyTable {
        let pos = match self.index.get(group) {
            Some(&pos) => pos,
            None => {
                let pos = self.groups.len();
                self.index.insert(group.to_string(), pos);
                self.groups.push((group.to_string(), FrequencyTable::new()));
                pos
            }
        };
        &mut self.groups[pos].1
    }

    pub fn get(&self, group: &str) -> Option<&FrequencyTable> {
        self.index.get(group).map(|&pos| &self.groups[pos].1)
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Sum of every inner count.
    pub fn total(&self) -> usize {
        self.groups.iter().map(|(_, table)| table.total()).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FrequencyTable)> + '_ {
        self.groups.iter().map(|(group, table)| (group.as_str(), table))
    }

    /// Chart rows in first-seen group order.
    pub fn to_rows(&self) -> Vec<GroupRow> {
        self.iter()
            .map(|(group, table)| GroupRow {
                group: group.to_string(),
                counts: table.to_series(),
            })
            .collect()
    }
}

impl PartialEq for CrossTable {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().all(|(group, table)| other.get(group) == Some(table))
    }
}

impl Eq for CrossTable {}

impl Serialize for CrossTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (group, table) in self.iter() {
            map.serialize_entry(group, table)?;
        }
        map.end()
    }
}

/// Named cross tables for one survey's analytics view.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InsightBundle {
    slots: Vec<(String, CrossTable)>,
}

impl InsightBundle {
    /// Append a slot. Name uniqueness is checked by the bundle builder.
    pub(crate) fn push(&mut self, name: &str, table: CrossTable) {
        self.slots.push((name.to_string(), table));
    }

    pub fn get(&self, name: &str) -> Option<&CrossTable> {
        self.slots
            .iter()
            .find(|(slot, _)| slot == name)
            .map(|(_, table)| table)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &CrossTable)> + '_ {
        self.slots.iter().map(|(name, table)| (name.as_str(), table))
    }
}

impl Serialize for InsightBundle {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (name, table) in self.iter() {
            map.serialize_entry(name, table)?;
        }
        map.end()
    }
}

/// Which narrative template a ranked insight uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InsightCategory {
    Security,
    Efficiency,
    Payment,
    Other,
}

impl InsightCategory {
    /// Heading used for the category in reports.
    pub fn title(&self) -> &'static str {
        match self {
            InsightCategory::Security => "Security Concerns",
            InsightCategory::Efficiency => "Solution Efficiency",
            InsightCategory::Payment => "Payment Preferences",
            InsightCategory::Other => "Key Factor",
        }
    }
}

impl fmt::Display for InsightCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InsightCategory::Security => write!(f, "security"),
            InsightCategory::Efficiency => write!(f, "efficiency"),
            InsightCategory::Payment => write!(f, "payment"),
            InsightCategory::Other => write!(f, "other"),
        }
    }
}

/// Top factor of a series with its share of the total.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedInsight {
    pub top_name: String,
    pub top_value: usize,
    pub total_value: usize,
    /// Percentage rounded to one decimal place.
    pub share_percent: f64,
    pub narrative: String,
}

// ---------------------------------------------------------------------------
// Report document
// ---------------------------------------------------------------------------

/// A flat frequency table with its heading.
#[derive(Debug, Clone, Serialize)]
pub struct NamedTable {
    pub label: String,
    pub field: String,
    pub table: FrequencyTable,
}

/// A composite-key table plus its pivoted rows.
#[derive(Debug, Clone, Serialize)]
pub struct CompositeTable {
    pub label: String,
    pub fields: [String; 2],
    pub delimiter: String,
    pub table: FrequencyTable,
    pub rows: Vec<GroupRow>,
}

/// One "key insight" panel: the series it was ranked from and the result.
#[derive(Debug, Clone, Serialize)]
pub struct KeyInsight {
    pub category: InsightCategory,
    pub title: String,
    /// Bundle slot the series was derived from.
    pub source: String,
    pub series: Vec<SeriesEntry>,
    /// `None` when the series was empty ("no data yet").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ranked: Option<RankedInsight>,
}

/// Metadata about the report run.
#[derive(Debug, Clone, Serialize)]
pub struct ReportMetadata {
    /// Input file or directory.
    pub input: String,
    /// Record schema the input was read as.
    pub record_kind: String,
    pub generated_at: DateTime<Utc>,
    pub records_loaded: usize,
    pub duration_seconds: f64,
}

/// The complete statistics report.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub metadata: ReportMetadata,
    pub tables: Vec<NamedTable>,
    pub composites: Vec<CompositeTable>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bundle: Option<InsightBundle>,
    pub key_insights: Vec<KeyInsight>,
}

impl Report {
    pub fn new(metadata: ReportMetadata) -> Self {
        Self {
            metadata,
            tables: Vec::new(),
            composites: Vec::new(),
            bundle: None,
            key_insights: Vec::new(),
        }
    }
}
