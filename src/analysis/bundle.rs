//! Named cross-tabulations over one record collection.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;

use super::aggregator::{cross_tabulate, cross_tabulate_each_group};
use crate::errors::{AggregateError, AggregateResult};
use crate::models::{FieldSource, InsightBundle, InsightCategory, InsightField};

/// How the group field of a pair is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupMode {
    /// Group field must be a single answer.
    #[default]
    Scalar,
    /// Each element of a multi-valued group field is its own group.
    EachElement,
}

/// Which series a key insight is ranked over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeriesBasis {
    /// Inner values summed across all groups.
    #[default]
    Pooled,
    /// One entry per group: the sum of its inner counts.
    RowTotals,
}

/// Key insight derived from a pair's cross table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsightSpec {
    pub category: InsightCategory,
    #[serde(default)]
    pub basis: SeriesBasis,
}

/// One configured cross-tabulation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairSpec {
    /// Slot name in the resulting bundle.
    pub name: String,
    pub group: String,
    pub measured: String,
    #[serde(default)]
    pub group_mode: GroupMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insight: Option<InsightSpec>,
}

impl PairSpec {
    pub fn new(name: &str, group: &str, measured: &str) -> Self {
        Self {
            name: name.to_string(),
            group: group.to_string(),
            measured: measured.to_string(),
            group_mode: GroupMode::Scalar,
            insight: None,
        }
    }

    fn typed(name: &str, group: InsightField, measured: InsightField) -> Self {
        Self::new(name, group.name(), measured.name())
    }

    pub fn each_element(mut self) -> Self {
        self.group_mode = GroupMode::EachElement;
        self
    }

    pub fn with_insight(mut self, category: InsightCategory, basis: SeriesBasis) -> Self {
        self.insight = Some(InsightSpec { category, basis });
        self
    }

    /// The cross-tabulations of the customer insight dashboard.
    ///
    /// "gaps-by-efficiency" groups by each desired efficiency and tallies
    /// the gaps reported by the same respondent.
    pub fn survey_defaults() -> Vec<PairSpec> {
        use InsightField::*;

        vec![
            Self::typed("solutions-by-security", CurrentSolutions, DataSecurityConcerns)
                .with_insight(InsightCategory::Security, SeriesBasis::Pooled),
            Self::typed("gaps-by-efficiency", DesiredEfficiencies, ExistingGaps).each_element(),
            Self::typed("payment-by-security", WillingnessToPayNow, DataSecurityConcerns),
            Self::typed("solutions-by-payment", CurrentSolutions, WillingnessToPayNow)
                .with_insight(InsightCategory::Payment, SeriesBasis::Pooled),
            Self::typed("efficiencies-by-solution", CurrentSolutions, DesiredEfficiencies)
                .with_insight(InsightCategory::Efficiency, SeriesBasis::RowTotals),
        ]
    }
}

/// Reject configurations that reuse a slot name.
pub fn validate_pairs(pairs: &[PairSpec]) -> AggregateResult<()> {
    let mut seen = HashSet::new();
    for pair in pairs {
        if !seen.insert(pair.name.as_str()) {
            return Err(AggregateError::DuplicatePairName(pair.name.clone()));
        }
    }
    Ok(())
}

/// Run one cross-tabulation per pair, in order.
///
/// Pair names are validated before any tabulation runs.
pub fn build_insight_bundle<R: FieldSource>(
    records: &[R],
    pairs: &[PairSpec],
) -> AggregateResult<InsightBundle> {
    validate_pairs(pairs)?;

    let mut bundle = InsightBundle::default();
    for pair in pairs {
        let table = match pair.group_mode {
            GroupMode::Scalar => cross_tabulate(records, &pair.group, &pair.measured)?,
            GroupMode::EachElement => {
                cross_tabulate_each_group(records, &pair.group, &pair.measured)?
            }
        };
        debug!(
            "Pair '{}' ({} x {}): {} groups, {} events",
            pair.name,
            pair.group,
            pair.measured,
            table.len(),
            table.total()
        );
        bundle.push(&pair.name, table);
    }

    Ok(bundle)
}
