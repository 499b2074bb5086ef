//! Dominant-factor ranking and insight narratives.

use crate::errors::{AggregateError, AggregateResult};
use crate::models::{InsightCategory, RankedInsight, SeriesEntry};

/// Round to one decimal place.
fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Find the largest entry and describe its share of the total.
///
/// Ties keep the first entry seen. A zero total yields a share of `0.0`.
pub fn rank_insight(
    entries: &[SeriesEntry],
    category: InsightCategory,
) -> AggregateResult<RankedInsight> {
    let mut sorted: Vec<&SeriesEntry> = entries.iter().collect();
    // Stable sort: equal values stay in input order.
    sorted.sort_by(|a, b| b.value.cmp(&a.value));

    let top = sorted.first().ok_or(AggregateError::EmptyInput)?;
    let total_value: usize = entries.iter().map(|e| e.value).sum();

    let share_percent = if total_value == 0 {
        0.0
    } else {
        round_one_decimal(top.value as f64 / total_value as f64 * 100.0)
    };

    Ok(RankedInsight {
        top_name: top.name.clone(),
        top_value: top.value,
        total_value,
        share_percent,
        narrative: narrative(category, &top.name, top.value, share_percent),
    })
}

/// Render the sentence shown under a chart.
///
/// Security and payment quote the share, efficiency and other quote the
/// raw value.
pub fn narrative(category: InsightCategory, name: &str, value: usize, share_percent: f64) -> String {
    match category {
        InsightCategory::Security => format!(
            "{} is the primary security concern, accounting for {:.1}% of all reported issues. \
             Prioritize addressing this in your EHR system design.",
            name, share_percent
        ),
        InsightCategory::Efficiency => format!(
            "{} shows the highest efficiency score of {}. \
             Consider adopting its best practices across other solutions.",
            name, value
        ),
        InsightCategory::Payment => format!(
            "{} is the most preferred payment option at {:.1}%. \
             Consider prominently offering this option in your EHR system.",
            name, share_percent
        ),
        InsightCategory::Other => format!(
            "{} is the most significant factor, with a score of {}.",
            name, value
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(items: &[(&str, usize)]) -> Vec<SeriesEntry> {
        items
            .iter()
            .map(|(name, value)| SeriesEntry::new(*name, *value))
            .collect()
    }

    #[test]
    fn test_rank_insight_share() {
        let ranked = rank_insight(&series(&[("A", 3), ("B", 1)]), InsightCategory::Other).unwrap();
        assert_eq!(ranked.top_name, "A");
        assert_eq!(ranked.top_value, 3);
        assert_eq!(ranked.total_value, 4);
        assert_eq!(ranked.share_percent, 75.0);
    }

    #[test]
    fn test_rank_insight_unsorted_input() {
        let ranked =
            rank_insight(&series(&[("B", 1), ("C", 2), ("A", 6)]), InsightCategory::Payment)
                .unwrap();
        assert_eq!(ranked.top_name, "A");
        assert_eq!(ranked.total_value, 9);
        assert_eq!(ranked.share_percent, 66.7);
        assert!(ranked.narrative.contains("A is the most preferred payment option at 66.7%"));
    }

    #[test]
    fn test_rank_insight_zero_total() {
        let ranked = rank_insight(&series(&[("A", 0), ("B", 0)]), InsightCategory::Security).unwrap();
        assert_eq!(ranked.share_percent, 0.0);
        assert_eq!(ranked.total_value, 0);
        assert!(!ranked.share_percent.is_nan());
    }

    #[test]
    fn test_rank_insight_empty() {
        let err = rank_insight(&[], InsightCategory::Security).unwrap_err();
        assert_eq!(err, AggregateError::EmptyInput);
    }

    #[test]
    fn test_rank_insight_tie_keeps_first() {
        let ranked = rank_insight(&series(&[("A", 5), ("B", 5)]), InsightCategory::Other).unwrap();
        assert_eq!(ranked.top_name, "A");

        let ranked = rank_insight(&series(&[("B", 5), ("A", 5)]), InsightCategory::Other).unwrap();
        assert_eq!(ranked.top_name, "B");
    }

    #[test]
    fn test_narrative_uses_category_field() {
        let security = narrative(InsightCategory::Security, "Data Breach", 13, 41.9);
        assert!(security.contains("41.9%"));
        assert!(!security.contains("13"));

        let efficiency = narrative(InsightCategory::Efficiency, "Hybrid", 23, 51.1);
        assert!(efficiency.contains("score of 23"));
        assert!(!efficiency.contains("51.1"));

        let payment = narrative(InsightCategory::Payment, "Monthly", 4, 80.0);
        assert!(payment.contains("80.0%"));
    }
}
